use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use nt_core::{
    ArticleStorage, ClassifiedArticle, Result, SearchHistory, SearchHistoryEntry, StoredArticle,
    UsageIncrement, UsageRecord, UsageStorage,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    articles: Vec<StoredArticle>,
    history: Vec<SearchHistoryEntry>,
    usage: HashMap<(String, NaiveDate), UsageRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_article(&mut self, entity_name: &str, article: &ClassifiedArticle, at: DateTime<Utc>) {
        let stored = StoredArticle {
            entity_name: entity_name.to_string(),
            article: article.clone(),
            updated_at: at,
        };
        if let Some(existing) = self.articles.iter_mut().find(|a| a.article.link() == article.link()) {
            *existing = stored;
        } else {
            self.articles.push(stored);
        }
    }

    pub fn articles_for_entity(&self, entity_name: &str, limit: usize) -> Vec<StoredArticle> {
        let mut articles = self
            .articles
            .iter()
            .filter(|a| a.entity_name.eq_ignore_ascii_case(entity_name))
            .cloned()
            .collect::<Vec<_>>();
        articles.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        articles.truncate(limit);
        articles
    }

    pub fn history_for_user(&self, user_id: &str, limit: usize) -> Vec<SearchHistoryEntry> {
        self.history
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn increment_usage(
        &mut self,
        user_id: &str,
        date: NaiveDate,
        limit: u32,
        reset_at: DateTime<Utc>,
    ) -> UsageIncrement {
        let record = self
            .usage
            .entry((user_id.to_string(), date))
            .or_insert_with(|| UsageRecord {
                user_id: user_id.to_string(),
                date,
                count: 0,
                reset_at,
            });
        let allowed = record.count < limit;
        if allowed {
            record.count += 1;
        }
        UsageIncrement {
            allowed,
            record: record.clone(),
        }
    }
}

/// Process-local persistence. Each operation holds the store lock for its
/// whole duration, which makes the usage increment atomic.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn upsert_article(&self, entity_name: &str, article: &ClassifiedArticle, at: DateTime<Utc>) -> Result<()> {
        let mut store = self.store.write().await;
        store.upsert_article(entity_name, article, at);
        Ok(())
    }

    async fn articles_for_entity(&self, entity_name: &str, limit: usize) -> Result<Vec<StoredArticle>> {
        let store = self.store.read().await;
        Ok(store.articles_for_entity(entity_name, limit))
    }
}

#[async_trait]
impl SearchHistory for MemoryStorage {
    async fn append_history(&self, entry: &SearchHistoryEntry) -> Result<()> {
        let mut store = self.store.write().await;
        store.history.push(entry.clone());
        Ok(())
    }

    async fn history_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        let store = self.store.read().await;
        Ok(store.history_for_user(user_id, limit))
    }
}

#[async_trait]
impl UsageStorage for MemoryStorage {
    async fn increment_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        limit: u32,
        reset_at: DateTime<Utc>,
    ) -> Result<UsageIncrement> {
        let mut store = self.store.write().await;
        Ok(store.increment_usage(user_id, date, limit, reset_at))
    }

    async fn get_usage(&self, user_id: &str, date: NaiveDate) -> Result<Option<UsageRecord>> {
        let store = self.store.read().await;
        Ok(store.usage.get(&(user_id.to_string(), date)).cloned())
    }
}
