use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use crate::types::{ClassifiedArticle, SearchHistoryEntry, StoredArticle, UsageIncrement, UsageRecord};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Insert an article, or replace the stored one with the same link
    async fn upsert_article(&self, entity_name: &str, article: &ClassifiedArticle, at: DateTime<Utc>) -> Result<()>;

    /// Most recently updated articles stored for an entity
    async fn articles_for_entity(&self, entity_name: &str, limit: usize) -> Result<Vec<StoredArticle>>;
}

#[async_trait]
pub trait SearchHistory: Send + Sync {
    async fn append_history(&self, entry: &SearchHistoryEntry) -> Result<()>;

    /// Newest entries first
    async fn history_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<SearchHistoryEntry>>;
}

#[async_trait]
pub trait UsageStorage: Send + Sync {
    /// Get-or-create the (user, date) row and increment it only while its
    /// count is below `limit`, as one indivisible step.
    async fn increment_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        limit: u32,
        reset_at: DateTime<Utc>,
    ) -> Result<UsageIncrement>;

    async fn get_usage(&self, user_id: &str, date: NaiveDate) -> Result<Option<UsageRecord>>;
}

/// Everything the pipeline persists.
pub trait Persistence: ArticleStorage + SearchHistory + UsageStorage {}

impl<T> Persistence for T where T: ArticleStorage + SearchHistory + UsageStorage {}
