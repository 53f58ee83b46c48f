use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use nt_core::{
    ArticleStorage, ClassifiedArticle, Error, Result, SearchHistory, SearchHistoryEntry, SearchResult,
    Sentiment, StoredArticle, UsageIncrement, UsageRecord, UsageStorage,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        link TEXT PRIMARY KEY,
        entity_name TEXT NOT NULL COLLATE NOCASE,
        title TEXT NOT NULL,
        snippet TEXT NOT NULL,
        display_link TEXT NOT NULL,
        sentiment TEXT NOT NULL,
        reasoning TEXT NOT NULL,
        provider TEXT,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS search_history (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        entity_name TEXT NOT NULL,
        country_filter TEXT,
        provider_preference TEXT,
        summary TEXT NOT NULL,
        searched_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS usage (
        user_id TEXT NOT NULL,
        date TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        reset_at TEXT NOT NULL,
        PRIMARY KEY (user_id, date)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_history_user ON search_history (user_id, searched_at)",
];

fn storage_err(context: &str) -> impl Fn(sqlx::Error) -> Error + '_ {
    move |e| Error::Storage(format!("{}: {}", context, e))
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("Failed to parse timestamp {}: {}", value, e)))
}

/// SQLite-backed persistence. Timestamps are stored as RFC 3339 text and
/// dates as `YYYY-MM-DD`.
pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(storage_err("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Storage(format!("Failed to run migration {}: {}", i, e)))?;
        }
        debug!(path = %db_path.display(), "SQLite storage ready");

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    fn article_from_row(row: &SqliteRow) -> Result<StoredArticle> {
        let get = |column: &str| -> Result<String> {
            row.try_get::<String, _>(column)
                .map_err(storage_err("Failed to read article"))
        };
        let sentiment = Sentiment::from_str(&get("sentiment")?).map_err(Error::Storage)?;
        Ok(StoredArticle {
            entity_name: get("entity_name")?,
            article: ClassifiedArticle {
                result: SearchResult {
                    title: get("title")?,
                    link: get("link")?,
                    snippet: get("snippet")?,
                    display_link: get("display_link")?,
                },
                sentiment,
                reasoning: get("reasoning")?,
                provider: row
                    .try_get::<Option<String>, _>("provider")
                    .map_err(storage_err("Failed to read article"))?,
            },
            updated_at: parse_time(&get("updated_at")?)?,
        })
    }

    fn history_from_row(row: &SqliteRow) -> Result<SearchHistoryEntry> {
        let read = storage_err("Failed to read search history");
        let id: String = row.try_get("id").map_err(&read)?;
        let summary: String = row.try_get("summary").map_err(&read)?;
        let searched_at: String = row.try_get("searched_at").map_err(&read)?;
        Ok(SearchHistoryEntry {
            id: Uuid::parse_str(&id).map_err(|e| Error::Storage(format!("Invalid history id {}: {}", id, e)))?,
            user_id: row.try_get("user_id").map_err(&read)?,
            entity_name: row.try_get("entity_name").map_err(&read)?,
            country_filter: row.try_get("country_filter").map_err(&read)?,
            provider_preference: row.try_get("provider_preference").map_err(&read)?,
            summary: serde_json::from_str(&summary)?,
            searched_at: parse_time(&searched_at)?,
        })
    }

    fn usage_from_row(row: &SqliteRow, user_id: &str, date: NaiveDate) -> Result<UsageRecord> {
        let read = storage_err("Failed to read usage");
        let count: i64 = row.try_get("count").map_err(&read)?;
        let reset_at: String = row.try_get("reset_at").map_err(&read)?;
        Ok(UsageRecord {
            user_id: user_id.to_string(),
            date,
            count: u32::try_from(count).unwrap_or(u32::MAX),
            reset_at: parse_time(&reset_at)?,
        })
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn upsert_article(&self, entity_name: &str, article: &ClassifiedArticle, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO articles
            (link, entity_name, title, snippet, display_link, sentiment, reasoning, provider, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(article.link())
        .bind(entity_name)
        .bind(&article.result.title)
        .bind(&article.result.snippet)
        .bind(&article.result.display_link)
        .bind(article.sentiment.as_str())
        .bind(&article.reasoning)
        .bind(article.provider.as_deref())
        .bind(at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err("Failed to store article"))?;

        Ok(())
    }

    async fn articles_for_entity(&self, entity_name: &str, limit: usize) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM articles
            WHERE entity_name = ?
            ORDER BY updated_at DESC
            LIMIT ?
            "#,
        )
        .bind(entity_name)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err("Failed to get articles by entity"))?;

        rows.iter().map(Self::article_from_row).collect()
    }
}

#[async_trait]
impl SearchHistory for SQLiteStorage {
    async fn append_history(&self, entry: &SearchHistoryEntry) -> Result<()> {
        let summary = serde_json::to_string(&entry.summary)?;
        sqlx::query(
            r#"
            INSERT INTO search_history
            (id, user_id, entity_name, country_filter, provider_preference, summary, searched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(&entry.user_id)
        .bind(&entry.entity_name)
        .bind(entry.country_filter.as_deref())
        .bind(entry.provider_preference.as_deref())
        .bind(summary)
        .bind(entry.searched_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err("Failed to append search history"))?;

        Ok(())
    }

    async fn history_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM search_history
            WHERE user_id = ?
            ORDER BY searched_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err("Failed to get search history"))?;

        rows.iter().map(Self::history_from_row).collect()
    }
}

#[async_trait]
impl UsageStorage for SQLiteStorage {
    async fn increment_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        limit: u32,
        reset_at: DateTime<Utc>,
    ) -> Result<UsageIncrement> {
        let day = date.to_string();

        sqlx::query("INSERT OR IGNORE INTO usage (user_id, date, count, reset_at) VALUES (?, ?, 0, ?)")
            .bind(user_id)
            .bind(&day)
            .bind(reset_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(storage_err("Failed to create usage row"))?;

        // The compare and the increment happen in one statement.
        let updated = sqlx::query(
            r#"
            UPDATE usage SET count = count + 1
            WHERE user_id = ? AND date = ? AND count < ?
            RETURNING count, reset_at
            "#,
        )
        .bind(user_id)
        .bind(&day)
        .bind(i64::from(limit))
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err("Failed to increment usage"))?;

        if let Some(row) = updated {
            return Ok(UsageIncrement {
                allowed: true,
                record: Self::usage_from_row(&row, user_id, date)?,
            });
        }

        let record = self
            .get_usage(user_id, date)
            .await?
            .ok_or_else(|| Error::Storage(format!("Usage row for {} on {} disappeared", user_id, day)))?;
        Ok(UsageIncrement { allowed: false, record })
    }

    async fn get_usage(&self, user_id: &str, date: NaiveDate) -> Result<Option<UsageRecord>> {
        let row = sqlx::query("SELECT count, reset_at FROM usage WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(date.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err("Failed to get usage"))?;

        row.map(|row| Self::usage_from_row(&row, user_id, date)).transpose()
    }
}
