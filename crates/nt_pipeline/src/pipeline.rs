use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use nt_core::{
    AnalysisOutcome, AnalysisReport, AnalyzeRequest, Clock, Error, Persistence, QuotaStatus,
    Result, SearchHistoryEntry, StoredArticle,
};
use nt_inference::{summarize, ClassificationOrchestrator, ProviderRegistry};
use nt_search::SearchGateway;
use nt_storage::TtlCache;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ledger::UsageLedger;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub daily_limit: u32,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    /// Offset of the calendar day used for quota rollover
    pub utc_offset: FixedOffset,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            daily_limit: 50,
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 256,
            utc_offset: Utc.fix(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReportKey {
    entity: String,
    country: Option<String>,
    provider: Option<String>,
}

impl ReportKey {
    fn new(entity: &str, country: Option<&str>, provider: Option<&str>) -> Self {
        Self {
            entity: entity.to_lowercase(),
            country: country.map(str::to_lowercase),
            provider: provider.map(str::to_lowercase),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// The request entry point: quota gate, search, classification, summary.
pub struct SentimentPipeline {
    gateway: SearchGateway,
    registry: ProviderRegistry,
    orchestrator: ClassificationOrchestrator,
    ledger: UsageLedger,
    storage: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    cache: TtlCache<ReportKey, AnalysisReport>,
}

impl fmt::Debug for SentimentPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SentimentPipeline")
            .field("gateway", &self.gateway)
            .field("registry", &self.registry)
            .field("orchestrator", &self.orchestrator)
            .field("ledger", &self.ledger)
            .finish()
    }
}

impl SentimentPipeline {
    pub fn new(
        gateway: SearchGateway,
        registry: ProviderRegistry,
        orchestrator: ClassificationOrchestrator,
        storage: Arc<dyn Persistence>,
        clock: Arc<dyn Clock>,
        config: &PipelineConfig,
    ) -> Self {
        let ledger = UsageLedger::new(storage.clone(), clock.clone(), config.daily_limit, config.utc_offset);
        let cache = TtlCache::new(config.cache_capacity, config.cache_ttl, clock.clone());
        Self {
            gateway,
            registry,
            orchestrator,
            ledger,
            storage,
            clock,
            cache,
        }
    }

    pub fn ledger(&self) -> &UsageLedger {
        &self.ledger
    }

    /// Runs one analysis for `user_id`. A spent quota is reported as
    /// [`AnalysisOutcome::RateLimited`]; search failures and cancellation are
    /// errors.
    pub async fn analyze(
        &self,
        user_id: &str,
        request: &AnalyzeRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome> {
        let entity_name = request.entity_name.trim();
        if entity_name.is_empty() {
            return Err(Error::InvalidInput("entity name must not be blank".to_string()));
        }
        let country = non_blank(request.country_filter.as_deref());
        let preference = non_blank(request.provider_preference.as_deref());

        let key = ReportKey::new(entity_name, country, preference);
        if let Some(report) = self.cache.get(&key).await {
            // a cached report is free, but only for users still under the limit
            let quota = self.ledger.peek(user_id).await?;
            if !quota.allowed {
                info!(user = user_id, entity = entity_name, "🚫 Cached report withheld, daily quota exhausted");
                return Ok(AnalysisOutcome::RateLimited(quota));
            }
            info!(user = user_id, entity = entity_name, "📦 Serving cached report");
            return Ok(AnalysisOutcome::Completed(report));
        }

        let quota = self.ledger.check_and_count(user_id).await?;
        if !quota.allowed {
            return Ok(AnalysisOutcome::RateLimited(quota));
        }

        let results = self.gateway.search(entity_name, country, cancel).await?;
        debug!(entity = entity_name, results = results.len(), "Search complete");

        let providers = self.registry.ordered(preference);
        let articles = self.orchestrator.classify(&results, &providers, cancel).await?;
        let summary = summarize(&articles);

        let report = AnalysisReport {
            entity_name: entity_name.to_string(),
            country_filter: country.map(str::to_string),
            articles,
            summary,
            generated_at: self.clock.now(),
        };
        self.persist(user_id, preference, &report).await;
        self.cache.insert(key, report.clone()).await;

        info!(
            user = user_id,
            entity = entity_name,
            total = report.summary.total,
            overall = %report.summary.overall_sentiment,
            "✅ Analysis complete"
        );
        Ok(AnalysisOutcome::Completed(report))
    }

    async fn persist(&self, user_id: &str, preference: Option<&str>, report: &AnalysisReport) {
        for article in &report.articles {
            if let Err(e) = self
                .storage
                .upsert_article(&report.entity_name, article, report.generated_at)
                .await
            {
                warn!(link = article.link(), error = %e, "Failed to store article");
            }
        }

        let entry = SearchHistoryEntry {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            entity_name: report.entity_name.clone(),
            country_filter: report.country_filter.clone(),
            provider_preference: preference.map(str::to_string),
            summary: report.summary.clone(),
            searched_at: report.generated_at,
        };
        if let Err(e) = self.storage.append_history(&entry).await {
            warn!(user = user_id, error = %e, "Failed to record search history");
        }
    }

    /// Today's standing for `user_id`. Unlike the list reads this does not
    /// degrade: a storage error is returned rather than an invented count.
    pub async fn usage(&self, user_id: &str) -> Result<QuotaStatus> {
        self.ledger.peek(user_id).await
    }

    /// Newest first; empty when storage is unavailable.
    pub async fn recent_history(&self, user_id: &str, limit: usize) -> Vec<SearchHistoryEntry> {
        self.storage.history_for_user(user_id, limit).await.unwrap_or_else(|e| {
            warn!(user = user_id, error = %e, "Failed to load search history");
            Vec::new()
        })
    }

    pub async fn articles_for_entity(&self, entity_name: &str, limit: usize) -> Vec<StoredArticle> {
        self.storage
            .articles_for_entity(entity_name.trim(), limit)
            .await
            .unwrap_or_else(|e| {
                warn!(entity = entity_name, error = %e, "Failed to load stored articles");
                Vec::new()
            })
    }

    pub async fn prune_cache(&self) -> usize {
        self.cache.prune_expired().await
    }
}
