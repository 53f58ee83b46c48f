use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use nt_core::{ClassificationProvider, ClassifiedArticle, Error, Result, SearchResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
    pub item_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            inter_batch_delay: Duration::from_secs(1),
            item_timeout: Duration::from_secs(30),
        }
    }
}

/// Labels search results in sequential batch windows. Items inside a window
/// run concurrently; each item walks the provider list until one answers.
pub struct ClassificationOrchestrator {
    config: OrchestratorConfig,
}

impl fmt::Debug for ClassificationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationOrchestrator")
            .field("config", &self.config)
            .finish()
    }
}

impl ClassificationOrchestrator {
    pub fn new(mut config: OrchestratorConfig) -> Self {
        config.batch_size = config.batch_size.max(1);
        Self { config }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Classifies every article, preserving input order. Only cancellation
    /// makes this fail; provider trouble degrades to the neutral fallback.
    pub async fn classify(
        &self,
        articles: &[SearchResult],
        providers: &[Arc<dyn ClassificationProvider>],
        cancel: &CancellationToken,
    ) -> Result<Vec<ClassifiedArticle>> {
        if providers.is_empty() && !articles.is_empty() {
            warn!("No classification providers, every article falls back to neutral");
        }

        let total_batches = articles.len().div_ceil(self.config.batch_size);
        let mut classified = Vec::with_capacity(articles.len());

        for (index, batch) in articles.chunks(self.config.batch_size).enumerate() {
            if index > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(self.config.inter_batch_delay) => {}
                }
            }

            debug!(batch = index + 1, of = total_batches, size = batch.len(), "Classifying batch");
            let work = join_all(batch.iter().map(|article| self.classify_one(article, providers)));
            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                results = work => results,
            };
            classified.extend(results);
        }

        info!(
            articles = classified.len(),
            batches = total_batches,
            fallbacks = classified.iter().filter(|a| a.provider.is_none()).count(),
            "✨ Classification complete"
        );
        Ok(classified)
    }

    async fn classify_one(
        &self,
        article: &SearchResult,
        providers: &[Arc<dyn ClassificationProvider>],
    ) -> ClassifiedArticle {
        for provider in providers {
            let call = provider.classify(&article.title, &article.snippet);
            match tokio::time::timeout(self.config.item_timeout, call).await {
                Ok(Ok(classification)) => {
                    return ClassifiedArticle::new(article.clone(), classification, provider.name());
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), link = %article.link, error = %e, "Provider failed, trying next");
                }
                Err(_) => {
                    warn!(provider = provider.name(), link = %article.link, "Provider timed out, trying next");
                }
            }
        }

        warn!(link = %article.link, "All providers failed, defaulting to neutral");
        ClassifiedArticle::fallback(article.clone())
    }
}
