use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, try_join_all};
use nt_core::{canonical_link, Error, Result, SearchError, SearchResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;
use crate::{entity_queries, PartialFailurePolicy, SearchConfig, SearchProvider};

/// Fans an entity out into the fixed query set, retries transient failures
/// and merges the answers into one list with unique links.
pub struct SearchGateway {
    provider: Arc<dyn SearchProvider>,
    retry: RetryPolicy,
    request_timeout: Duration,
    partial_failure: PartialFailurePolicy,
}

impl fmt::Debug for SearchGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchGateway")
            .field("provider", &self.provider.name())
            .field("retry", &self.retry)
            .field("request_timeout", &self.request_timeout)
            .field("partial_failure", &self.partial_failure)
            .finish()
    }
}

impl SearchGateway {
    pub fn new(provider: Arc<dyn SearchProvider>, config: &SearchConfig) -> Self {
        Self {
            provider,
            retry: RetryPolicy::new(config.max_attempts, config.base_delay),
            request_timeout: config.request_timeout,
            partial_failure: config.partial_failure,
        }
    }

    pub async fn search(
        &self,
        entity_name: &str,
        country: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        let queries = entity_queries(entity_name);
        info!(entity = entity_name, country = ?country, "🔍 Searching {} queries", queries.len());

        let work = async {
            match self.partial_failure {
                PartialFailurePolicy::Abort => {
                    try_join_all(queries.iter().map(|q| self.search_with_retry(q, country))).await
                }
                PartialFailurePolicy::Degrade => {
                    let outcomes = join_all(queries.iter().map(|q| self.search_with_retry(q, country))).await;
                    let mut batches = Vec::with_capacity(outcomes.len());
                    let mut first_error = None;
                    for (query, outcome) in queries.iter().zip(outcomes) {
                        match outcome {
                            Ok(results) => batches.push(results),
                            Err(e) => {
                                warn!(query = %query, error = %e, "Dropping failed query from results");
                                first_error.get_or_insert(e);
                            }
                        }
                    }
                    match first_error {
                        Some(e) if batches.is_empty() => Err(e),
                        _ => Ok(batches),
                    }
                }
            }
        };

        let batches = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            batches = work => batches?,
        };

        let raw = batches.iter().map(Vec::len).sum::<usize>();
        let merged = dedupe_by_link(batches);
        info!(entity = entity_name, raw, unique = merged.len(), "✨ Search complete");
        Ok(merged)
    }

    async fn search_with_retry(
        &self,
        query: &str,
        country: Option<&str>,
    ) -> std::result::Result<Vec<SearchResult>, SearchError> {
        let mut attempt = 1;
        loop {
            let outcome = match tokio::time::timeout(self.request_timeout, self.provider.search(query, country)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SearchError::Timeout),
            };

            match outcome {
                Ok(results) => {
                    debug!(query, attempt, count = results.len(), "Query succeeded");
                    return Ok(results);
                }
                Err(e) if !e.is_transient() => {
                    warn!(query, attempt, error = %e, "Query failed with a permanent error");
                    return Err(e);
                }
                Err(e) => match self.retry.delay_after(attempt) {
                    Some(delay) => {
                        warn!(query, attempt, ?delay, error = %e, "Query failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        warn!(query, attempts = attempt, error = %e, "Query exhausted its retries");
                        return Err(SearchError::RetriesExhausted {
                            query: query.to_string(),
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                },
            }
        }
    }
}

/// Merges per-query results, keeping the first result seen for each
/// canonical link. Surviving results carry the canonical link.
pub fn dedupe_by_link(batches: Vec<Vec<SearchResult>>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();
    for result in batches.into_iter().flatten() {
        let link = canonical_link(&result.link);
        if seen.insert(link.clone()) {
            merged.push(SearchResult { link, ..result });
        }
    }
    merged
}
