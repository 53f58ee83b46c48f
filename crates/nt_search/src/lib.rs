use async_trait::async_trait;
use nt_core::{SearchError, SearchResult};
use std::time::Duration;

pub mod gateway;
pub mod google;
pub mod retry;

pub use gateway::SearchGateway;
pub use google::GoogleSearchProvider;
pub use retry::RetryPolicy;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns the name of the search backend
    fn name(&self) -> &str;

    /// Runs one query, optionally restricted to a country
    async fn search(&self, query: &str, country: Option<&str>) -> Result<Vec<SearchResult>, SearchError>;
}

/// What to do when some of the parallel queries fail for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartialFailurePolicy {
    /// Fail the whole search on the first exhausted query
    #[default]
    Abort,
    /// Keep the results of the queries that succeeded
    Degrade,
}

impl std::str::FromStr for PartialFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "degrade" => Ok(Self::Degrade),
            other => Err(format!("unknown partial failure policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub request_timeout: Duration,
    pub results_per_query: u8,
    pub partial_failure: PartialFailurePolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(15),
            results_per_query: 10,
            partial_failure: PartialFailurePolicy::Abort,
        }
    }
}

/// The fixed set of queries issued per entity, in merge order.
pub fn entity_queries(entity_name: &str) -> [String; 3] {
    let entity = entity_name.trim();
    [
        format!("{} news", entity),
        format!("{} reviews opinions", entity),
        format!("{} recent developments", entity),
    ]
}

pub mod prelude {
    pub use super::{SearchConfig, SearchGateway, SearchProvider, PartialFailurePolicy};
    pub use nt_core::{SearchResult, SearchError, Result, Error};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_queries() {
        let queries = entity_queries("  Acme Corp ");
        assert_eq!(queries[0], "Acme Corp news");
        assert_eq!(queries[1], "Acme Corp reviews opinions");
        assert_eq!(queries[2], "Acme Corp recent developments");
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Degrade".parse::<PartialFailurePolicy>().unwrap(), PartialFailurePolicy::Degrade);
        assert!("sometimes".parse::<PartialFailurePolicy>().is_err());
    }
}
