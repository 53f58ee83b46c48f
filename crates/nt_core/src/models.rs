use async_trait::async_trait;
use crate::error::ProviderError;
use crate::types::Classification;

#[async_trait]
pub trait ClassificationProvider: Send + Sync {
    /// Name used for provider preference matching and attribution
    fn name(&self) -> &str;

    /// Classify the sentiment of one search result
    async fn classify(&self, title: &str, snippet: &str) -> Result<Classification, ProviderError>;
}
