use std::fmt;
use std::time::Duration;

pub mod aggregate;
pub mod classify;
pub mod models;

#[derive(Clone)]
pub struct InferenceConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub deepseek_model: Option<String>,
    /// Ollama endpoint with the model as path, e.g. `http://localhost:11434/gemma3:12b`
    pub ollama_url: Option<String>,
    pub request_timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: None,
            openai_api_key: None,
            openai_model: None,
            deepseek_api_key: None,
            deepseek_model: None,
            ollama_url: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_deref().map(|_| "<redacted>");
        f.debug_struct("InferenceConfig")
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("gemini_model", &self.gemini_model)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("deepseek_api_key", &redact(&self.deepseek_api_key))
            .field("deepseek_model", &self.deepseek_model)
            .field("ollama_url", &self.ollama_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

pub mod prelude {
    pub use super::InferenceConfig;
    pub use super::aggregate::summarize;
    pub use super::classify::{ClassificationOrchestrator, OrchestratorConfig};
    pub use super::models::{create_provider, create_registry, ProviderKind, ProviderRegistry};
    pub use nt_core::{ClassificationProvider, ClassifiedArticle, Result, Error};
}

pub use aggregate::summarize;
pub use classify::{ClassificationOrchestrator, OrchestratorConfig};
pub use models::{create_provider, create_registry, ProviderKind, ProviderRegistry};
