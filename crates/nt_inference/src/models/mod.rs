use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use nt_core::{Classification, ClassificationProvider, Error, ProviderError, Result, Sentiment};
use serde::Deserialize;
use tracing::warn;

use crate::InferenceConfig;

pub mod dummy;
pub mod gemini;
pub mod ollama;
pub mod openai;

pub use dummy::DummyModel;
pub use gemini::GeminiModel;
pub use ollama::OllamaModel;
pub use openai::OpenAiCompatibleModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    DeepSeek,
    Ollama,
    Dummy,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Dummy => "dummy",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "ollama" => Ok(ProviderKind::Ollama),
            "dummy" => Ok(ProviderKind::Dummy),
            other => Err(Error::Config(format!("unknown classification provider: {}", other))),
        }
    }
}

/// Builds the prompt every remote provider receives.
pub fn build_prompt(title: &str, snippet: &str) -> String {
    format!(
        "Analyze the sentiment of this search result about a company or subject.\n\n\
         Title: {}\n\
         Snippet: {}\n\n\
         Respond with only a JSON object of the form \
         {{\"sentiment\": \"positive\" | \"negative\" | \"neutral\", \"reasoning\": \"<one short sentence>\"}}.",
        title.trim(),
        snippet.trim()
    )
}

#[derive(Deserialize)]
struct RawClassification {
    sentiment: String,
    #[serde(default)]
    reasoning: String,
}

/// Extracts and validates the `{sentiment, reasoning}` object from model
/// output. Surrounding prose and code fences are ignored.
pub fn parse_classification(text: &str) -> std::result::Result<Classification, ProviderError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => return Err(ProviderError::InvalidResponse("no JSON object in response".to_string())),
    };

    let raw: RawClassification = serde_json::from_str(json)
        .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
    let sentiment = Sentiment::from_str(&raw.sentiment).map_err(ProviderError::InvalidResponse)?;
    let reasoning = raw.reasoning.trim();
    if reasoning.is_empty() {
        return Err(ProviderError::InvalidResponse("missing reasoning".to_string()));
    }

    Ok(Classification {
        sentiment,
        reasoning: reasoning.to_string(),
    })
}

pub fn create_provider(kind: ProviderKind, config: &InferenceConfig) -> Result<Arc<dyn ClassificationProvider>> {
    let provider: Arc<dyn ClassificationProvider> = match kind {
        ProviderKind::Gemini => Arc::new(GeminiModel::new(
            config.gemini_api_key.clone(),
            config.gemini_model.clone(),
            config.request_timeout,
        )?),
        ProviderKind::OpenAi => Arc::new(OpenAiCompatibleModel::openai(
            config.openai_api_key.clone(),
            config.openai_model.clone(),
            config.request_timeout,
        )?),
        ProviderKind::DeepSeek => Arc::new(OpenAiCompatibleModel::deepseek(
            config.deepseek_api_key.clone(),
            config.deepseek_model.clone(),
            config.request_timeout,
        )?),
        ProviderKind::Ollama => Arc::new(OllamaModel::new(config.ollama_url.as_deref(), config.request_timeout)?),
        ProviderKind::Dummy => Arc::new(DummyModel::new()),
    };
    Ok(provider)
}

/// Builds providers in priority order, skipping those that cannot be
/// configured. Fails only if none remain.
pub fn create_registry(order: &[ProviderKind], config: &InferenceConfig) -> Result<ProviderRegistry> {
    let mut providers = Vec::with_capacity(order.len());
    for kind in order {
        match create_provider(*kind, config) {
            Ok(provider) => providers.push(provider),
            Err(e) => warn!(provider = %kind, error = %e, "Skipping classification provider"),
        }
    }
    if providers.is_empty() {
        return Err(Error::Config("no classification provider could be configured".to_string()));
    }
    Ok(ProviderRegistry::new(providers))
}

/// Classification providers in priority order.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ClassificationProvider>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Arc<dyn ClassificationProvider>>) -> Self {
        Self { providers }
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Providers in priority order, with the preferred one (if known) first.
    pub fn ordered(&self, preference: Option<&str>) -> Vec<Arc<dyn ClassificationProvider>> {
        let mut ordered = self.providers.clone();
        if let Some(preference) = preference.map(str::trim).filter(|p| !p.is_empty()) {
            match ordered.iter().position(|p| p.name().eq_ignore_ascii_case(preference)) {
                Some(index) => {
                    let preferred = ordered.remove(index);
                    ordered.insert(0, preferred);
                }
                None => warn!(preference, "Unknown provider preference, using configured order"),
            }
        }
        ordered
    }
}
