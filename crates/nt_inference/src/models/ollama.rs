use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use nt_core::{Classification, ClassificationProvider, Error, ProviderError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{build_prompt, parse_classification};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/gemma3:12b";
const DEFAULT_MODEL: &str = "gemma3:12b";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaModelConfig {
    ollama_host: String,
    ollama_port: u16,
    model_name: String,
}

impl Default for OllamaModelConfig {
    fn default() -> Self {
        Self {
            ollama_host: "http://localhost".to_string(),
            ollama_port: 11434,
            model_name: DEFAULT_MODEL.to_string(),
        }
    }
}

impl OllamaModelConfig {
    /// Parses `scheme://host[:port]/model`; the model defaults to gemma3:12b.
    pub fn from_url(url: Option<&str>) -> Result<Self> {
        let url = url.unwrap_or(DEFAULT_OLLAMA_URL);
        let parsed = Url::parse(url).map_err(|e| Error::Config(format!("invalid Ollama URL {}: {}", url, e)))?;

        let model_name = parsed.path().trim_start_matches('/').to_string();
        Ok(Self {
            ollama_host: format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or("localhost")),
            ollama_port: parsed.port().unwrap_or(11434),
            model_name: if model_name.is_empty() { DEFAULT_MODEL.to_string() } else { model_name },
        })
    }

    pub fn get_ollama_host(&self) -> &str {
        &self.ollama_host
    }

    pub fn get_ollama_port(&self) -> u16 {
        self.ollama_port
    }

    pub fn get_model_name(&self) -> &str {
        &self.model_name
    }

    fn generate_url(&self) -> String {
        format!("{}:{}/api/generate", self.ollama_host, self.ollama_port)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OllamaModel {
    client: Client,
    config: OllamaModelConfig,
}

impl fmt::Debug for OllamaModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaModel")
            .field("client", &"<reqwest::Client>")
            .field("config", &self.config)
            .finish()
    }
}

impl OllamaModel {
    pub fn new(url: Option<&str>, timeout: Duration) -> Result<Self> {
        let config = OllamaModelConfig::from_url(url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ClassificationProvider for OllamaModel {
    fn name(&self) -> &str {
        "Ollama"
    }

    async fn classify(&self, title: &str, snippet: &str) -> std::result::Result<Classification, ProviderError> {
        let request = GenerateRequest {
            model: self.config.get_model_name(),
            prompt: build_prompt(title, snippet),
            stream: false,
            format: "json",
        };

        let response = self
            .client
            .post(self.config.generate_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response = response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        parse_classification(&response.response)
    }
}
