use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use nt_core::{Classification, ClassificationProvider, Error, ProviderError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{build_prompt, parse_classification};

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

/// Any service speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleModel {
    client: Client,
    name: &'static str,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCompatibleModel {
    pub fn new(
        name: &'static str,
        api_key: Option<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config(ProviderError::MissingApiKey(name).to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            name,
            api_key,
            base_url: base_url.into(),
            model: model.into(),
        })
    }

    pub fn openai(api_key: Option<String>, model: Option<String>, timeout: Duration) -> Result<Self> {
        Self::new(
            "OpenAI",
            api_key,
            "https://api.openai.com/v1",
            model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            timeout,
        )
    }

    pub fn deepseek(api_key: Option<String>, model: Option<String>, timeout: Duration) -> Result<Self> {
        Self::new(
            "DeepSeek",
            api_key,
            "https://api.deepseek.com/v1",
            model.unwrap_or_else(|| "deepseek-chat".to_string()),
            timeout,
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for OpenAiCompatibleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatibleModel")
            .field("name", &self.name)
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl ClassificationProvider for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        self.name
    }

    async fn classify(&self, title: &str, snippet: &str) -> std::result::Result<Classification, ProviderError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(title, snippet),
            }],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
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
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".to_string()))?;

        parse_classification(&content)
    }
}
