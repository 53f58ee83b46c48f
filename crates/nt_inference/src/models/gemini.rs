use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use nt_core::{Classification, ClassificationProvider, Error, ProviderError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{build_prompt, parse_classification};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize, Serialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Serialize)]
struct Part {
    #[serde(default)]
    text: String,
}

pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiModel {
    pub fn new(api_key: Option<String>, model: Option<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config(ProviderError::MissingApiKey("Gemini").to_string()))?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Concatenated text of the first candidate.
fn response_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().map(|p| p.text).collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl ClassificationProvider for GeminiModel {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn classify(&self, title: &str, snippet: &str) -> std::result::Result<Classification, ProviderError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(title, snippet) }] }],
            "generationConfig": {
                "temperature": 0.0,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
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
        let text = response_text(response)
            .ok_or_else(|| ProviderError::InvalidResponse("empty candidate list".to_string()))?;

        parse_classification(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nt_core::Sentiment;

    #[test]
    fn test_model_requires_api_key() {
        let result = GeminiModel::new(None, None, Duration::from_secs(5));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Configuration error: Gemini API key is required"
        );
        assert!(GeminiModel::new(Some("key".to_string()), None, Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [
                {"text": "{\"sentiment\": \"neutral\", "},
                {"text": "\"reasoning\": \"Routine filing.\"}"}
            ]}}]}"#,
        )
        .unwrap();
        let text = response_text(response).unwrap();
        let parsed = parse_classification(&text).unwrap();
        assert_eq!(parsed.sentiment, Sentiment::Neutral);
    }

    #[test]
    fn test_blocked_response_has_no_text() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#).unwrap();
        assert!(response_text(response).is_none());

        let response: GenerateResponse = serde_json::from_str(r#"{"promptFeedback": {}}"#).unwrap();
        assert!(response_text(response).is_none());
    }
}
