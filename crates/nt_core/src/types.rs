use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

/// Reasoning attached to articles no provider could classify.
pub const FALLBACK_REASONING: &str = "Sentiment could not be determined; defaulted to neutral.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallSentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl OverallSentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallSentiment::Positive => "positive",
            OverallSentiment::Negative => "negative",
            OverallSentiment::Neutral => "neutral",
            OverallSentiment::Mixed => "mixed",
        }
    }
}

impl fmt::Display for OverallSentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverallSentiment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mixed" => Ok(OverallSentiment::Mixed),
            other => Sentiment::from_str(other).map(|s| match s {
                Sentiment::Positive => OverallSentiment::Positive,
                Sentiment::Negative => OverallSentiment::Negative,
                Sentiment::Neutral => OverallSentiment::Neutral,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub display_link: String,
}

/// Dedup key for a result link: the URL without its fragment. Unparsable
/// links are compared by their trimmed text.
pub fn canonical_link(link: &str) -> String {
    let trimmed = link.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// Output of a single successful provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedArticle {
    #[serde(flatten)]
    pub result: SearchResult,
    pub sentiment: Sentiment,
    pub reasoning: String,
    /// Name of the provider that produced the label; `None` for the fallback.
    pub provider: Option<String>,
}

impl ClassifiedArticle {
    pub fn new(result: SearchResult, classification: Classification, provider: &str) -> Self {
        Self {
            result,
            sentiment: classification.sentiment,
            reasoning: classification.reasoning,
            provider: Some(provider.to_string()),
        }
    }

    pub fn fallback(result: SearchResult) -> Self {
        Self {
            result,
            sentiment: Sentiment::Neutral,
            reasoning: FALLBACK_REASONING.to_string(),
            provider: None,
        }
    }

    pub fn link(&self) -> &str {
        &self.result.link
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

/// Result of an atomic increment-and-compare on a usage row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageIncrement {
    pub allowed: bool,
    pub record: UsageRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub current: u32,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub positive_pct: u32,
    pub negative_pct: u32,
    pub neutral_pct: u32,
    pub overall_sentiment: OverallSentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub entity_name: String,
    pub article: ClassifiedArticle,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub id: Uuid,
    pub user_id: String,
    pub entity_name: String,
    pub country_filter: Option<String>,
    pub provider_preference: Option<String>,
    pub summary: SentimentSummary,
    pub searched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub entity_name: String,
    #[serde(default)]
    pub country_filter: Option<String>,
    #[serde(default)]
    pub provider_preference: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub entity_name: String,
    pub country_filter: Option<String>,
    pub articles: Vec<ClassifiedArticle>,
    pub summary: SentimentSummary,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(AnalysisReport),
    RateLimited(QuotaStatus),
}
