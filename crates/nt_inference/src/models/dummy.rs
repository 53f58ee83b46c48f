use std::fmt;

use async_trait::async_trait;
use nt_core::{Classification, ClassificationProvider, ProviderError, Sentiment};

const POSITIVE_CUES: &[&str] = &[
    "award", "beat", "beats", "boost", "breakthrough", "expands", "gain", "gains", "growth",
    "innovative", "launch", "launches", "praised", "profit", "record", "rise", "rises", "soar",
    "soars", "strong", "success", "surge", "win", "wins",
];

const NEGATIVE_CUES: &[&str] = &[
    "breach", "crisis", "cut", "cuts", "decline", "drop", "drops", "fall", "falls", "fine",
    "fraud", "layoff", "layoffs", "loss", "losses", "lawsuit", "probe", "recall", "scandal",
    "slump", "weak",
];

/// Offline provider that labels text by counting cue words.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClassificationProvider for DummyModel {
    fn name(&self) -> &str {
        "Dummy"
    }

    async fn classify(&self, title: &str, snippet: &str) -> Result<Classification, ProviderError> {
        let text = format!("{} {}", title, snippet).to_lowercase();
        let words = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty());

        let (mut positive, mut negative) = (0, 0);
        for word in words {
            if POSITIVE_CUES.contains(&word) {
                positive += 1;
            } else if NEGATIVE_CUES.contains(&word) {
                negative += 1;
            }
        }

        let sentiment = match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        };
        Ok(Classification {
            sentiment,
            reasoning: format!("Found {} positive and {} negative cue words.", positive, negative),
        })
    }
}
