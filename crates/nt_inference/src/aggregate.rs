use nt_core::{ClassifiedArticle, OverallSentiment, Sentiment, SentimentSummary};

/// Share above which a single label becomes the overall sentiment.
pub const DOMINANCE_THRESHOLD_PCT: u32 = 60;

/// Integer percentage rounded half up: `(count * 100 + total / 2) / total`.
pub fn percentage(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count * 100 + total / 2) / total) as u32
}

fn overall(positive_pct: u32, negative_pct: u32, neutral_pct: u32, total: usize) -> OverallSentiment {
    if total == 0 {
        OverallSentiment::Neutral
    } else if positive_pct > DOMINANCE_THRESHOLD_PCT {
        OverallSentiment::Positive
    } else if negative_pct > DOMINANCE_THRESHOLD_PCT {
        OverallSentiment::Negative
    } else if neutral_pct > DOMINANCE_THRESHOLD_PCT {
        OverallSentiment::Neutral
    } else {
        OverallSentiment::Mixed
    }
}

pub fn summarize(items: &[ClassifiedArticle]) -> SentimentSummary {
    let count = |sentiment: Sentiment| items.iter().filter(|a| a.sentiment == sentiment).count();
    let positive = count(Sentiment::Positive);
    let negative = count(Sentiment::Negative);
    let neutral = count(Sentiment::Neutral);
    let total = items.len();

    let positive_pct = percentage(positive, total);
    let negative_pct = percentage(negative, total);
    let neutral_pct = percentage(neutral, total);

    SentimentSummary {
        total,
        positive,
        negative,
        neutral,
        positive_pct,
        negative_pct,
        neutral_pct,
        overall_sentiment: overall(positive_pct, negative_pct, neutral_pct, total),
    }
}
