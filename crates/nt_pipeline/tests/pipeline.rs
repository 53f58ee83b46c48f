use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use nt_core::{
    AnalysisOutcome, AnalyzeRequest, ArticleStorage, Classification, ClassificationProvider, ClassifiedArticle,
    Error, ManualClock, OverallSentiment, ProviderError, SearchError, SearchHistory, SearchHistoryEntry,
    SearchResult, Sentiment, StoredArticle, UsageIncrement, UsageRecord, UsageStorage,
};
use nt_inference::{ClassificationOrchestrator, OrchestratorConfig, ProviderRegistry};
use nt_pipeline::{PipelineConfig, SentimentPipeline};
use nt_search::{SearchConfig, SearchGateway, SearchProvider};
use nt_storage::MemoryStorage;
use tokio_util::sync::CancellationToken;

struct CountingSearch {
    calls: AtomicUsize,
    fail: bool,
}

impl CountingSearch {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for CountingSearch {
    fn name(&self) -> &str {
        "counting"
    }

    async fn search(&self, query: &str, _country: Option<&str>) -> Result<Vec<SearchResult>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SearchError::RateLimited);
        }
        // every query shares the "shared" link
        Ok(["shared", query]
            .iter()
            .map(|slug| SearchResult {
                title: format!("{} headline", slug),
                link: format!("https://news.example.com/{}", slug.replace(' ', "-")),
                snippet: "Acme posts record profit".to_string(),
                display_link: "news.example.com".to_string(),
            })
            .collect())
    }
}

struct CountingClassifier {
    name: &'static str,
    sentiment: Sentiment,
    calls: AtomicUsize,
}

impl CountingClassifier {
    fn new(name: &'static str, sentiment: Sentiment) -> Arc<Self> {
        Arc::new(Self {
            name,
            sentiment,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassificationProvider for CountingClassifier {
    fn name(&self) -> &str {
        self.name
    }

    async fn classify(&self, _title: &str, _snippet: &str) -> Result<Classification, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Classification {
            sentiment: self.sentiment,
            reasoning: format!("{} verdict", self.name),
        })
    }
}

/// Storage whose every operation fails.
struct BrokenStorage;

fn broken() -> Error {
    Error::Storage("disk on fire".to_string())
}

#[async_trait]
impl ArticleStorage for BrokenStorage {
    async fn upsert_article(&self, _: &str, _: &ClassifiedArticle, _: DateTime<Utc>) -> nt_core::Result<()> {
        Err(broken())
    }

    async fn articles_for_entity(&self, _: &str, _: usize) -> nt_core::Result<Vec<StoredArticle>> {
        Err(broken())
    }
}

#[async_trait]
impl SearchHistory for BrokenStorage {
    async fn append_history(&self, _: &SearchHistoryEntry) -> nt_core::Result<()> {
        Err(broken())
    }

    async fn history_for_user(&self, _: &str, _: usize) -> nt_core::Result<Vec<SearchHistoryEntry>> {
        Err(broken())
    }
}

#[async_trait]
impl UsageStorage for BrokenStorage {
    async fn increment_usage(&self, _: &str, _: NaiveDate, _: u32, _: DateTime<Utc>) -> nt_core::Result<UsageIncrement> {
        Err(broken())
    }

    async fn get_usage(&self, _: &str, _: NaiveDate) -> nt_core::Result<Option<UsageRecord>> {
        Err(broken())
    }
}

/// Counts usage normally but rejects every article and history write.
#[derive(Default)]
struct ReadOnlyStorage {
    inner: MemoryStorage,
}

#[async_trait]
impl ArticleStorage for ReadOnlyStorage {
    async fn upsert_article(&self, _: &str, _: &ClassifiedArticle, _: DateTime<Utc>) -> nt_core::Result<()> {
        Err(broken())
    }

    async fn articles_for_entity(&self, entity_name: &str, limit: usize) -> nt_core::Result<Vec<StoredArticle>> {
        self.inner.articles_for_entity(entity_name, limit).await
    }
}

#[async_trait]
impl SearchHistory for ReadOnlyStorage {
    async fn append_history(&self, _: &SearchHistoryEntry) -> nt_core::Result<()> {
        Err(broken())
    }

    async fn history_for_user(&self, user_id: &str, limit: usize) -> nt_core::Result<Vec<SearchHistoryEntry>> {
        self.inner.history_for_user(user_id, limit).await
    }
}

#[async_trait]
impl UsageStorage for ReadOnlyStorage {
    async fn increment_usage(
        &self,
        user_id: &str,
        date: NaiveDate,
        limit: u32,
        reset_at: DateTime<Utc>,
    ) -> nt_core::Result<UsageIncrement> {
        self.inner.increment_usage(user_id, date, limit, reset_at).await
    }

    async fn get_usage(&self, user_id: &str, date: NaiveDate) -> nt_core::Result<Option<UsageRecord>> {
        self.inner.get_usage(user_id, date).await
    }
}

struct Harness {
    pipeline: SentimentPipeline,
    search: Arc<CountingSearch>,
    primary: Arc<CountingClassifier>,
    secondary: Arc<CountingClassifier>,
    clock: Arc<ManualClock>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

fn harness_with(storage: Arc<dyn nt_core::Persistence>, daily_limit: u32, search_fails: bool) -> Harness {
    let search = CountingSearch::new(search_fails);
    let primary = CountingClassifier::new("Primary", Sentiment::Positive);
    let secondary = CountingClassifier::new("Secondary", Sentiment::Negative);
    let clock = Arc::new(ManualClock::new(start()));

    let search_config = SearchConfig {
        base_delay: Duration::from_millis(10),
        ..SearchConfig::default()
    };
    let orchestrator = ClassificationOrchestrator::new(OrchestratorConfig {
        inter_batch_delay: Duration::from_millis(10),
        ..OrchestratorConfig::default()
    });
    let registry = ProviderRegistry::new(vec![primary.clone(), secondary.clone()]);
    let config = PipelineConfig {
        daily_limit,
        ..PipelineConfig::default()
    };

    let pipeline = SentimentPipeline::new(
        SearchGateway::new(search.clone(), &search_config),
        registry,
        orchestrator,
        storage,
        clock.clone(),
        &config,
    );
    Harness {
        pipeline,
        search,
        primary,
        secondary,
        clock,
    }
}

fn harness(daily_limit: u32) -> Harness {
    harness_with(Arc::new(MemoryStorage::new()), daily_limit, false)
}

#[tokio::test]
async fn test_completed_analysis_dedupes_and_summarizes() {
    let h = harness(50);
    let outcome = h
        .pipeline
        .analyze("alice", &AnalyzeRequest::new("  Acme  "), &CancellationToken::new())
        .await
        .unwrap();

    let AnalysisOutcome::Completed(report) = outcome else {
        panic!("expected a completed report");
    };
    assert_eq!(report.entity_name, "Acme");
    // 3 queries x 2 results, one link shared by all three
    assert_eq!(report.articles.len(), 4);
    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.positive, 4);
    assert_eq!(report.summary.overall_sentiment, OverallSentiment::Positive);
    assert_eq!(h.search.calls(), 3);
    assert_eq!(h.primary.calls(), 4);
    assert_eq!(h.secondary.calls(), 0);

    let history = h.pipeline.recent_history("alice", 10).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].summary, report.summary);
    assert_eq!(h.pipeline.articles_for_entity("acme", 10).await.len(), 4);
    assert_eq!(h.pipeline.usage("alice").await.unwrap().current, 1);
}

#[tokio::test]
async fn test_exhausted_quota_makes_no_outbound_calls() {
    let h = harness(50);
    let cancel = CancellationToken::new();
    for i in 0..50 {
        let request = AnalyzeRequest::new(format!("Entity {}", i));
        assert!(matches!(
            h.pipeline.analyze("alice", &request, &cancel).await.unwrap(),
            AnalysisOutcome::Completed(_)
        ));
    }
    let searches = h.search.calls();
    let classifications = h.primary.calls();

    let outcome = h
        .pipeline
        .analyze("alice", &AnalyzeRequest::new("Fresh Entity"), &cancel)
        .await
        .unwrap();

    let AnalysisOutcome::RateLimited(status) = outcome else {
        panic!("expected the rate-limited outcome");
    };
    assert!(!status.allowed);
    assert_eq!(status.current, 50);
    assert_eq!(status.limit, 50);
    assert_eq!(status.reset_at, Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
    assert_eq!(h.search.calls(), searches);
    assert_eq!(h.primary.calls(), classifications);
}

#[tokio::test]
async fn test_quota_rolls_over_at_midnight() {
    let h = harness(1);
    let cancel = CancellationToken::new();

    assert!(matches!(
        h.pipeline.analyze("alice", &AnalyzeRequest::new("Acme"), &cancel).await.unwrap(),
        AnalysisOutcome::Completed(_)
    ));
    assert!(matches!(
        h.pipeline.analyze("alice", &AnalyzeRequest::new("Globex"), &cancel).await.unwrap(),
        AnalysisOutcome::RateLimited(_)
    ));

    h.clock.set(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
    assert!(matches!(
        h.pipeline.analyze("alice", &AnalyzeRequest::new("Globex"), &cancel).await.unwrap(),
        AnalysisOutcome::Completed(_)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_search_failure_is_an_error_not_a_quota_result() {
    let h = harness_with(Arc::new(MemoryStorage::new()), 50, true);
    let err = h
        .pipeline
        .analyze("alice", &AnalyzeRequest::new("Acme"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Search(SearchError::RetriesExhausted { .. })));
    assert_eq!(h.primary.calls(), 0);
    assert!(h.pipeline.recent_history("alice", 10).await.is_empty());
}

#[tokio::test]
async fn test_cached_report_consumes_no_quota() {
    let h = harness(50);
    let cancel = CancellationToken::new();
    let request = AnalyzeRequest::new("Acme");

    h.pipeline.analyze("alice", &request, &cancel).await.unwrap();
    let again = h
        .pipeline
        .analyze("bob", &AnalyzeRequest::new("ACME"), &cancel)
        .await
        .unwrap();

    assert!(matches!(again, AnalysisOutcome::Completed(_)));
    assert_eq!(h.search.calls(), 3);
    assert_eq!(h.pipeline.usage("bob").await.unwrap().current, 0);

    // a different country is a different report
    let request = AnalyzeRequest {
        country_filter: Some("de".to_string()),
        ..request
    };
    h.pipeline.analyze("alice", &request, &cancel).await.unwrap();
    assert_eq!(h.search.calls(), 6);

    h.clock.advance(chrono::Duration::hours(1));
    h.pipeline.analyze("alice", &AnalyzeRequest::new("Acme"), &cancel).await.unwrap();
    assert_eq!(h.search.calls(), 9);
}

#[tokio::test]
async fn test_provider_preference_reorders_providers() {
    let h = harness(50);
    let request = AnalyzeRequest {
        provider_preference: Some("secondary".to_string()),
        ..AnalyzeRequest::new("Acme")
    };
    let outcome = h
        .pipeline
        .analyze("alice", &request, &CancellationToken::new())
        .await
        .unwrap();

    let AnalysisOutcome::Completed(report) = outcome else {
        panic!("expected a completed report");
    };
    assert_eq!(report.summary.overall_sentiment, OverallSentiment::Negative);
    assert_eq!(h.primary.calls(), 0);
    assert!(report.articles.iter().all(|a| a.provider.as_deref() == Some("Secondary")));
}

#[tokio::test]
async fn test_blank_entity_is_rejected_before_the_quota_gate() {
    let h = harness(50);
    let err = h
        .pipeline
        .analyze("alice", &AnalyzeRequest::new("   "), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(h.pipeline.usage("alice").await.unwrap().current, 0);
    assert_eq!(h.search.calls(), 0);
}

#[tokio::test]
async fn test_storage_failure_at_the_gate_fails_closed() {
    let h = harness_with(Arc::new(BrokenStorage), 50, false);
    let err = h
        .pipeline
        .analyze("alice", &AnalyzeRequest::new("Acme"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(h.search.calls(), 0);
    assert!(h.pipeline.recent_history("alice", 10).await.is_empty());
    assert!(h.pipeline.articles_for_entity("Acme", 10).await.is_empty());
}

#[tokio::test]
async fn test_cancelled_request_stops() {
    let h = harness(50);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .pipeline
        .analyze("alice", &AnalyzeRequest::new("Acme"), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
    assert_eq!(h.primary.calls(), 0);
}

#[tokio::test]
async fn test_cached_report_is_withheld_from_an_exhausted_user() {
    let h = harness(1);
    let cancel = CancellationToken::new();

    h.pipeline.analyze("bob", &AnalyzeRequest::new("Acme"), &cancel).await.unwrap();
    h.pipeline.analyze("alice", &AnalyzeRequest::new("Globex"), &cancel).await.unwrap();
    assert!(!h.pipeline.usage("alice").await.unwrap().allowed);

    let outcome = h
        .pipeline
        .analyze("alice", &AnalyzeRequest::new("Acme"), &cancel)
        .await
        .unwrap();
    let AnalysisOutcome::RateLimited(status) = outcome else {
        panic!("expected the rate-limited outcome");
    };
    assert_eq!(status.current, 1);
    assert_eq!(status.limit, 1);
    assert_eq!(h.search.calls(), 6);

    // a user with calls left still gets the cached copy for free
    let outcome = h
        .pipeline
        .analyze("carol", &AnalyzeRequest::new("Acme"), &cancel)
        .await
        .unwrap();
    assert!(matches!(outcome, AnalysisOutcome::Completed(_)));
    assert_eq!(h.pipeline.usage("carol").await.unwrap().current, 0);
    assert_eq!(h.search.calls(), 6);
}

#[tokio::test]
async fn test_failed_writes_do_not_abort_a_computed_report() {
    let h = harness_with(Arc::new(ReadOnlyStorage::default()), 50, false);
    let outcome = h
        .pipeline
        .analyze("alice", &AnalyzeRequest::new("Acme"), &CancellationToken::new())
        .await
        .unwrap();

    let AnalysisOutcome::Completed(report) = outcome else {
        panic!("expected a completed report");
    };
    assert_eq!(report.summary.total, 4);
    assert_eq!(report.summary.positive, 4);
    assert_eq!(report.summary.positive_pct, 100);
    assert_eq!(report.summary.overall_sentiment, OverallSentiment::Positive);
    assert_eq!(h.pipeline.usage("alice").await.unwrap().current, 1);
    assert!(h.pipeline.recent_history("alice", 10).await.is_empty());
    assert!(h.pipeline.articles_for_entity("Acme", 10).await.is_empty());
}

#[tokio::test]
async fn test_usage_reports_storage_errors() {
    let h = harness_with(Arc::new(BrokenStorage), 50, false);
    assert!(matches!(h.pipeline.usage("alice").await, Err(Error::Storage(_))));
}
