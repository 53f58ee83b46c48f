use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use nt_core::{SearchError, SearchResult, SystemClock};
use nt_inference::models::DummyModel;
use nt_inference::{ClassificationOrchestrator, OrchestratorConfig, ProviderRegistry};
use nt_pipeline::{PipelineConfig, SentimentPipeline};
use nt_search::{SearchConfig, SearchGateway, SearchProvider};
use nt_storage::MemoryStorage;
use nt_web::{create_app, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

struct FixedSearch {
    fail: bool,
}

#[async_trait]
impl SearchProvider for FixedSearch {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn search(&self, query: &str, _country: Option<&str>) -> Result<Vec<SearchResult>, SearchError> {
        if self.fail {
            return Err(SearchError::Status {
                status: 403,
                body: "quota project disabled".to_string(),
            });
        }
        Ok(vec![SearchResult {
            title: format!("{}: shares soar on record profit", query),
            link: format!("https://news.example.com/{}", query.replace(' ', "-")),
            snippet: "Analysts praised the launch".to_string(),
            display_link: "news.example.com".to_string(),
        }])
    }
}

fn app(daily_limit: u32, search_fails: bool) -> Router {
    let pipeline = SentimentPipeline::new(
        SearchGateway::new(Arc::new(FixedSearch { fail: search_fails }), &SearchConfig::default()),
        ProviderRegistry::new(vec![Arc::new(DummyModel::new())]),
        ClassificationOrchestrator::new(OrchestratorConfig::default()),
        Arc::new(MemoryStorage::new()),
        Arc::new(SystemClock),
        &PipelineConfig {
            daily_limit,
            ..PipelineConfig::default()
        },
    );
    create_app(AppState::new(Arc::new(pipeline)))
}

fn analyze(user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/sentiment")
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_analyze_returns_report() {
    let app = app(50, false);
    let (status, body) = send(&app, analyze(Some("alice"), json!({ "entity_name": "Acme" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entity_name"], "Acme");
    assert_eq!(body["summary"]["total"], 3);
    assert_eq!(body["summary"]["overall_sentiment"], "positive");
    assert_eq!(body["articles"].as_array().unwrap().len(), 3);
    assert_eq!(body["articles"][0]["sentiment"], "positive");
    assert_eq!(body["articles"][0]["provider"], "Dummy");

    let (status, usage) = send(&app, get("/api/usage/alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(usage["current"], 1);
    assert_eq!(usage["limit"], 50);

    let (_, history) = send(&app, get("/api/history/alice")).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["entity_name"], "Acme");

    let (_, articles) = send(&app, get("/api/articles/Acme?limit=2")).await;
    assert_eq!(articles.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_quota_exceeded_is_429() {
    let app = app(1, false);
    let (status, _) = send(&app, analyze(Some("alice"), json!({ "entity_name": "Acme" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, analyze(Some("alice"), json!({ "entity_name": "Globex" }))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["allowed"], false);
    assert_eq!(body["current"], 1);
    assert_eq!(body["limit"], 1);
    assert!(body["reset_at"].is_string());
}

#[tokio::test]
async fn test_search_failure_is_502() {
    let app = app(50, true);
    let (status, body) = send(&app, analyze(Some("alice"), json!({ "entity_name": "Acme" }))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("403"));
}

#[tokio::test]
async fn test_bad_requests_are_400() {
    let app = app(50, false);

    let (status, body) = send(&app, analyze(None, json!({ "entity_name": "Acme" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("x-user-id"));

    let (status, _) = send(&app, analyze(Some("alice"), json!({ "entity_name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, usage) = send(&app, get("/api/usage/alice")).await;
    assert_eq!(usage["current"], 0);
}
