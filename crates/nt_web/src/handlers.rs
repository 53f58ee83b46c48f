use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use nt_core::{AnalysisOutcome, AnalyzeRequest, Error};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::AppState;

pub const USER_HEADER: &str = "x-user-id";
const DEFAULT_LIMIT: usize = 20;

/// Pipeline errors rendered as JSON `{ "error": ... }` with a matching status.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Search(_) => StatusCode::BAD_GATEWAY,
            Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

impl ListParams {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError(Error::InvalidInput(format!("missing {} header", USER_HEADER))))
}

pub async fn analyze_sentiment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Response, ApiError> {
    let user_id = user_id(&headers)?;

    // Cancelled when the client goes away and this future is dropped
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.pipeline.analyze(&user_id, &request, &cancel).await? {
        AnalysisOutcome::Completed(report) => Ok(Json(report).into_response()),
        AnalysisOutcome::RateLimited(status) => Ok((StatusCode::TOO_MANY_REQUESTS, Json(status)).into_response()),
    }
}

pub async fn get_usage(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.pipeline.usage(&user_id).await?))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    Json(state.pipeline.recent_history(&user_id, params.limit()).await)
}

pub async fn get_articles(
    State(state): State<Arc<AppState>>,
    Path(entity): Path<String>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    Json(state.pipeline.articles_for_entity(&entity, params.limit()).await)
}
