//! Search submission, status, cancellation, and statistics endpoints
//!
//! Callers identify themselves with an `X-User-Id` header carrying their
//! user UUID; ownership is enforced here, not by the storage layer.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{
    ExtractedContact, ProgressSnapshot, SearchConfiguration, SearchStage, SearchStatus,
};
use crate::services::search_orchestrator::{
    self, statistics, CancelOutcome,
};
use crate::{db, AppState};

fn require_user(headers: &HeaderMap) -> ApiResult<Uuid> {
    let value = headers
        .get("X-User-Id")
        .ok_or_else(|| ApiError::BadRequest("Missing X-User-Id header".to_string()))?;
    let text = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Invalid X-User-Id header".to_string()))?;
    Uuid::parse_str(text).map_err(|_| ApiError::BadRequest("X-User-Id is not a UUID".to_string()))
}

/// Immediate response to a submission
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub search_id: Uuid,
    pub status: SearchStatus,
    pub progress: ProgressSnapshot,
}

/// POST /searches
///
/// Validates the configuration, persists a PENDING record, queues it for
/// admission, and returns without waiting on the pipeline.
pub async fn submit_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(configuration): Json<SearchConfiguration>,
) -> ApiResult<(StatusCode, Json<SubmitResponse>)> {
    let user_id = require_user(&headers)?;

    let session = search_orchestrator::submit_search(&state, user_id, configuration).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            search_id: session.search_id,
            status: session.status,
            progress: session.progress,
        }),
    ))
}

/// Full status view of a search
#[derive(Debug, Serialize)]
pub struct SearchStatusView {
    pub search_id: Uuid,
    pub status: SearchStatus,
    pub stage: SearchStage,
    pub configuration: SearchConfiguration,
    pub progress: ProgressSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Distinct web sources discovered so far
    pub sources_found: u32,
    pub contacts_found: u32,
    pub contacts_imported: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Extracted contacts, populated once the search completes
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<ExtractedContact>,
}

/// GET /searches/:id
pub async fn get_search_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(search_id): Path<Uuid>,
) -> ApiResult<Json<SearchStatusView>> {
    let user_id = require_user(&headers)?;

    let session = search_orchestrator::get_search(&state, search_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Search {} not found", search_id)))?;

    let contacts = if session.status == SearchStatus::Completed {
        db::searches::load_contacts(&state.db, search_id).await?
    } else {
        Vec::new()
    };
    let sources_found = db::searches::count_sources(&state.db, search_id).await?;

    Ok(Json(SearchStatusView {
        search_id: session.search_id,
        status: session.status,
        stage: session.stage,
        configuration: session.configuration,
        progress: session.progress,
        error: session.error,
        sources_found,
        contacts_found: session.contacts_found,
        contacts_imported: session.contacts_imported,
        created_at: session.created_at,
        started_at: session.started_at,
        completed_at: session.completed_at,
        contacts,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /searches/:id/cancel
///
/// Failure to cancel (unknown id, already terminal) is a 200 with
/// `success: false`, not an error status.
pub async fn cancel_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(search_id): Path<Uuid>,
    body: Option<Json<CancelRequest>>,
) -> ApiResult<Json<CancelOutcome>> {
    let user_id = require_user(&headers)?;
    let reason = body.and_then(|Json(req)| req.reason);

    let outcome =
        search_orchestrator::cancel_search(&state, search_id, user_id, reason).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    /// Window the statistics to the last N days of submissions
    pub days: Option<u32>,
}

/// GET /statistics
pub async fn get_statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<StatisticsQuery>,
) -> ApiResult<Json<statistics::SearchStatistics>> {
    let user_id = require_user(&headers)?;
    let stats = statistics::compute(&state.db, user_id, query.days).await?;
    Ok(Json(stats))
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/searches", post(submit_search))
        .route("/searches/:id", get(get_search_status))
        .route("/searches/:id/cancel", post(cancel_search))
        .route("/statistics", get(get_statistics))
}
