//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::providers::ServiceHealth;
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Worst-case status across provider adapters
    pub status: String,
    /// Module name
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Per-adapter health reports
    pub services: Vec<ServiceHealth>,
    /// Searches currently processing
    pub active_searches: usize,
    /// Searches waiting for admission
    pub queue_size: usize,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
///
/// Overall status is the worst individual adapter status, never an average.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let services = state.providers.health_statuses();
    let status = state.providers.overall_health().as_str().to_string();

    let (active_searches, queue_size) = match state.scheduler() {
        Ok(scheduler) => (scheduler.active_count(), scheduler.queue_size()),
        Err(_) => (0, 0),
    };

    let last_error = state.last_error.read().await.clone();

    Json(HealthResponse {
        status,
        module: "mediascout-search".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        services,
        active_searches,
        queue_size,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
