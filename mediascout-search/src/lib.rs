//! MediaScout search orchestration service
//!
//! Accepts media-contact search requests, drives them through a staged
//! pipeline (query generation, web search, content scraping, contact
//! extraction), and exposes status, statistics, health, and progress events
//! over HTTP.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod providers;
pub mod services;
pub mod similarity;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use mediascout_common::config::ServiceConfig;
use mediascout_common::events::EventBus;
use mediascout_common::{Error, Result};

use crate::providers::ProviderSet;
use crate::services::scheduler::Scheduler;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service configuration
    pub config: Arc<ServiceConfig>,
    /// Provider adapters
    pub providers: ProviderSet,
    /// Cancellation tokens for searches that are queued or processing
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Admission scheduler, installed once after construction
    scheduler: Arc<OnceLock<Arc<Scheduler>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        config: Arc<ServiceConfig>,
        providers: ProviderSet,
    ) -> Self {
        Self {
            db,
            event_bus,
            config,
            providers,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            scheduler: Arc::new(OnceLock::new()),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Install the scheduler after both it and the state exist.
    ///
    /// The scheduler's runner captures a clone of this state, so the state
    /// must be built first and the scheduler attached afterwards.
    pub fn set_scheduler(&self, scheduler: Arc<Scheduler>) {
        let _ = self.scheduler.set(scheduler);
    }

    /// The admission scheduler, erroring if startup never installed one
    pub fn scheduler(&self) -> Result<Arc<Scheduler>> {
        self.scheduler
            .get()
            .cloned()
            .ok_or_else(|| Error::Internal("scheduler not initialized".to_string()))
    }
}

/// Build the application state with its scheduler wired to the pipeline
pub fn init_state(
    db: SqlitePool,
    event_bus: EventBus,
    config: Arc<ServiceConfig>,
    providers: ProviderSet,
) -> AppState {
    let state = AppState::new(db, event_bus, config.clone(), providers);

    let runner_state = state.clone();
    let scheduler = Scheduler::start(
        config.max_concurrent_searches,
        Arc::new(move |search_id| {
            let state = runner_state.clone();
            Box::pin(services::search_orchestrator::run_search(state, search_id))
        }),
    );
    state.set_scheduler(scheduler);
    state
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::search_routes())
        .merge(api::health_routes())
        .route("/searches/events", get(api::event_stream))
        .with_state(state)
}
