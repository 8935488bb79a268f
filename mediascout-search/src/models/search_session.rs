//! Search workflow state machine
//!
//! A search moves through PENDING → PROCESSING → {COMPLETED | FAILED |
//! CANCELLED}. While PROCESSING, it advances through a fixed stage sequence:
//! INITIALIZING → QUERY_GENERATION → WEB_SEARCH → CONTENT_SCRAPING →
//! CONTACT_EXTRACTION → RESULT_AGGREGATION → FINALIZATION → COMPLETED.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::search_config::SearchConfiguration;

/// Top-level search lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SearchStatus {
    /// Accepted and queued, not yet admitted to processing
    Pending,
    /// Admitted, pipeline stages executing
    Processing,
    /// Pipeline finished successfully
    Completed,
    /// Pipeline failed at some stage
    Failed,
    /// Cancelled by the owner
    Cancelled,
}

impl SearchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SearchStatus::Completed | SearchStatus::Failed | SearchStatus::Cancelled
        )
    }
}

/// Pipeline stage within PROCESSING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchStage {
    Initializing,
    QueryGeneration,
    WebSearch,
    ContentScraping,
    ContactExtraction,
    ResultAggregation,
    Finalization,
    Completed,
}

impl SearchStage {
    /// Relative weight of each stage toward overall percentage.
    ///
    /// Weights sum to 100; percentage at stage entry is the sum of weights
    /// of all stages already finished.
    pub fn weight(&self) -> f64 {
        match self {
            SearchStage::Initializing => 5.0,
            SearchStage::QueryGeneration => 15.0,
            SearchStage::WebSearch => 25.0,
            SearchStage::ContentScraping => 25.0,
            SearchStage::ContactExtraction => 20.0,
            SearchStage::ResultAggregation => 5.0,
            SearchStage::Finalization => 5.0,
            SearchStage::Completed => 0.0,
        }
    }

    /// Percentage complete when this stage begins
    pub fn base_percentage(&self) -> f64 {
        ALL_STAGES
            .iter()
            .take_while(|s| **s != *self)
            .map(|s| s.weight())
            .sum()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStage::Initializing => "INITIALIZING",
            SearchStage::QueryGeneration => "QUERY_GENERATION",
            SearchStage::WebSearch => "WEB_SEARCH",
            SearchStage::ContentScraping => "CONTENT_SCRAPING",
            SearchStage::ContactExtraction => "CONTACT_EXTRACTION",
            SearchStage::ResultAggregation => "RESULT_AGGREGATION",
            SearchStage::Finalization => "FINALIZATION",
            SearchStage::Completed => "COMPLETED",
        }
    }
}

/// Stage execution order
pub const ALL_STAGES: [SearchStage; 8] = [
    SearchStage::Initializing,
    SearchStage::QueryGeneration,
    SearchStage::WebSearch,
    SearchStage::ContentScraping,
    SearchStage::ContactExtraction,
    SearchStage::ResultAggregation,
    SearchStage::Finalization,
    SearchStage::Completed,
];

/// Status transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusTransition {
    pub search_id: Uuid,
    pub old_status: SearchStatus,
    pub new_status: SearchStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Search session record
///
/// Created on submission, mutated at every stage transition, persisted
/// after each mutation. Never deleted by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSession {
    /// Unique search identifier
    pub search_id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Lifecycle status
    pub status: SearchStatus,

    /// Current pipeline stage
    pub stage: SearchStage,

    /// Originating configuration (immutable after submission)
    pub configuration: SearchConfiguration,

    /// Progress tracking
    pub progress: ProgressSnapshot,

    /// Failure reason when status is FAILED
    pub error: Option<String>,

    /// Contacts discovered by extraction
    pub contacts_found: u32,

    /// Contacts accepted past the confidence threshold
    pub contacts_imported: u32,

    /// Submission time
    pub created_at: DateTime<Utc>,

    /// Time admitted to processing
    pub started_at: Option<DateTime<Utc>>,

    /// Time a terminal status was reached
    pub completed_at: Option<DateTime<Utc>>,
}

/// Observable progress of an in-flight search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Percentage complete (0.0 - 100.0)
    pub percentage: f64,

    /// Steps completed within the current stage
    pub current_step: usize,

    /// Total steps within the current stage (0 when unknown)
    pub total_steps: usize,

    /// Current operation description
    pub message: String,

    /// Elapsed time since admission (seconds)
    pub elapsed_seconds: u64,

    /// Estimated remaining time (seconds), None if unknown
    pub estimated_remaining_seconds: Option<u64>,

    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            percentage: 0.0,
            current_step: 0,
            total_steps: 0,
            message: String::from("Waiting for admission..."),
            elapsed_seconds: 0,
            estimated_remaining_seconds: None,
            updated_at: Utc::now(),
        }
    }
}

impl SearchSession {
    /// Create a new session in PENDING
    pub fn new(user_id: Uuid, configuration: SearchConfiguration) -> Self {
        Self {
            search_id: Uuid::new_v4(),
            user_id,
            status: SearchStatus::Pending,
            stage: SearchStage::Initializing,
            configuration,
            progress: ProgressSnapshot::default(),
            error: None,
            contacts_found: 0,
            contacts_imported: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Transition to a new lifecycle status
    ///
    /// Stamps `started_at` on entering PROCESSING and `completed_at` on
    /// entering any terminal status. Callers must not transition out of a
    /// terminal status; terminal checks happen at the operation boundary.
    pub fn transition_to(&mut self, new_status: SearchStatus) -> StatusTransition {
        let transition = StatusTransition {
            search_id: self.search_id,
            old_status: self.status,
            new_status,
            transitioned_at: Utc::now(),
        };
        self.status = new_status;

        match new_status {
            SearchStatus::Processing => {
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
            }
            SearchStatus::Completed | SearchStatus::Failed | SearchStatus::Cancelled => {
                self.completed_at = Some(Utc::now());
            }
            SearchStatus::Pending => {}
        }

        transition
    }

    /// Enter a pipeline stage, resetting sub-step counters
    pub fn enter_stage(&mut self, stage: SearchStage, message: String) {
        self.stage = stage;
        self.progress.percentage = stage.base_percentage();
        self.progress.current_step = 0;
        self.progress.total_steps = 0;
        self.progress.message = message;
        self.refresh_timing();
    }

    /// Update sub-step progress within the current stage
    ///
    /// Percentage interpolates linearly across the stage's weight, so it is
    /// monotonically non-decreasing across the pipeline.
    pub fn update_progress(&mut self, current: usize, total: usize, message: String) {
        self.progress.current_step = current;
        self.progress.total_steps = total;
        let fraction = if total > 0 {
            (current as f64 / total as f64).min(1.0)
        } else {
            0.0
        };
        self.progress.percentage = self.stage.base_percentage() + self.stage.weight() * fraction;
        self.progress.message = message;
        self.refresh_timing();
    }

    fn refresh_timing(&mut self) {
        let anchor = self.started_at.unwrap_or(self.created_at);
        let elapsed = (Utc::now() - anchor).num_seconds().max(0) as u64;
        self.progress.elapsed_seconds = elapsed;

        // Estimate remaining time from overall percentage
        if self.progress.percentage > 0.0 && self.progress.percentage < 100.0 && elapsed > 0 {
            let rate = elapsed as f64 / self.progress.percentage;
            let remaining = ((100.0 - self.progress.percentage) * rate) as u64;
            self.progress.estimated_remaining_seconds = Some(remaining);
        } else {
            self.progress.estimated_remaining_seconds = None;
        }
        self.progress.updated_at = Utc::now();
    }

    /// Record a failure reason
    pub fn record_error(&mut self, error: String) {
        self.error = Some(error);
    }

    /// Check if the search has reached a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
