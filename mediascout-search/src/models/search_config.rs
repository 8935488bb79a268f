//! Search configuration submitted by callers
//!
//! A configuration is immutable once submitted. Validation happens at the
//! submission boundary so malformed requests are rejected with a 400 rather
//! than surfacing as late-stage pipeline failures.

use mediascout_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Priority tier for admission scheduling
///
/// Higher tiers are admitted to processing first. Within a tier, searches
/// are admitted in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
        }
    }
}

/// Tunable options for a single search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum contacts to return
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Enable AI query expansion before web search
    #[serde(default = "default_true")]
    pub ai_enhanced: bool,

    /// Allow provider-side response caching
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Admission priority tier
    #[serde(default)]
    pub priority: Priority,

    /// Per-stage timeout override in seconds
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,

    /// Minimum confidence for extracted contacts (0.0 - 1.0)
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_max_results() -> u32 {
    50
}
fn default_true() -> bool {
    true
}
fn default_confidence_threshold() -> f64 {
    0.5
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            ai_enhanced: true,
            use_cache: true,
            priority: Priority::default(),
            stage_timeout_secs: None,
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// Caller-supplied search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfiguration {
    /// Free-text seed query
    pub query: String,

    /// Country filter (empty = no filter)
    #[serde(default)]
    pub countries: Vec<String>,

    /// Outlet category filter
    #[serde(default)]
    pub categories: Vec<String>,

    /// Journalistic beat filter
    #[serde(default)]
    pub beats: Vec<String>,

    /// Language filter
    #[serde(default)]
    pub languages: Vec<String>,

    /// Topic filter
    #[serde(default)]
    pub topics: Vec<String>,

    /// Execution options
    #[serde(default)]
    pub options: SearchOptions,
}

impl SearchConfiguration {
    /// Validate the configuration at the submission boundary.
    ///
    /// Rejects empty queries, zero or oversized result limits, confidence
    /// thresholds outside [0, 1], and zero-second timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }
        if self.query.len() > 1000 {
            return Err(Error::InvalidInput(
                "query exceeds 1000 characters".to_string(),
            ));
        }
        if self.options.max_results == 0 {
            return Err(Error::InvalidInput("max_results must be >= 1".to_string()));
        }
        if self.options.max_results > 500 {
            return Err(Error::InvalidInput(
                "max_results must be <= 500".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.options.confidence_threshold) {
            return Err(Error::InvalidInput(
                "confidence_threshold must be within [0.0, 1.0]".to_string(),
            ));
        }
        if let Some(0) = self.options.stage_timeout_secs {
            return Err(Error::InvalidInput(
                "stage_timeout_secs must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}
