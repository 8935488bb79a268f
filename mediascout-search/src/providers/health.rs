//! Provider health tracking and aggregation
//!
//! Each adapter records the outcome and latency of its recent requests in a
//! sliding window; health level is derived from the window's error rate.
//! Overall service health is the worst individual level, never an average.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Window of recent outcomes considered for the error rate
const WINDOW_SIZE: usize = 50;

/// Error-rate thresholds for degraded / unhealthy
const DEGRADED_ERROR_RATE: f64 = 0.1;
const UNHEALTHY_ERROR_RATE: f64 = 0.5;

/// Health level of a single provider or the whole service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Degraded => "degraded",
            HealthLevel::Unhealthy => "unhealthy",
        }
    }
}

/// Point-in-time health report for one provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: HealthLevel,
    /// Mean latency over the window, milliseconds
    pub average_latency_ms: u64,
    /// Error rate over the window (0.0 - 1.0)
    pub error_rate: f64,
    /// Requests observed in the window
    pub sample_count: usize,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Outcome {
    success: bool,
    latency_ms: u64,
}

/// Sliding-window request outcome recorder
///
/// Interior mutability so adapters can record outcomes through a shared
/// reference. An empty window reports healthy.
pub struct HealthTracker {
    name: String,
    window: Mutex<VecDeque<Outcome>>,
}

impl HealthTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            window: Mutex::new(VecDeque::with_capacity(WINDOW_SIZE)),
        }
    }

    pub fn record_success(&self, latency_ms: u64) {
        self.record(Outcome {
            success: true,
            latency_ms,
        });
    }

    pub fn record_failure(&self, latency_ms: u64) {
        self.record(Outcome {
            success: false,
            latency_ms,
        });
    }

    fn record(&self, outcome: Outcome) {
        let mut window = match self.window.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };
        if window.len() == WINDOW_SIZE {
            window.pop_front();
        }
        window.push_back(outcome);
    }

    /// Current health snapshot
    pub fn snapshot(&self) -> ServiceHealth {
        let window = match self.window.lock() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        };

        let sample_count = window.len();
        let (error_rate, average_latency_ms) = if sample_count == 0 {
            (0.0, 0)
        } else {
            let failures = window.iter().filter(|o| !o.success).count();
            let total_latency: u64 = window.iter().map(|o| o.latency_ms).sum();
            (
                failures as f64 / sample_count as f64,
                total_latency / sample_count as u64,
            )
        };

        let status = if error_rate >= UNHEALTHY_ERROR_RATE {
            HealthLevel::Unhealthy
        } else if error_rate >= DEGRADED_ERROR_RATE {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };

        ServiceHealth {
            name: self.name.clone(),
            status,
            average_latency_ms,
            error_rate,
            sample_count,
            checked_at: Utc::now(),
        }
    }
}

/// Worst-case aggregation over individual provider reports
pub fn aggregate_health(services: &[ServiceHealth]) -> HealthLevel {
    services
        .iter()
        .map(|s| s.status)
        .max()
        .unwrap_or(HealthLevel::Healthy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tracker_is_healthy() {
        let tracker = HealthTracker::new("llm");
        let health = tracker.snapshot();
        assert_eq!(health.status, HealthLevel::Healthy);
        assert_eq!(health.sample_count, 0);
        assert_eq!(health.error_rate, 0.0);
    }

    #[test]
    fn error_rate_drives_status() {
        let tracker = HealthTracker::new("search");
        for _ in 0..8 {
            tracker.record_success(100);
        }
        tracker.record_failure(500);
        // 1/9 failures is above the degraded threshold
        assert_eq!(tracker.snapshot().status, HealthLevel::Degraded);

        for _ in 0..10 {
            tracker.record_failure(500);
        }
        assert_eq!(tracker.snapshot().status, HealthLevel::Unhealthy);
    }

    #[test]
    fn window_evicts_old_outcomes() {
        let tracker = HealthTracker::new("scraper");
        for _ in 0..WINDOW_SIZE {
            tracker.record_failure(100);
        }
        assert_eq!(tracker.snapshot().status, HealthLevel::Unhealthy);

        // A full window of successes pushes the failures out
        for _ in 0..WINDOW_SIZE {
            tracker.record_success(100);
        }
        assert_eq!(tracker.snapshot().status, HealthLevel::Healthy);
    }

    #[test]
    fn aggregation_takes_worst_case() {
        let mk = |status| ServiceHealth {
            name: "p".to_string(),
            status,
            average_latency_ms: 0,
            error_rate: 0.0,
            sample_count: 0,
            checked_at: Utc::now(),
        };

        assert_eq!(
            aggregate_health(&[mk(HealthLevel::Healthy), mk(HealthLevel::Degraded)]),
            HealthLevel::Degraded
        );
        assert_eq!(
            aggregate_health(&[
                mk(HealthLevel::Degraded),
                mk(HealthLevel::Unhealthy),
                mk(HealthLevel::Healthy)
            ]),
            HealthLevel::Unhealthy
        );
        assert_eq!(aggregate_health(&[]), HealthLevel::Healthy);
    }
}
