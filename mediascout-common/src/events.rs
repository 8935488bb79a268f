//! Event types for the MediaScout event system
//!
//! Provides shared event definitions and the EventBus used to push search
//! lifecycle and progress updates from the orchestration pipeline to SSE
//! subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// MediaScout event types
///
/// Events are broadcast via [`EventBus`] and serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScoutEvent {
    /// A search was accepted and persisted
    SearchSubmitted {
        /// Search UUID
        search_id: Uuid,
        /// Owning user UUID
        user_id: Uuid,
        /// Seed query text
        query: String,
        /// When the search was submitted
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress update for an in-flight search
    ///
    /// Emitted on every stage transition and at sub-step checkpoints within
    /// long stages. For a given search, events arrive in stage order with a
    /// monotonically non-decreasing percentage.
    SearchProgress {
        /// Search UUID
        search_id: Uuid,
        /// Pipeline stage name (e.g. "WEB_SEARCH")
        stage: String,
        /// Percentage complete (0.0 - 100.0)
        percentage: f64,
        /// Human-readable progress message
        message: String,
        /// Steps completed within the current stage
        current_step: usize,
        /// Total steps within the current stage (0 when unknown)
        total_steps: usize,
        /// When the update was computed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Search finished successfully
    SearchCompleted {
        /// Search UUID
        search_id: Uuid,
        /// Number of contacts discovered
        contacts_found: usize,
        /// Wall-clock duration of the pipeline
        duration_seconds: u64,
        /// When the search completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Search failed at some stage
    SearchFailed {
        /// Search UUID
        search_id: Uuid,
        /// Stage that failed (e.g. "CONTACT_EXTRACTION")
        stage: String,
        /// Failure reason recorded on the search record
        error: String,
        /// When the failure was recorded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Search cancelled by its owner
    SearchCancelled {
        /// Search UUID
        search_id: Uuid,
        /// Optional caller-supplied reason
        reason: Option<String>,
        /// When the cancellation took effect
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl ScoutEvent {
    /// Event type name for SSE `event:` fields
    pub fn event_type(&self) -> &str {
        match self {
            ScoutEvent::SearchSubmitted { .. } => "SearchSubmitted",
            ScoutEvent::SearchProgress { .. } => "SearchProgress",
            ScoutEvent::SearchCompleted { .. } => "SearchCompleted",
            ScoutEvent::SearchFailed { .. } => "SearchFailed",
            ScoutEvent::SearchCancelled { .. } => "SearchCancelled",
        }
    }

    /// Search this event belongs to
    pub fn search_id(&self) -> Uuid {
        match self {
            ScoutEvent::SearchSubmitted { search_id, .. }
            | ScoutEvent::SearchProgress { search_id, .. }
            | ScoutEvent::SearchCompleted { search_id, .. }
            | ScoutEvent::SearchFailed { search_id, .. }
            | ScoutEvent::SearchCancelled { search_id, .. } => *search_id,
        }
    }
}

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers (drop-oldest semantics:
///   a lagging subscriber observes `RecvError::Lagged` and resumes from the
///   oldest retained event)
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScoutEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ScoutEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ScoutEvent,
    ) -> Result<usize, broadcast::error::SendError<ScoutEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress updates are non-critical; it is acceptable if no SSE client
    /// is currently connected.
    pub fn emit_lossy(&self, event: ScoutEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let search_id = Uuid::new_v4();
        bus.emit_lossy(ScoutEvent::SearchProgress {
            search_id,
            stage: "WEB_SEARCH".to_string(),
            percentage: 35.0,
            message: "Searching the web".to_string(),
            current_step: 3,
            total_steps: 10,
            timestamp: chrono::Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "SearchProgress");
        assert_eq!(event.search_id(), search_id);
    }

    #[test]
    fn emit_without_subscribers_is_lossy() {
        let bus = EventBus::new(4);
        // No subscribers: emit() errors, emit_lossy() does not panic.
        assert!(bus
            .emit(ScoutEvent::SearchCancelled {
                search_id: Uuid::new_v4(),
                reason: None,
                timestamp: chrono::Utc::now(),
            })
            .is_err());
        bus.emit_lossy(ScoutEvent::SearchCancelled {
            search_id: Uuid::new_v4(),
            reason: Some("user request".to_string()),
            timestamp: chrono::Utc::now(),
        });
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = ScoutEvent::SearchCompleted {
            search_id: Uuid::new_v4(),
            contacts_found: 12,
            duration_seconds: 48,
            timestamp: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"SearchCompleted\""));
        assert!(json.contains("\"contacts_found\":12"));

        let back: ScoutEvent = serde_json::from_str(&json).unwrap();
        match back {
            ScoutEvent::SearchCompleted { contacts_found, .. } => {
                assert_eq!(contacts_found, 12)
            }
            _ => panic!("Wrong event type deserialized"),
        }
    }
}
