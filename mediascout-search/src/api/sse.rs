//! Server-Sent Events (SSE) for search progress streaming

use crate::AppState;
use axum::{
    extract::{Query, State},
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct EventStreamQuery {
    /// Restrict the stream to one search's events
    pub search_id: Option<Uuid>,
}

/// GET /searches/events - SSE event stream for search progress
///
/// Streams events:
/// - SearchSubmitted
/// - SearchProgress (during pipeline progression)
/// - SearchCompleted
/// - SearchFailed
/// - SearchCancelled
pub async fn event_stream(
    State(state): State<AppState>,
    Query(query): Query<EventStreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(filter = ?query.search_id, "New SSE client connected to search events");

    // Subscribe to event broadcast
    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        info!("SSE: Search event stream started");

        loop {
            tokio::select! {
                // Heartbeat every 15 seconds
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                // Broadcast events
                Ok(event) = rx.recv() => {
                    if let Some(wanted) = query.search_id {
                        if event.search_id() != wanted {
                            continue;
                        }
                    }

                    let event_type = event.event_type().to_string();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            debug!("SSE: Broadcasting event: {}", event_type);
                            yield Ok(Event::default()
                                .event(event_type)
                                .data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
