//! Server-Sent Events stream of course lifecycle events.
//!
//! Replays recent events for late joiners, then forwards live ones from the
//! [`smm_ingest::CourseEventBus`], with periodic heartbeats.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use smm_ingest::events::CourseEventKind;
use smm_ingest::CourseEvent;
use tokio::sync::broadcast::error::RecvError;

use crate::context::AppContext;

const REPLAY: usize = 50;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only forward one kind: `uploaded`, `updated` or `deleted`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// GET /api/events -- SSE stream of course events.
pub async fn events_handler(
    State(ctx): State<AppContext>,
    Query(params): Query<EventsQuery>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let filter = params.kind;
    let recent = ctx.events.recent_events(REPLAY);
    let mut rx = ctx.events.subscribe();
    let shutdown = ctx.shutdown.clone();

    let stream = async_stream::stream! {
        for event in recent.into_iter().rev() {
            if let Some(sse) = to_sse(&event, filter.as_deref()) {
                yield Ok(sse);
            }
        }

        let mut heartbeat = tokio::time::interval(Duration::from_secs(15));

        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            if let Some(sse) = to_sse(&event, filter.as_deref()) {
                                yield Ok(sse);
                            }
                        }
                        Err(RecvError::Lagged(n)) => {
                            tracing::debug!("SSE client lagged by {n} events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default()
                        .event("heartbeat")
                        .data(r#"{"type":"heartbeat"}"#));
                }
                _ = shutdown.cancelled() => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

fn to_sse(event: &CourseEvent, filter: Option<&str>) -> Option<Event> {
    if !matches_kind(&event.kind, filter) {
        return None;
    }
    let data = serde_json::to_string(event).ok()?;
    Some(Event::default().id(event.id.to_string()).data(data))
}

fn matches_kind(kind: &CourseEventKind, filter: Option<&str>) -> bool {
    match filter {
        None => true,
        Some("uploaded") => matches!(kind, CourseEventKind::Uploaded { .. }),
        Some("updated") => matches!(kind, CourseEventKind::Updated),
        Some("deleted") => matches!(kind, CourseEventKind::Deleted),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_by_kind() {
        assert!(matches_kind(&CourseEventKind::Updated, None));
        assert!(matches_kind(&CourseEventKind::Deleted, Some("deleted")));
        assert!(!matches_kind(&CourseEventKind::Deleted, Some("updated")));
        assert!(matches_kind(&CourseEventKind::Updated, Some("bogus")));
    }
}
