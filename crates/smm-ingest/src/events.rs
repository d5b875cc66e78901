//! Course lifecycle notifications.
//!
//! The [`Ingestor`](crate::Ingestor) reports every committed change through
//! [`CourseEvents`]. [`CourseEventBus`] is the stock implementation: it logs
//! each event, keeps a short history, and fans out over a
//! `tokio::sync::broadcast` channel.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use smm_core::{AccountId, CourseId};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Maximum number of events retained for [`CourseEventBus::recent_events`].
const MAX_RECENT_EVENTS: usize = 100;

/// Receiver of course lifecycle events. Implementations must not block.
pub trait CourseEvents: Send + Sync {
    fn uploaded(&self, course_id: CourseId, owner: AccountId, title: &str);
    fn updated(&self, course_id: CourseId);
    fn deleted(&self, course_id: CourseId);
}

/// What happened to a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CourseEventKind {
    Uploaded { owner: AccountId, title: String },
    Updated,
    Deleted,
}

/// A timestamped course event.
#[derive(Debug, Clone, Serialize)]
pub struct CourseEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub course_id: CourseId,
    #[serde(flatten)]
    pub kind: CourseEventKind,
}

impl CourseEvent {
    fn new(course_id: CourseId, kind: CourseEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            course_id,
            kind,
        }
    }
}

pub struct CourseEventBus {
    tx: broadcast::Sender<CourseEvent>,
    recent: RwLock<VecDeque<CourseEvent>>,
}

impl CourseEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CourseEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: CourseEvent) {
        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// The `n` most recent events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<CourseEvent> {
        self.recent.read().iter().take(n).cloned().collect()
    }
}

impl Default for CourseEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl CourseEvents for CourseEventBus {
    fn uploaded(&self, course_id: CourseId, owner: AccountId, title: &str) {
        tracing::info!(course_id = %course_id, owner = %owner, title, "Course uploaded");
        self.publish(CourseEvent::new(
            course_id,
            CourseEventKind::Uploaded {
                owner,
                title: title.to_string(),
            },
        ));
    }

    fn updated(&self, course_id: CourseId) {
        tracing::info!(course_id = %course_id, "Course updated");
        self.publish(CourseEvent::new(course_id, CourseEventKind::Updated));
    }

    fn deleted(&self, course_id: CourseId) {
        tracing::info!(course_id = %course_id, "Course deleted");
        self.publish(CourseEvent::new(course_id, CourseEventKind::Deleted));
    }
}
