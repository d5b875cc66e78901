//! smm-ingest: course ingestion and delivery.
//!
//! [`Ingestor`] turns uploads into stored courses and applies edits;
//! [`delivery::Responder`] serves stored courses in the requested
//! representation. Both run their codec and database work on the blocking
//! pool so they can be called straight from request handlers.

pub mod cleanup;
pub mod delivery;
pub mod events;
pub mod ingest;
pub mod range;

pub use cleanup::DeferredCleanup;
pub use delivery::{Delivery, DeliveryBody, Representation, Responder};
pub use events::{CourseEvent, CourseEventBus, CourseEvents};
pub use ingest::{CourseSummary, CourseUpdate, IngestConfig, Ingestor};

use smm_core::{Error, Result};

/// Run synchronous codec/database work on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))?
}
