//! Application context shared by every request handler.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smm_codec::{ThumbnailTranscoder, WebpTranscoder};
use smm_core::config::Config;
use smm_db::DbPool;
use smm_ingest::{CourseEventBus, DeferredCleanup, IngestConfig, Ingestor, Responder};
use tokio_util::sync::CancellationToken;

/// Application context shared by all request handlers (via Axum state).
///
/// This is cheaply cloneable because it only holds `Arc`s and handles.
#[derive(Clone)]
pub struct AppContext {
    /// Database connection pool.
    pub db: DbPool,
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    pub ingestor: Ingestor,
    pub responder: Responder,
    /// Course lifecycle events, also streamed over SSE.
    pub events: Arc<CourseEventBus>,
    /// Prometheus render handle; `None` if another recorder owns the process.
    pub metrics: Option<PrometheusHandle>,
    /// Cancelled when the server shuts down.
    pub shutdown: CancellationToken,
}

impl AppContext {
    /// Wire the ingestion and delivery services around `db`.
    pub fn new(db: DbPool, config: Config, shutdown: CancellationToken) -> Self {
        let events = Arc::new(CourseEventBus::default());
        let transcoder: Option<Arc<dyn ThumbnailTranscoder>> = if config.thumbnails.webp {
            Some(Arc::new(WebpTranscoder))
        } else {
            None
        };

        let ingestor = Ingestor::new(
            db.clone(),
            transcoder,
            events.clone(),
            IngestConfig::from_config(&config),
        );
        let cleanup = DeferredCleanup::new(
            Duration::from_secs(config.delivery.cleanup_delay_secs),
            shutdown.clone(),
        );
        let responder = Responder::new(db.clone(), cleanup);

        Self {
            db,
            config: Arc::new(config),
            ingestor,
            responder,
            events,
            metrics: prometheus_handle(),
            shutdown,
        }
    }
}

/// Install the process-wide Prometheus recorder on first use.
///
/// Several servers in one process (tests) share the same recorder.
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();
    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                crate::routes::metrics::describe_metrics();
                Some(handle)
            }
            Err(e) => {
                tracing::warn!("Prometheus recorder not installed: {e}");
                None
            }
        })
        .clone()
}
