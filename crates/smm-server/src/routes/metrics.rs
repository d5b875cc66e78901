//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::context::AppContext;

const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Register descriptions for the upload and download counters.
pub fn describe_metrics() {
    metrics::describe_counter!("smmdb_uploads_total", "Courses stored from uploads");
    metrics::describe_counter!("smmdb_downloads_total", "Course downloads in any representation");
    metrics::describe_counter!("smmdb_downloads_proto_total", "Raw gzipped course downloads");
    metrics::describe_counter!("smmdb_downloads_wiiu_total", "Zipped Wii U save downloads");
    metrics::describe_counter!("smmdb_downloads_json_total", "JSON course downloads");
    metrics::describe_counter!("smmdb_downloads_3ds_total", "3DS binary downloads");
}

/// GET /metrics -- Prometheus-format metrics.
pub async fn metrics_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    let body = match ctx.metrics {
        Some(ref handle) => handle.render(),
        None => "# No metrics recorder installed\n".to_string(),
    };
    (StatusCode::OK, [("content-type", CONTENT_TYPE)], body)
}
