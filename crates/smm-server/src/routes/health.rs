//! Liveness check.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::context::AppContext;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
}

/// GET /health -- always 200; `database` reports whether a pooled
/// connection could be checked out.
pub async fn health_check(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    let database = smm_db::get_conn(&ctx.db).is_ok();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
