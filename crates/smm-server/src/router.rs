//! Axum router construction.
//!
//! Read routes run behind [`viewer_middleware`], write routes behind
//! [`auth_middleware`]; both groups are nested under `/api`.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::auth::{auth_middleware, viewer_middleware};
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the full application router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_routes = Router::new()
        .route("/courses", get(routes::courses::list_courses))
        .route("/courses/{id}", get(routes::courses::get_course))
        .route(
            "/courses/{id}/download",
            get(routes::download::download_course),
        )
        .route(
            "/courses/{id}/thumbnail/{kind}",
            get(routes::download::get_thumbnail),
        )
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            viewer_middleware,
        ));

    let protected_routes = Router::new()
        .route("/courses", post(routes::courses::upload_courses))
        .route(
            "/courses/reupload",
            post(routes::courses::reupload_course),
        )
        .route(
            "/courses/thumbnail/{kind}",
            post(routes::courses::upload_thumbnail),
        )
        .route(
            "/courses/{id}",
            post(routes::courses::update_course).delete(routes::courses::delete_course),
        )
        .route("/courses/{id}/star", post(routes::courses::star_course))
        .route_layer(middleware::from_fn_with_state(ctx.clone(), auth_middleware));

    let api = public_routes
        .merge(protected_routes)
        .route("/events", get(routes::events::events_handler))
        .layer(DefaultBodyLimit::max(ctx.config.server.max_body_bytes));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
