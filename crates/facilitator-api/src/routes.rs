//! Router assembly: mounts resolve/mirror/push under the versioned base path
//! and health probes alongside them, with request-id middleware and tracing
//! wrapping the whole surface.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{self, AppState};
use crate::health::{self, HealthChecker};
use crate::request_id::request_id_middleware;

/// Builds the full router for one mounted base, e.g. `/api/facilitator/v1`.
/// Any request outside this prefix falls through to axum's own 404, which
/// the caller should pair with [`handlers::not_found_fallback`] as the
/// top-level `Router::fallback` so the body still carries the uniform
/// problem envelope.
pub fn router(base: &str, state: AppState, health_checker: Arc<HealthChecker>) -> Router {
    let base = base.trim_end_matches('/');

    let mirror_routes = Router::new()
        .route("/resolve", get(handlers::resolve_by_query))
        .route("/resolve/:slug/:version", get(handlers::resolve_by_path))
        .route("/mirror", get(handlers::get_mirror))
        .route("/mirror/load", post(handlers::push_mirror))
        .with_state(state);

    let health_routes = Router::new()
        .route("/health/live", get(health::liveness_handler))
        .route("/health/ready", get(health::readiness_handler))
        .route("/health/startup", get(health::startup_handler))
        .with_state(health_checker);

    Router::new()
        .nest(base, mirror_routes.merge(health_routes))
        .fallback(handlers::not_found_fallback)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}
