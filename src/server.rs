use axum::{middleware as axum_mw, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::api;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full axum `Router`: the pull-based metrics API plus the
/// self-instrumentation middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // ── Counter registry ────────────────────────────────────
        .route("/api/counters", get(api::list_counters))
        .route(
            "/api/counters/:name",
            get(api::get_counter_stats).delete(api::delete_counter),
        )
        // ── Worker-pool latency probe ───────────────────────────
        .route("/api/scheduler/latency", get(api::scheduler_latency))
        // ── Live feed ───────────────────────────────────────────
        .route("/api/metrics/stream", get(api::metrics_stream))
        // ── Provide shared state to all routes above ────────────
        .with_state(state.clone())
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(state, timing::timing_middleware))
        .layer(CorsLayer::permissive())
}
