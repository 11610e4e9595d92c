use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use crate::error::MetricsError;
use crate::metrics::Stats;
use crate::probe::SchedulerLatency;
use crate::AppState;

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<MetricsError> for AppError {
    fn from(err: MetricsError) -> Self {
        match err {
            MetricsError::NotFound(_) => Self::NotFound(err.to_string()),
            MetricsError::InvalidArgument(_) => Self::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error":  message,
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

// ─── GET /api/counters ───────────────────────────────────────────

pub async fn list_counters(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let mut names = state.registry.names();
    names.sort();
    Json(names)
}

// ─── GET /api/counters/:name ─────────────────────────────────────
/// One interval pull. Each call advances the counter's shadow state,
/// so the reported rates cover the window since the previous pull.

pub async fn get_counter_stats(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Stats>, AppError> {
    let stats = state.registry.stats(&name)?;
    Ok(Json(stats))
}

// ─── DELETE /api/counters/:name ──────────────────────────────────
/// Disposal path: drops the counter from the registry. Idempotent —
/// deleting an unknown name still answers 204.

pub async fn delete_counter(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> StatusCode {
    state.registry.remove(&name);
    StatusCode::NO_CONTENT
}

// ─── GET /api/scheduler/latency ──────────────────────────────────
/// Pool revisit-latency percentiles. The probe busy-spins while its
/// burst completes, so it runs on the blocking pool rather than
/// stalling the async runtime.

pub async fn scheduler_latency(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SchedulerLatency>, AppError> {
    let probe = Arc::clone(&state.probe);
    let result = tokio::task::spawn_blocking(move || probe.measure())
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(result))
}

// ─── GET /api/metrics/stream ─────────────────────────────────────

/// One SSE tick: snapshots of every counter that saw traffic since its
/// previous pull. Idle counters are skipped to keep the feed small.
#[derive(Debug, Serialize)]
struct StreamPayload {
    taken_at: String,
    counters: BTreeMap<String, Stats>,
}

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let interval = tokio::time::interval(Duration::from_secs(1));

    let stream = IntervalStream::new(interval).map(move |_| {
        let counters = state
            .registry
            .names()
            .into_iter()
            .filter_map(|name| {
                let counter = state.registry.get(&name)?;
                counter.is_dirty().then(|| (name, counter.snapshot()))
            })
            .collect();

        let payload = StreamPayload {
            taken_at: chrono::Utc::now().to_rfc3339(),
            counters,
        };
        let json = serde_json::to_string(&payload).unwrap_or_default();
        Ok(Event::default().data(json))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
