use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use opspulse::{AppState, CounterRegistry, SchedulerLatencyProbe, WorkerPool};

/// Probe batch size: paired timestamp captures per measurement run.
const PROBE_MEASUREMENTS: usize = 1_000;

/// How long one probe result stays valid before a caller triggers a
/// fresh (pool-saturating) run.
const PROBE_CACHE_TTL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // ── 1. Worker pool measured by the probe ────────────────────
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let pool = Arc::new(WorkerPool::new(threads));
    tracing::info!(threads, "worker pool started");

    // ── 2. Build shared state ───────────────────────────────────
    let probe = SchedulerLatencyProbe::new(pool, PROBE_MEASUREMENTS, PROBE_CACHE_TTL)
        .expect("probe batch size is positive");
    let state = Arc::new(AppState {
        registry: Arc::new(CounterRegistry::new()),
        probe: Arc::new(probe),
    });

    // ── 3. Bind & serve ─────────────────────────────────────────
    let app = opspulse::server::create_router(state);
    let addr = "0.0.0.0:3000";
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to port 3000 — is it already in use?");

    tracing::info!(%addr, "listening");
    tracing::info!("counters        → http://localhost:3000/api/counters");
    tracing::info!("probe           → http://localhost:3000/api/scheduler/latency");
    tracing::info!("live feed (SSE) → http://localhost:3000/api/metrics/stream");

    axum::serve(listener, app)
        .await
        .expect("Server exited with error");
}
