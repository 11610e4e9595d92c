pub mod api;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod probe;
pub mod server;

use std::sync::Arc;

pub use error::MetricsError;
pub use metrics::{
    CounterRegistry, IntervalCounter, MovingAverage, MovingPercentile, PercentileSpec,
    PercentileValue, ServiceTimeTracker, Stats, TrackerStats,
};
pub use probe::{SchedulerLatency, SchedulerLatencyProbe, TaskScheduler, WorkerPool};

/// Shared application state available to every handler via
/// `State<Arc<AppState>>`.
pub struct AppState {
    /// Central counter registry — producers push records, the API
    /// pulls snapshots.
    pub registry: Arc<CounterRegistry>,

    /// Worker-pool latency probe, single-flight behind its own cache.
    pub probe: Arc<SchedulerLatencyProbe>,
}
