pub mod latency;
pub mod scheduler;

pub use latency::{SchedulerLatency, SchedulerLatencyProbe};
pub use scheduler::{TaskScheduler, WorkerPool};
