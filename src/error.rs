use thiserror::Error;

/// Library-level error taxonomy.
///
/// Only construction-time invariant violations and failed lookups are
/// errors. Timing edge cases (zero-length intervals, runs with no
/// valid samples) are absorbed into the shape of the returned stats —
/// metrics collection must never destabilize the instrumented
/// application.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Required numeric configuration out of range; nothing was built.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Stats lookup named a counter that is not (or no longer)
    /// registered. Recoverable: create the counter or treat as
    /// "no data yet".
    #[error("counter '{0}' is not registered")]
    NotFound(String),
}
