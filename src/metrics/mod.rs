pub mod counter;
pub mod ewma;
pub mod percentile;
pub mod registry;
pub mod tracker;

pub use counter::{IntervalCounter, StartToken, Stats};
pub use ewma::MovingAverage;
pub use percentile::MovingPercentile;
pub use registry::CounterRegistry;
pub use tracker::{PercentileSpec, PercentileValue, ServiceTimeTracker, TrackerStats};

use serde::Serializer;

/// Serializes a float as JSON `null` when it is NaN or infinite.
///
/// Rates and averages legitimately go non-finite on degenerate intervals
/// (zero elapsed wall time, zero operations). The wire contract is that
/// every float field a consumer sees is either a finite number or null,
/// so the rule lives on the stats types themselves.
pub(crate) fn non_finite_as_null<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}
