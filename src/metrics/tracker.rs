use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::MetricsError;

use super::ewma::MovingAverage;
use super::non_finite_as_null;
use super::percentile::MovingPercentile;

// ─── Configuration ───────────────────────────────────────────────

/// Configuration for one percentile estimator on a tracker.
#[derive(Debug, Clone, Copy)]
pub struct PercentileSpec {
    /// Target percentile, exclusive (0,1).
    pub percentile: f64,
    /// Step-adaptation constant.
    pub sensitivity: f64,
    /// Step size used before the first adaptation.
    pub initial_step: f64,
}

impl PercentileSpec {
    fn validate(&self) -> Result<(), MetricsError> {
        if !(self.percentile > 0.0 && self.percentile < 1.0) {
            return Err(MetricsError::InvalidArgument(format!(
                "percentile must be in (0,1), got {}",
                self.percentile
            )));
        }
        if self.sensitivity <= 0.0 {
            return Err(MetricsError::InvalidArgument(format!(
                "sensitivity must be positive, got {}",
                self.sensitivity
            )));
        }
        if self.initial_step <= 0.0 {
            return Err(MetricsError::InvalidArgument(format!(
                "initial step must be positive, got {}",
                self.initial_step
            )));
        }
        Ok(())
    }
}

// ─── Public types ────────────────────────────────────────────────

/// Per-operation service-time statistics: one EWMA plus any number of
/// moving-percentile estimators, richer than the plain interval
/// counter.
///
/// The estimators are not thread-safe on their own, so every estimator
/// update and every stats read goes through one mutex. The cumulative
/// message counter lives outside it and is advanced atomically.
#[derive(Debug)]
pub struct ServiceTimeTracker {
    total_messages: AtomicU64,
    inner: Mutex<Inner>,
}

/// One `(percentile, value)` output pair.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PercentileValue {
    pub percentile: f64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub value_ms: f64,
}

/// Result of one `get_stats` pull. Times are milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStats {
    #[serde(serialize_with = "non_finite_as_null")]
    pub interval_ms: f64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub messages_per_sec: f64,
    pub interval_messages: u64,
    pub total_messages: u64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub avg_ms: f64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub min_ms: f64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub max_ms: f64,
    pub percentiles: Vec<PercentileValue>,
}

// ─── Internal state ──────────────────────────────────────────────

#[derive(Debug)]
struct Inner {
    average: MovingAverage,
    percentiles: Vec<MovingPercentile>,
    interval_messages: u64,
    interval_start: Instant,
}

const NANOS_PER_MILLI: f64 = 1_000_000.0;

// ─── ServiceTimeTracker impl ─────────────────────────────────────

impl ServiceTimeTracker {
    /// `window` is the EWMA window (zero coerces to the default).
    /// Every percentile spec is validated up front; a bad spec fails
    /// construction with `InvalidArgument` and no tracker is returned.
    pub fn new(window: u32, specs: &[PercentileSpec]) -> Result<Self, MetricsError> {
        for spec in specs {
            spec.validate()?;
        }
        Ok(Self {
            total_messages: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                average: MovingAverage::new(window),
                percentiles: specs
                    .iter()
                    .map(|s| MovingPercentile::new(s.percentile, s.sensitivity, s.initial_step))
                    .collect(),
                interval_messages: 0,
                interval_start: Instant::now(),
            }),
        })
    }

    /// Monotonic timestamp for a later `record_service_time`.
    #[inline]
    pub fn get_ticks() -> Instant {
        Instant::now()
    }

    /// Records one message whose service time started at `start` and
    /// ends now.
    pub fn record_service_time(&self, start: Instant) {
        self.record_service_time_between(start, Instant::now());
    }

    /// Records one message with an explicit end timestamp. The elapsed
    /// value feeds the average first, then each percentile estimator
    /// with the freshly updated average as its step reference.
    pub fn record_service_time_between(&self, start: Instant, end: Instant) {
        let elapsed_ns = end.saturating_duration_since(start).as_nanos() as f64;
        self.total_messages.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock();
        inner.interval_messages += 1;
        inner.average.new_sample(elapsed_ns);
        let reference = inner.average.average();
        for estimator in &mut inner.percentiles {
            estimator.new_sample_with_reference(elapsed_ns, reference);
        }
    }

    /// Builds a stats value for the current interval. With
    /// `reset = true` the interval counters and both estimator
    /// families are cleared atomically with the read, so the next
    /// interval starts clean; with `reset = false` figures accumulate
    /// since construction (or since the last reset).
    pub fn get_stats(&self, reset: bool) -> TrackerStats {
        let mut inner = self.inner.lock();

        let elapsed_secs = inner.interval_start.elapsed().as_secs_f64();
        let stats = TrackerStats {
            interval_ms: elapsed_secs * 1_000.0,
            messages_per_sec: inner.interval_messages as f64 / elapsed_secs,
            interval_messages: inner.interval_messages,
            total_messages: self.total_messages.load(Ordering::Relaxed),
            avg_ms: inner.average.average() / NANOS_PER_MILLI,
            min_ms: inner.average.min() / NANOS_PER_MILLI,
            max_ms: inner.average.max() / NANOS_PER_MILLI,
            percentiles: inner
                .percentiles
                .iter()
                .map(|p| PercentileValue {
                    percentile: p.percentile(),
                    value_ms: p.estimate() / NANOS_PER_MILLI,
                })
                .collect(),
        };

        if reset {
            inner.interval_messages = 0;
            inner.interval_start = Instant::now();
            inner.average.reset();
            for estimator in &mut inner.percentiles {
                estimator.reset();
            }
        }

        stats
    }
}

// ─── Tests ───────────────────────────────────────────────────────
