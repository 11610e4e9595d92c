use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use serde::Serialize;

use super::non_finite_as_null;

// ─── Public types ────────────────────────────────────────────────

/// Lock-free interval counter for one named operation.
///
/// Producer threads call `stop`/`record` on every tracked operation
/// (atomic adds only, never a lock). A periodic reader calls
/// `snapshot()` to pull the deltas accumulated since its previous pull,
/// converted to per-second rates.
pub struct IntervalCounter {
    name: String,

    /// Hot accumulators, padded away from the snapshot bookkeeping so
    /// writer cores never share a cache line with the reader.
    hot: CachePadded<Hot>,

    /// Cold shadow state; touched only by `snapshot()`.
    cold: Mutex<Shadow>,
}

/// Timestamp handed out by `start()` and consumed by `stop()`.
#[derive(Debug, Clone, Copy)]
pub struct StartToken {
    started: Instant,
}

/// One interval snapshot: deltas since the previous `snapshot()` call
/// plus cumulative totals since construction.
///
/// `ops_per_sec`, `bytes_per_sec` and `avg_service_time_ms` are not
/// guaranteed finite: a pull over a (near-)zero wall-clock interval
/// divides by (near-)zero, and an interval with zero operations makes
/// the average 0/0. Both serialize as JSON null.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    #[serde(serialize_with = "non_finite_as_null")]
    pub interval_ms: f64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub ops_per_sec: f64,
    pub total_ops: u64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub bytes_per_sec: f64,
    pub total_bytes: u64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub avg_service_time_ms: f64,
}

// ─── Internal state ──────────────────────────────────────────────

struct Hot {
    ops: AtomicU64,
    service_time_ns: AtomicU64,
    bytes: AtomicU64,
    dirty: AtomicBool,
}

struct Shadow {
    last_ops: u64,
    last_service_time_ns: u64,
    last_bytes: u64,
    last_taken: Instant,
}

// ─── IntervalCounter impl ────────────────────────────────────────

impl IntervalCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hot: CachePadded::new(Hot {
                ops: AtomicU64::new(0),
                service_time_ns: AtomicU64::new(0),
                bytes: AtomicU64::new(0),
                dirty: AtomicBool::new(false),
            }),
            cold: Mutex::new(Shadow {
                last_ops: 0,
                last_service_time_ns: 0,
                last_bytes: 0,
                last_taken: Instant::now(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Captures a monotonic timestamp for a later `stop()`.
    #[inline]
    pub fn start(&self) -> StartToken {
        StartToken {
            started: Instant::now(),
        }
    }

    /// Records one operation whose service time is the token's age.
    #[inline]
    pub fn stop(&self, token: StartToken) {
        self.record(1, token.started.elapsed(), 0);
    }

    /// Like `stop`, additionally crediting `bytes` to the counter.
    #[inline]
    pub fn stop_with_bytes(&self, token: StartToken, bytes: u64) {
        self.record(1, token.started.elapsed(), bytes);
    }

    /// Records `units` operations taking `service_time` in total,
    /// moving `bytes` bytes. Safe from any number of threads; never
    /// blocks and never takes a lock.
    #[inline]
    pub fn record(&self, units: u64, service_time: Duration, bytes: u64) {
        self.hot.ops.fetch_add(units, Ordering::Relaxed);
        self.hot
            .service_time_ns
            .fetch_add(service_time.as_nanos() as u64, Ordering::Relaxed);
        if bytes > 0 {
            self.hot.bytes.fetch_add(bytes, Ordering::Relaxed);
        }
        self.hot.dirty.store(true, Ordering::Release);
    }

    /// True when at least one record landed since the last `snapshot()`.
    pub fn is_dirty(&self) -> bool {
        self.hot.dirty.load(Ordering::Acquire)
    }

    /// Pulls the interval since the previous snapshot and advances the
    /// shadow state. Each concurrent reader would see an independent
    /// delta stream; the intended use is one periodic reader.
    pub fn snapshot(&self) -> Stats {
        let mut shadow = self.cold.lock();

        let ops = self.hot.ops.load(Ordering::Relaxed);
        let service_time_ns = self.hot.service_time_ns.load(Ordering::Relaxed);
        let bytes = self.hot.bytes.load(Ordering::Relaxed);
        self.hot.dirty.store(false, Ordering::Release);

        let now = Instant::now();
        let elapsed = now - shadow.last_taken;
        let elapsed_secs = elapsed.as_secs_f64();

        let delta_ops = ops - shadow.last_ops;
        let delta_ns = service_time_ns - shadow.last_service_time_ns;
        let delta_bytes = bytes - shadow.last_bytes;

        shadow.last_ops = ops;
        shadow.last_service_time_ns = service_time_ns;
        shadow.last_bytes = bytes;
        shadow.last_taken = now;

        Stats {
            interval_ms: elapsed_secs * 1_000.0,
            ops_per_sec: delta_ops as f64 / elapsed_secs,
            total_ops: ops,
            bytes_per_sec: delta_bytes as f64 / elapsed_secs,
            total_bytes: bytes,
            // 0/0 when the interval saw no operations
            avg_service_time_ms: delta_ns as f64 / delta_ops as f64 / 1_000_000.0,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_round_trips_explicit_fields() {
        let stats = Stats {
            interval_ms: -1.5,
            ops_per_sec: 0.0,
            total_ops: u64::MAX,
            bytes_per_sec: f64::MAX,
            total_bytes: 0,
            avg_service_time_ms: 42.25,
        };
        assert_eq!(stats.interval_ms, -1.5);
        assert_eq!(stats.ops_per_sec, 0.0);
        assert_eq!(stats.total_ops, u64::MAX);
        assert_eq!(stats.bytes_per_sec, f64::MAX);
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.avg_service_time_ms, 42.25);
    }

    #[test]
    fn record_accumulates_totals() {
        let counter = IntervalCounter::new("test");
        counter.record(3, Duration::from_millis(30), 128);
        counter.record(2, Duration::from_millis(20), 64);

        let stats = counter.snapshot();
        assert_eq!(stats.total_ops, 5);
        assert_eq!(stats.total_bytes, 192);
        // 50 ms over 5 ops
        assert!((stats.avg_service_time_ms - 10.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_resets_the_interval_but_not_the_totals() {
        let counter = IntervalCounter::new("test");
        counter.record(7, Duration::from_millis(7), 0);
        let first = counter.snapshot();
        assert_eq!(first.total_ops, 7);

        counter.record(5, Duration::from_millis(5), 0);
        let second = counter.snapshot();
        assert_eq!(second.total_ops, 12);
        // interval delta is exactly the 5 units recorded in between
        assert!((second.avg_service_time_ms - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_interval_average_is_not_finite() {
        let counter = IntervalCounter::new("test");
        counter.snapshot();
        let stats = counter.snapshot();
        assert_eq!(stats.total_ops, 0);
        assert!(stats.avg_service_time_ms.is_nan());
    }

    #[test]
    fn dirty_is_set_by_writes_and_cleared_by_snapshot() {
        let counter = IntervalCounter::new("test");
        assert!(!counter.is_dirty());

        let token = counter.start();
        counter.stop(token);
        assert!(counter.is_dirty());

        counter.snapshot();
        assert!(!counter.is_dirty());
    }

    #[test]
    fn stop_with_bytes_credits_the_byte_accumulator() {
        let counter = IntervalCounter::new("test");
        let token = counter.start();
        counter.stop_with_bytes(token, 4096);

        let stats = counter.snapshot();
        assert_eq!(stats.total_ops, 1);
        assert_eq!(stats.total_bytes, 4096);
    }

    #[test]
    fn non_finite_floats_serialize_as_null() {
        let stats = Stats {
            interval_ms: 1.0,
            ops_per_sec: f64::INFINITY,
            total_ops: 0,
            bytes_per_sec: 0.0,
            total_bytes: 0,
            avg_service_time_ms: f64::NAN,
        };
        let json: serde_json::Value = serde_json::to_value(stats).unwrap();
        assert!(json["ops_per_sec"].is_null());
        assert!(json["avg_service_time_ms"].is_null());
        assert_eq!(json["bytes_per_sec"], 0.0);
    }
}
