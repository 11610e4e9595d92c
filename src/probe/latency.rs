use std::cell::Cell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::MetricsError;
use crate::metrics::non_finite_as_null;

use super::scheduler::TaskScheduler;

// ─── Public types ────────────────────────────────────────────────

/// Percentiles of worker-pool revisit latency, in milliseconds.
///
/// "Revisit latency" is the gap between two consecutive probe tasks
/// landing on the same worker thread within one measurement run — a
/// proxy for how backed up the pool is. `samples` is the number of
/// valid gaps the run produced; an all-zero value with `samples == 0`
/// means no thread was revisited (e.g. a cold pool).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SchedulerLatency {
    #[serde(serialize_with = "non_finite_as_null")]
    pub median_ms: f64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub p90_ms: f64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub p99_ms: f64,
    #[serde(serialize_with = "non_finite_as_null")]
    pub p9999_ms: f64,
    pub samples: u64,
}

/// Self-calibrating probe for worker-pool scheduling latency.
///
/// A measurement schedules `measurements` tiny tasks on the pool in one
/// burst and reduces the observed revisit gaps to percentiles. That is
/// deliberately pool-saturating, so one mutex makes the whole operation
/// single-flight: concurrent callers block until the in-flight run
/// finishes and then share its cached result. Results stay cached for
/// `cache_ttl`; a zero TTL disables caching entirely.
pub struct SchedulerLatencyProbe {
    scheduler: Arc<dyn TaskScheduler>,
    measurements: usize,
    cache_ttl: Duration,
    cache: Mutex<Option<CachedRun>>,
}

struct CachedRun {
    result: SchedulerLatency,
    taken: Instant,
}

impl std::fmt::Debug for SchedulerLatencyProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerLatencyProbe")
            .field("measurements", &self.measurements)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

thread_local! {
    /// When this worker thread last executed a probe task. Persists
    /// across runs on purpose; the epoch check below decides whether a
    /// previous visit belongs to the current run.
    static LAST_VISIT: Cell<Option<Instant>> = const { Cell::new(None) };
}

// ─── SchedulerLatencyProbe impl ──────────────────────────────────

impl SchedulerLatencyProbe {
    pub fn new(
        scheduler: Arc<dyn TaskScheduler>,
        measurements: usize,
        cache_ttl: Duration,
    ) -> Result<Self, MetricsError> {
        if measurements == 0 {
            return Err(MetricsError::InvalidArgument(
                "probe batch size must be positive".into(),
            ));
        }
        Ok(Self {
            scheduler,
            measurements,
            cache_ttl,
            cache: Mutex::new(None),
        })
    }

    /// Returns the cached result when it is younger than the TTL,
    /// otherwise performs one measurement run. At most one run is in
    /// flight at any time; callers arriving during a run wait for it
    /// and receive its result instead of starting their own.
    pub fn measure(&self) -> SchedulerLatency {
        let mut cache = self.cache.lock();
        if let Some(run) = cache.as_ref() {
            if run.taken.elapsed() < self.cache_ttl {
                return run.result;
            }
        }

        let result = self.run();
        *cache = Some(CachedRun {
            result,
            taken: Instant::now(),
        });
        result
    }

    /// One full measurement: schedule the burst, spin until every task
    /// completed, reduce the valid gaps to percentiles.
    fn run(&self) -> SchedulerLatency {
        let n = self.measurements;
        let epoch = Instant::now();
        let slots: Arc<Vec<AtomicU64>> = Arc::new((0..n).map(|_| AtomicU64::new(0)).collect());
        let valid = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        for _ in 0..n {
            let slots = Arc::clone(&slots);
            let valid = Arc::clone(&valid);
            let completed = Arc::clone(&completed);
            self.scheduler.submit(Box::new(move || {
                visit(epoch, &slots, &valid);
                completed.fetch_add(1, Ordering::Release);
            }));
        }

        // Busy-spin rather than park: a blocked waiter thread would
        // itself perturb the scheduling being measured.
        while completed.load(Ordering::Acquire) < n {
            std::hint::spin_loop();
        }

        let claimed = valid.load(Ordering::Acquire).min(n);
        let mut gaps_ns: Vec<u64> = slots[..claimed]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect();
        gaps_ns.sort_unstable();

        if gaps_ns.is_empty() {
            return SchedulerLatency::default();
        }

        SchedulerLatency {
            median_ms: nearest_rank_ms(&gaps_ns, 50.0),
            p90_ms: nearest_rank_ms(&gaps_ns, 90.0),
            p99_ms: nearest_rank_ms(&gaps_ns, 99.0),
            p9999_ms: nearest_rank_ms(&gaps_ns, 99.99),
            samples: gaps_ns.len() as u64,
        }
    }
}

/// One probe task. A thread visited earlier in this same run (its
/// last-visit stamp is at or after the epoch) contributes the gap since
/// that visit; a first visit contributes nothing. Either way the stamp
/// advances to now.
fn visit(epoch: Instant, slots: &[AtomicU64], valid: &AtomicUsize) {
    LAST_VISIT.with(|last| {
        let now = Instant::now();
        if let Some(prev) = last.get() {
            if prev >= epoch {
                let gap = now.duration_since(prev);
                let index = valid.fetch_add(1, Ordering::AcqRel);
                // claims beyond the buffer are silently dropped
                if index < slots.len() {
                    slots[index].store(gap.as_nanos() as u64, Ordering::Relaxed);
                }
            }
        }
        last.set(Some(now));
    });
}

/// Nearest-rank percentile over a sorted slice, `ceil(p/100 * n) - 1`
/// clamped into range, converted from nanoseconds to milliseconds.
fn nearest_rank_ms(sorted_ns: &[u64], percentile: f64) -> f64 {
    let rank = (percentile / 100.0 * sorted_ns.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted_ns.len() - 1);
    sorted_ns[index] as f64 / 1_000_000.0
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::scheduler::Task;

    /// Runs every task synchronously on the submitting thread, which
    /// makes run outcomes deterministic: each task after the first sees
    /// the previous one's visit stamp.
    struct InlineScheduler;

    impl TaskScheduler for InlineScheduler {
        fn submit(&self, task: Task) {
            task();
        }
    }

    /// Inline execution plus a count of how many tasks were submitted,
    /// to observe whether a measurement actually ran.
    #[derive(Default)]
    struct CountingScheduler {
        submitted: AtomicUsize,
    }

    impl TaskScheduler for CountingScheduler {
        fn submit(&self, task: Task) {
            self.submitted.fetch_add(1, Ordering::SeqCst);
            task();
        }
    }

    #[test]
    fn zero_batch_size_fails_construction() {
        let err =
            SchedulerLatencyProbe::new(Arc::new(InlineScheduler), 0, Duration::ZERO).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidArgument(_)));
    }

    #[test]
    fn percentiles_are_ordered() {
        let probe =
            SchedulerLatencyProbe::new(Arc::new(InlineScheduler), 64, Duration::ZERO).unwrap();
        let result = probe.measure();
        // inline execution: every task after the first yields a gap
        assert_eq!(result.samples, 63);
        assert!(result.median_ms <= result.p90_ms);
        assert!(result.p90_ms <= result.p99_ms);
        assert!(result.p99_ms <= result.p9999_ms);
    }

    #[test]
    fn run_with_no_revisits_returns_all_zero() {
        // a single task can never observe a same-run revisit; use a
        // fresh thread so earlier tests' visit stamps cannot leak in
        std::thread::spawn(|| {
            let probe =
                SchedulerLatencyProbe::new(Arc::new(InlineScheduler), 1, Duration::ZERO).unwrap();
            assert_eq!(probe.measure(), SchedulerLatency::default());
        })
        .join()
        .unwrap();
    }

    #[test]
    fn concurrent_callers_share_one_measurement() {
        let scheduler = Arc::new(CountingScheduler::default());
        let probe = Arc::new(
            SchedulerLatencyProbe::new(scheduler.clone(), 32, Duration::from_secs(60)).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let probe = Arc::clone(&probe);
                std::thread::spawn(move || probe.measure())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // exactly one run's worth of tasks, no matter how many callers
        assert_eq!(scheduler.submitted.load(Ordering::SeqCst), 32);
        for result in &results {
            assert_eq!(*result, results[0]);
        }
    }

    #[test]
    fn zero_ttl_disables_the_cache() {
        let scheduler = Arc::new(CountingScheduler::default());
        let probe =
            SchedulerLatencyProbe::new(scheduler.clone(), 16, Duration::ZERO).unwrap();
        probe.measure();
        probe.measure();
        assert_eq!(scheduler.submitted.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn nearest_rank_picks_documented_indices() {
        let sorted = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
        assert_eq!(nearest_rank_ms(&sorted, 50.0), 50.0 / 1e6);
        assert_eq!(nearest_rank_ms(&sorted, 90.0), 90.0 / 1e6);
        assert_eq!(nearest_rank_ms(&sorted, 99.0), 100.0 / 1e6);
        assert_eq!(nearest_rank_ms(&sorted, 99.99), 100.0 / 1e6);
        // single element: every percentile is that element
        assert_eq!(nearest_rank_ms(&[7], 50.0), 7.0 / 1e6);
    }
}
