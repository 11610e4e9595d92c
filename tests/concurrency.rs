use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use opspulse::{
    CounterRegistry, IntervalCounter, SchedulerLatencyProbe, TaskScheduler, WorkerPool,
};

#[test]
fn counter_loses_no_updates_under_contention() {
    const THREADS: usize = 100;
    const RECORDS: u64 = 1_000;
    const BYTES: u64 = 10;

    let counter = Arc::new(IntervalCounter::new("contended"));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let counter = Arc::clone(&counter);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..RECORDS {
                    counter.record(1, Duration::from_nanos(100), BYTES);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stats = counter.snapshot();
    assert_eq!(stats.total_ops, THREADS as u64 * RECORDS);
    assert_eq!(stats.total_bytes, THREADS as u64 * RECORDS * BYTES);
}

#[test]
fn registry_creates_one_counter_per_name_under_races() {
    const THREADS: usize = 100;

    let registry = Arc::new(CounterRegistry::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get_or_create("x")
            })
        })
        .collect();
    let counters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for counter in &counters {
        assert!(Arc::ptr_eq(counter, &counters[0]));
    }
    assert_eq!(registry.names(), vec!["x"]);
}

#[test]
fn registry_keeps_distinct_names_distinct_under_races() {
    const THREADS: usize = 8;
    const NAMES_EACH: usize = 32;

    let registry = Arc::new(CounterRegistry::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for k in 0..NAMES_EACH {
                    registry.get_or_create(&format!("op-{t}-{k}"));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.names().len(), THREADS * NAMES_EACH);
}

#[test]
fn probe_percentiles_are_ordered_on_a_real_pool() {
    let pool: Arc<dyn TaskScheduler> = Arc::new(WorkerPool::new(4));
    let probe = SchedulerLatencyProbe::new(pool, 512, Duration::from_secs(60)).unwrap();

    let result = probe.measure();
    // 512 tasks over 4 workers: plenty of same-run revisits
    assert!(result.samples > 0);
    assert!(result.median_ms <= result.p90_ms);
    assert!(result.p90_ms <= result.p99_ms);
    assert!(result.p99_ms <= result.p9999_ms);

    // within the TTL a second call is a cache hit with the same value
    assert_eq!(probe.measure(), result);
}
