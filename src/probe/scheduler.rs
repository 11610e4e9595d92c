use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The ambient work-scheduling capability the latency probe measures.
///
/// Injected rather than hard-wired so the probe can run against the
/// production pool in the binary and against deterministic fakes in
/// tests.
pub trait TaskScheduler: Send + Sync {
    fn submit(&self, task: Task);
}

// ─── WorkerPool ──────────────────────────────────────────────────

/// Fixed-size worker pool: one shared FIFO queue, workers parked on a
/// condvar. Dropping the pool drains the queue and joins every worker.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    available: Condvar,
    shutdown: AtomicBool,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let workers = (0..threads)
            .map(|i| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("opspulse-worker-{i}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("spawn worker thread")
            })
            .collect();

        Self { shared, workers }
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }
}

impl TaskScheduler for WorkerPool {
    fn submit(&self, task: Task) {
        self.shared.queue.lock().push_back(task);
        self.shared.available.notify_one();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };
        task();
    }
}
