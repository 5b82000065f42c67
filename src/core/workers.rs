//! Priority worker pool for frame preparation
//!
//! Late preparation directly causes visible playback stutter, so tasks are
//! dequeued strictly by priority rather than submission order: one injector
//! queue per level, polled High -> Medium -> Low. Within a level there is no
//! ordering promise.
//!
//! Submission never blocks the caller. Worker threads contain task panics,
//! and shutdown joins with a deadline so dropping the pool can never hang
//! the owner.

use crossbeam::deque::Injector;
use log::{error, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling class of one preparation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    /// Needed for the next draw (first-frame previews, current-frame work)
    High,
    /// Look-ahead for imminent frames
    Medium,
    /// Whole-animation preloads
    Low,
}

/// OS scheduling hint applied by each worker thread at startup.
///
/// Elevated priority matters on platforms where decode workers compete with
/// the UI thread; platforms without the concept plug in the no-op.
pub trait ThreadPriorityHint: Send + Sync {
    fn apply(&self, worker_id: usize);
}

/// Default hint: do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThreadPriority;

impl ThreadPriorityHint for NoThreadPriority {
    fn apply(&self, _worker_id: usize) {}
}

/// Fixed-size worker pool drawing from three priority queues.
///
/// Construct one per playback subsystem and pass it around explicitly;
/// there is no process-wide instance.
pub struct PriorityWorkers {
    high: Arc<Injector<Job>>,
    medium: Arc<Injector<Job>>,
    low: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl PriorityWorkers {
    /// Create the pool with an explicit thread count.
    ///
    /// # Arguments
    ///
    /// * `num_threads` - worker count, clamped to at least 1
    /// * `hint` - OS thread-priority hint applied by each worker
    pub fn new(num_threads: usize, hint: Arc<dyn ThreadPriorityHint>) -> Self {
        let num_threads = num_threads.max(1);
        let high: Arc<Injector<Job>> = Arc::new(Injector::new());
        let medium: Arc<Injector<Job>> = Arc::new(Injector::new());
        let low: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(num_threads);

        for worker_id in 0..num_threads {
            let high = Arc::clone(&high);
            let medium = Arc::clone(&medium);
            let low = Arc::clone(&low);
            let shutdown = Arc::clone(&shutdown);
            let hint = Arc::clone(&hint);

            let handle = thread::Builder::new()
                .name(format!("animatic-worker-{}", worker_id))
                .spawn(move || {
                    hint.apply(worker_id);
                    trace!("worker {} started", worker_id);

                    loop {
                        // strict priority order: drain High before Medium before Low
                        let job = high
                            .steal()
                            .success()
                            .or_else(|| medium.steal().success())
                            .or_else(|| low.steal().success());

                        match job {
                            Some(job) => {
                                // a panicking task must not take the worker down
                                let result = std::panic::catch_unwind(
                                    std::panic::AssertUnwindSafe(job),
                                );
                                if let Err(e) = result {
                                    error!("worker {} task panicked: {:?}", worker_id, e);
                                }
                            }
                            None => {
                                if shutdown.load(Ordering::Relaxed) {
                                    break;
                                }
                                // no work - short sleep instead of spinning
                                thread::sleep(std::time::Duration::from_millis(1));
                            }
                        }
                    }

                    trace!("worker {} stopped", worker_id);
                })
                .expect("Failed to spawn worker thread");

            handles.push(handle);
        }

        trace!("priority workers initialized: {} threads", num_threads);

        Self {
            high,
            medium,
            low,
            handles,
            shutdown,
        }
    }

    /// Pool sized for decode work: twice the available parallelism, since
    /// preparation tasks are a mix of pixel crunching and pool waits.
    pub fn with_default_size(hint: Arc<dyn ThreadPriorityHint>) -> Self {
        Self::new(num_cpus::get() * 2, hint)
    }

    /// Submit a task. Never blocks; the task runs exactly once, after every
    /// higher-priority task that was already queued.
    pub fn execute<F>(&self, priority: TaskPriority, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let queue = match priority {
            TaskPriority::High => &self.high,
            TaskPriority::Medium => &self.medium,
            TaskPriority::Low => &self.low,
        };
        queue.push(Box::new(f));
    }

    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for PriorityWorkers {
    fn drop(&mut self) {
        use std::time::{Duration, Instant};

        let num_threads = self.handles.len();
        trace!("workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // bounded join: a stalled renderer stalls its task, not our owner
        let deadline = Instant::now() + Duration::from_millis(500);

        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("shutdown timeout reached, exiting anyway");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("all {} workers stopped gracefully", num_threads);
    }
}
