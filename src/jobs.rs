//! Job system: a fixed pool of worker threads draining a shared job ring.
//!
//! Callers submit closures and later call [`JobSystem::drain`], which helps
//! execute queued work until every submitted job has completed. `drain` is
//! the only synchronization barrier the system provides; ordering between
//! individual jobs is unspecified.
//!
//! Workers park on a counting semaphore when the ring runs dry; each submit
//! wakes one worker, shutdown wakes them all.

mod ring;

pub use ring::Ring;

use log::{debug, trace};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use thiserror::Error;

/// One quantum of setup or rasterization work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// The job ring was full; the rejected job is handed back to the caller.
#[derive(Error)]
#[error("job ring full ({capacity} entries)")]
pub struct RingFull {
    pub capacity: usize,
    /// The job that did not fit.
    pub job: Job,
}

impl std::fmt::Debug for RingFull {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingFull")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Counting semaphore used only to park idle workers. Not on the hot path:
/// a busy frame never blocks here.
struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            available: Condvar::new(),
        }
    }

    fn post(&self, n: usize) {
        let mut count = self.count.lock().unwrap();
        *count += n;
        if n == 1 {
            self.available.notify_one();
        } else {
            self.available.notify_all();
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock().unwrap();
        while *count == 0 {
            count = self.available.wait(count).unwrap();
        }
        *count -= 1;
    }
}

struct Shared {
    ring: Ring<Job>,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    parked: Semaphore,
    shutdown: AtomicBool,
}

impl Shared {
    /// Claim and run one queued job. Returns false when the ring is empty.
    fn execute_one(&self) -> bool {
        match self.ring.try_pop() {
            Some(job) => {
                job();
                // Release so the draining thread observes the job's writes
                // when it reads the counter.
                self.completed.fetch_add(1, Ordering::Release);
                true
            }
            None => false,
        }
    }
}

/// Fixed worker pool plus bounded job queue.
///
/// Submission and draining belong to the thread that owns the frame (both
/// take `&mut self`); execution is shared with the pool. Dropping the system
/// releases all parked workers and joins them.
pub struct JobSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl JobSystem {
    /// Spawn `workers` pool threads over a ring of `capacity` entries.
    ///
    /// `workers == 0` is valid: every job then runs on the caller inside
    /// [`drain`](Self::drain), which makes frames deterministic.
    pub fn new(workers: usize, capacity: usize) -> Self {
        let shared = Arc::new(Shared {
            ring: Ring::new(capacity),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            parked: Semaphore::new(),
            shutdown: AtomicBool::new(false),
        });

        let handles = (0..workers)
            .map(|id| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("raster-worker-{id}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        debug!("job system: {} workers, ring capacity {}", workers, shared.ring.capacity());

        Self {
            shared,
            workers: handles,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Append a job without blocking. A full ring returns the job to the
    /// caller instead of aborting.
    pub fn try_submit(&mut self, job: Job) -> Result<(), RingFull> {
        match self.shared.ring.try_push(job) {
            Ok(()) => {
                self.shared.submitted.fetch_add(1, Ordering::Relaxed);
                self.shared.parked.post(1);
                Ok(())
            }
            Err(job) => Err(RingFull {
                capacity: self.shared.ring.capacity(),
                job,
            }),
        }
    }

    /// Append a job, helping execute queued entries while the ring is full.
    pub fn submit(&mut self, job: Job) {
        let mut job = job;
        loop {
            match self.try_submit(job) {
                Ok(()) => return,
                Err(full) => {
                    job = full.job;
                    self.shared.execute_one();
                }
            }
        }
    }

    /// Execute remaining work (helping the pool) until every job submitted
    /// so far has completed, then reset the generation counters.
    ///
    /// This is the barrier between the setup and raster stages and between
    /// frames; results produced by jobs must not be read before it returns.
    pub fn drain(&mut self) {
        loop {
            while self.shared.execute_one() {}
            let submitted = self.shared.submitted.load(Ordering::Relaxed);
            let completed = self.shared.completed.load(Ordering::Acquire);
            if submitted == completed {
                break;
            }
            std::hint::spin_loop();
        }

        trace!(
            "drain: {} jobs completed",
            self.shared.completed.load(Ordering::Relaxed)
        );

        self.shared.submitted.store(0, Ordering::Relaxed);
        self.shared.completed.store(0, Ordering::Relaxed);
    }

    /// Counters as (submitted, completed) for the current generation.
    pub fn counters(&self) -> (usize, usize) {
        (
            self.shared.submitted.load(Ordering::Relaxed),
            self.shared.completed.load(Ordering::Relaxed),
        )
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        if !shared.execute_one() {
            // Ring empty: park until a submit or shutdown wakes us.
            shared.parked.wait();
        }
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.parked.post(self.workers.len().max(1));
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("job system: shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn runs_every_job_exactly_once() {
        let mut jobs = JobSystem::new(2, 64);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            jobs.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        }
        jobs.drain();

        assert_eq!(counter.load(Ordering::Relaxed), 50);
    }

    #[test]
    fn drain_resets_counters() {
        let mut jobs = JobSystem::new(2, 16);
        for _ in 0..8 {
            jobs.submit(Box::new(|| {}));
        }
        jobs.drain();
        assert_eq!(jobs.counters(), (0, 0));

        // A second generation starts from zero.
        jobs.submit(Box::new(|| {}));
        jobs.drain();
        assert_eq!(jobs.counters(), (0, 0));
    }

    #[test]
    fn zero_workers_executes_on_drain() {
        let mut jobs = JobSystem::new(0, 16);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            jobs.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        }
        assert_eq!(counter.load(Ordering::Relaxed), 0);
        jobs.drain();
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn try_submit_reports_full() {
        let mut jobs = JobSystem::new(0, 4);
        for _ in 0..4 {
            assert!(jobs.try_submit(Box::new(|| {})).is_ok());
        }
        let err = jobs.try_submit(Box::new(|| {}));
        assert!(err.is_err());
        jobs.drain();
        assert!(jobs.try_submit(Box::new(|| {})).is_ok());
        jobs.drain();
    }

    #[test]
    fn submit_helps_when_full() {
        // With no workers, submit must make room by executing entries itself.
        let mut jobs = JobSystem::new(0, 4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            jobs.submit(Box::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        }
        jobs.drain();
        assert_eq!(counter.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn workers_run_jobs_in_parallel() {
        let mut jobs = JobSystem::new(4, 64);
        let counter = Arc::new(AtomicUsize::new(0));
        let start = std::time::Instant::now();

        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            jobs.submit(Box::new(move || {
                std::thread::sleep(Duration::from_millis(10));
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        }
        jobs.drain();

        // 16 sleeps of 10ms across 4 workers plus the draining thread; well
        // under the 160ms serial time.
        assert!(start.elapsed() < Duration::from_millis(120));
        assert_eq!(counter.load(Ordering::Relaxed), 16);
    }

    #[test]
    fn shutdown_joins_workers() {
        let jobs = JobSystem::new(3, 16);
        drop(jobs); // must not hang
    }
}
