//! Fixed-size worker pool and completion barrier used by each sweep step

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, warn};

use crate::error::{BenchError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A pool of exactly `size` worker threads fed from an unbounded queue.
///
/// The pool lives for one step. Dropping it closes the queue, discards jobs
/// that have not started, and joins the workers. Workers still running a job
/// at that point (only possible after a failed or timed out step) are
/// detached instead of joined.
pub struct WorkerPool {
    size: usize,
    sender: Option<Sender<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    cancelled: Arc<AtomicBool>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `size` workers
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(BenchError::Config("worker pool needs at least one thread".to_string()));
        }

        let (sender, receiver) = channel::unbounded::<Job>();
        let cancelled = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicUsize::new(0));

        let mut pool = Self {
            size,
            sender: Some(sender),
            handles: Vec::with_capacity(size),
            cancelled: Arc::clone(&cancelled),
            active: Arc::clone(&active),
        };

        for worker_id in 0..size {
            let receiver = receiver.clone();
            let cancelled = Arc::clone(&cancelled);
            let active = Arc::clone(&active);

            let handle = thread::Builder::new()
                .name(format!("flowbench-worker-{}", worker_id))
                .spawn(move || run_worker(receiver, cancelled, active))?;
            pool.handles.push(handle);
        }

        debug!(size, "worker pool started");
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Enqueue a job without blocking
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| BenchError::WorkerLost("pool already shut down".to_string()))?;
        sender
            .send(Box::new(job))
            .map_err(|_| BenchError::WorkerLost("all workers exited".to_string()))
    }

    /// Number of jobs currently running
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Close the queue and wait for every worker to exit.
    ///
    /// Used once all submitted jobs have reported; a job that already sent its
    /// result may still be unwinding and is waited for rather than detached.
    pub fn join(mut self) {
        self.close();
        self.join_workers();
    }

    fn close(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.sender.take();
    }

    fn join_workers(&mut self) {
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!(size = self.size, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.close();

        let busy = self.active.load(Ordering::SeqCst);
        if busy == 0 {
            self.join_workers();
        } else {
            warn!(
                busy,
                size = self.size,
                "Detaching workers still running a job"
            );
            self.handles.clear();
        }
    }
}

fn run_worker(receiver: Receiver<Job>, cancelled: Arc<AtomicBool>, active: Arc<AtomicUsize>) {
    while let Ok(job) = receiver.recv() {
        // Count first so Drop either sees this job or we see the cancellation
        active.fetch_add(1, Ordering::SeqCst);
        if !cancelled.load(Ordering::SeqCst) {
            // A panicking job drops its result sender, which the barrier reports
            let _ = panic::catch_unwind(AssertUnwindSafe(job));
        }
        active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Why a [`CompletionBarrier`] did not release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierError {
    /// The deadline passed with `completed` results received
    Timeout { completed: usize },
    /// Every sender was dropped with `completed` results received
    Disconnected { completed: usize },
}

/// Why a [`CompletionBarrier::try_wait`] did not release
#[derive(Debug)]
pub enum BarrierFailure<E> {
    Barrier(BarrierError),
    /// A task reported an error; remaining results are not awaited
    Task { completed: usize, error: E },
}

/// Counts results of independent tasks down to zero, bounded by a deadline
pub struct CompletionBarrier<T> {
    expected: usize,
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> CompletionBarrier<T> {
    pub fn new(expected: usize) -> Self {
        let (sender, receiver) = channel::bounded(expected.max(1));
        Self {
            expected,
            sender,
            receiver,
        }
    }

    /// Handle a task uses to report its result
    pub fn reporter(&self) -> Sender<T> {
        self.sender.clone()
    }

    /// Block until `expected` results arrived or `deadline` passed.
    ///
    /// Results are returned in completion order.
    pub fn wait(self, deadline: Instant) -> std::result::Result<Vec<T>, BarrierError> {
        let Self {
            expected,
            sender,
            receiver,
        } = self;
        // Only task reporters keep the channel open from here on
        drop(sender);

        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            match receiver.recv_deadline(deadline) {
                Ok(value) => results.push(value),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BarrierError::Timeout {
                        completed: results.len(),
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BarrierError::Disconnected {
                        completed: results.len(),
                    })
                }
            }
        }
        Ok(results)
    }
}

impl<V, E> CompletionBarrier<std::result::Result<V, E>> {
    /// Like [`wait`](Self::wait), but releases early on the first failed task
    pub fn try_wait(self, deadline: Instant) -> std::result::Result<Vec<V>, BarrierFailure<E>> {
        let Self {
            expected,
            sender,
            receiver,
        } = self;
        drop(sender);

        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            let completed = results.len();
            match receiver.recv_deadline(deadline) {
                Ok(Ok(value)) => results.push(value),
                Ok(Err(error)) => return Err(BarrierFailure::Task { completed, error }),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(BarrierFailure::Barrier(BarrierError::Timeout { completed }))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(BarrierFailure::Barrier(BarrierError::Disconnected {
                        completed,
                    }))
                }
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn test_zero_sized_pool_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(BenchError::Config(_))));
    }

    #[test]
    fn test_pool_runs_on_exactly_size_threads() {
        let pool = WorkerPool::new(3).unwrap();
        let barrier = CompletionBarrier::new(60);
        let seen = Arc::new(Mutex::new(HashSet::new()));

        for _ in 0..60 {
            let reporter = barrier.reporter();
            let seen = Arc::clone(&seen);
            pool.execute(move || {
                thread::sleep(Duration::from_millis(2));
                let name = thread::current().name().map(str::to_string);
                seen.lock().unwrap().insert(name);
                let _ = reporter.send(());
            })
            .unwrap();
        }

        let results = barrier
            .wait(Instant::now() + Duration::from_secs(30))
            .unwrap();
        assert_eq!(results.len(), 60);

        let seen = seen.lock().unwrap();
        assert!(seen.len() <= 3);
        assert!(seen
            .iter()
            .all(|n| n.as_deref().unwrap_or("").starts_with("flowbench-worker-")));
    }

    #[test]
    fn test_barrier_times_out() {
        let pool = WorkerPool::new(1).unwrap();
        let barrier = CompletionBarrier::<u64>::new(2);
        let reporter = barrier.reporter();
        pool.execute(move || {
            let _ = reporter.send(1);
        })
        .unwrap();
        // Second task never reports but is still outstanding
        let _hung = barrier.reporter();

        let err = barrier
            .wait(Instant::now() + Duration::from_millis(200))
            .unwrap_err();
        assert_eq!(err, BarrierError::Timeout { completed: 1 });
    }

    #[test]
    fn test_barrier_reports_panicked_task() {
        let pool = WorkerPool::new(2).unwrap();
        let barrier = CompletionBarrier::<u64>::new(2);

        let ok = barrier.reporter();
        pool.execute(move || {
            let _ = ok.send(1);
        })
        .unwrap();

        let lost = barrier.reporter();
        pool.execute(move || {
            let _keep = lost;
            panic!("engine blew up");
        })
        .unwrap();

        let err = barrier
            .wait(Instant::now() + Duration::from_secs(30))
            .unwrap_err();
        assert_eq!(err, BarrierError::Disconnected { completed: 1 });

        // The pool survives the panic
        assert_eq!(pool.size(), 2);
    }

    #[test]
    fn test_try_wait_releases_on_first_error() {
        let barrier = CompletionBarrier::<std::result::Result<u64, String>>::new(3);
        let reporter = barrier.reporter();
        reporter.send(Ok(1)).unwrap();
        reporter.send(Err("boom".to_string())).unwrap();

        match barrier.try_wait(Instant::now() + Duration::from_secs(30)) {
            Err(BarrierFailure::Task { completed, error }) => {
                assert_eq!(completed, 1);
                assert_eq!(error, "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_try_wait_collects_all_values() {
        let barrier = CompletionBarrier::<std::result::Result<u64, String>>::new(2);
        let reporter = barrier.reporter();
        reporter.send(Ok(4)).unwrap();
        reporter.send(Ok(2)).unwrap();
        drop(reporter);

        let values = barrier
            .try_wait(Instant::now() + Duration::from_secs(30))
            .unwrap();
        assert_eq!(values, vec![4, 2]);
    }

    #[test]
    fn test_join_waits_for_jobs_that_already_reported() {
        let finished = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(2).unwrap();
        let barrier = CompletionBarrier::<()>::new(4);

        for _ in 0..4 {
            let reporter = barrier.reporter();
            let finished = Arc::clone(&finished);
            pool.execute(move || {
                let _ = reporter.send(());
                thread::sleep(Duration::from_millis(30));
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        barrier
            .wait(Instant::now() + Duration::from_secs(30))
            .unwrap();
        pool.join();
        assert_eq!(finished.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_drop_discards_queued_jobs() {
        let ran = Arc::new(AtomicUsize::new(0));
        {
            let pool = WorkerPool::new(1).unwrap();
            let gate = CompletionBarrier::<()>::new(1);
            let started = gate.reporter();
            pool.execute(move || {
                let _ = started.send(());
                thread::sleep(Duration::from_millis(50));
            })
            .unwrap();
            for _ in 0..10 {
                let ran = Arc::clone(&ran);
                pool.execute(move || {
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
            }
            gate.wait(Instant::now() + Duration::from_secs(30)).unwrap();
        }
        thread::sleep(Duration::from_millis(100));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
