//! Execution of per-segment counting tasks.
//!
//! The engine owns one [`WorkerPool`] built from its [`ExecutionMode`]. A
//! cached pool hands each task to an idle worker through a zero-capacity
//! channel, or spawns a new worker when none is idle; workers exit after
//! staying idle for the configured timeout. A fixed pool runs tasks on a
//! rayon pool of the requested size.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{FacetryError, Result};

/// Where per-segment counting runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// On the calling thread.
    Inline,
    /// On worker threads. `None` grows the pool on demand.
    Pooled { max_threads: Option<usize> },
}

impl Default for ExecutionMode {
    fn default() -> Self {
        ExecutionMode::Pooled { max_threads: None }
    }
}

/// Request-level cancellation flag shared with running tasks.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    cancelled: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Clear the flag for the next request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail with [`FacetryError::Cancelled`] once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FacetryError::cancelled("facet computation abandoned"))
        } else {
            Ok(())
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A task producing one partial result.
pub type Task<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

/// Unbounded pool with idle-worker reclamation.
#[derive(Debug)]
pub struct CachedPool {
    handoff_tx: Sender<Job>,
    handoff_rx: Receiver<Job>,
    idle_timeout: Duration,
    live_workers: Arc<AtomicUsize>,
    spawned: AtomicUsize,
}

impl CachedPool {
    pub fn new(idle_timeout: Duration) -> Self {
        let (handoff_tx, handoff_rx) = crossbeam_channel::bounded(0);
        CachedPool {
            handoff_tx,
            handoff_rx,
            idle_timeout,
            live_workers: Arc::new(AtomicUsize::new(0)),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Hand the job to an idle worker, or start a new one.
    fn execute(&self, job: Job) -> Result<()> {
        let job = match self.handoff_tx.try_send(job) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => job,
        };

        let rx = self.handoff_rx.clone();
        let idle_timeout = self.idle_timeout;
        let live = Arc::clone(&self.live_workers);
        let n = self.spawned.fetch_add(1, Ordering::Relaxed);

        live.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name(format!("facet-worker-{n}"))
            .spawn(move || {
                job();
                while let Ok(next) = rx.recv_timeout(idle_timeout) {
                    next();
                }
                live.fetch_sub(1, Ordering::AcqRel);
            });

        if let Err(e) = spawned {
            self.live_workers.fetch_sub(1, Ordering::AcqRel);
            return Err(FacetryError::internal(format!(
                "Failed to spawn facet worker: {e}"
            )));
        }
        Ok(())
    }

    /// Workers currently alive, busy or idle.
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }
}

/// Executor for per-segment tasks.
#[derive(Debug)]
pub enum WorkerPool {
    Inline,
    Cached(CachedPool),
    Fixed(ThreadPool),
}

impl WorkerPool {
    /// Build the pool for an execution mode.
    pub fn new(mode: ExecutionMode, idle_timeout: Duration) -> Result<Self> {
        match mode {
            ExecutionMode::Inline => Ok(WorkerPool::Inline),
            ExecutionMode::Pooled { max_threads: None } => {
                Ok(WorkerPool::Cached(CachedPool::new(idle_timeout)))
            }
            ExecutionMode::Pooled {
                max_threads: Some(threads),
            } => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(threads.max(1))
                    .thread_name(|i| format!("facet-worker-{i}"))
                    .build()
                    .map_err(|e| {
                        FacetryError::internal(format!("Failed to create thread pool: {e}"))
                    })?;
                Ok(WorkerPool::Fixed(pool))
            }
        }
    }

    /// Run every task and wait for all of them.
    ///
    /// Results come back in task order. When tasks fail, the error of the
    /// first failing task (in task order) is returned once all have finished.
    pub fn run_all<T: Send + 'static>(&self, tasks: Vec<Task<T>>) -> Result<Vec<T>> {
        if matches!(self, WorkerPool::Inline) || tasks.len() <= 1 {
            return tasks.into_iter().map(|task| task()).collect();
        }

        let num_tasks = tasks.len();
        let (tx, rx) = crossbeam_channel::unbounded();

        for (idx, task) in tasks.into_iter().enumerate() {
            let tx = tx.clone();
            let job: Job = Box::new(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(task));
                let _ = tx.send((idx, outcome));
            });
            match self {
                WorkerPool::Cached(pool) => pool.execute(job)?,
                WorkerPool::Fixed(pool) => pool.spawn(job),
                WorkerPool::Inline => job(),
            }
        }
        drop(tx);

        let mut slots: Vec<Option<Result<T>>> = (0..num_tasks).map(|_| None).collect();
        for _ in 0..num_tasks {
            let (idx, outcome) = rx
                .recv()
                .map_err(|_| FacetryError::internal("facet worker exited without a result"))?;
            slots[idx] = Some(outcome.unwrap_or_else(|_| {
                Err(FacetryError::internal("facet worker panicked"))
            }));
        }

        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| Err(FacetryError::internal("missing task result"))))
            .collect()
    }

    /// Whether tasks run on other threads.
    pub fn is_concurrent(&self) -> bool {
        !matches!(self, WorkerPool::Inline)
    }
}
