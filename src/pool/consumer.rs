use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, error, warn};

use super::worker::{FailureHook, Worker};
use super::{Entry, Job, JobFailure, PoolState};
use crate::config::PoolConfig;
use crate::{PoolError, Result};

const DEFAULT_THREAD_NAME: &str = "consumer";

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const DRAINING: u8 = 2;
const STOPPED: u8 = 3;

/// A fixed-size pool of worker threads draining one unbounded FIFO queue.
///
/// The lifecycle is `start`, any number of `enq` calls, one `poison`,
/// then `join`. `poison` places one shutdown sentinel per worker at the
/// tail of the queue: jobs enqueued before it still run, jobs enqueued
/// after it never do. Every method takes `&self`, so the pool can be
/// shared between producer threads behind an `Arc`.
///
/// ```
/// use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// use consumer_pool::ConsumerPool;
///
/// let pool = ConsumerPool::new(2)?;
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// pool.start()?;
/// for _ in 0..10 {
///     let counter = counter.clone();
///     pool.enq(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
/// }
/// pool.poison();
/// pool.join()?;
///
/// assert_eq!(counter.load(Ordering::SeqCst), 10);
/// # Ok::<(), consumer_pool::PoolError>(())
/// ```
pub struct ConsumerPool {
    size: usize,
    thread_name: String,
    stack_size: Option<usize>,
    tx: Sender<Entry>,
    rx: Receiver<Entry>,
    // Read without locking by `enq` and `state`; written under `lifecycle`.
    state: AtomicU8,
    lifecycle: Mutex<Lifecycle>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    live: Arc<AtomicUsize>,
    on_failure: FailureHook,
}

impl ConsumerPool {
    /// Creates an unstarted pool with `size` workers.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidSize` if `size` is zero.
    pub fn new(size: usize) -> Result<Self> {
        Builder::new().size(size).build()
    }

    /// Returns a builder for configuring thread names and the failure hook.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Creates an unstarted pool from a loaded configuration.
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        Builder::new()
            .size(config.size)
            .thread_name(config.thread_name.clone())
            .build()
    }

    /// Spawns the workers.
    ///
    /// Returns once the threads exist, without waiting for them to pick up
    /// any entry. Entries queued before `start` are consumed first.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::AlreadyStarted` on any call after the first, and
    /// `PoolError::Io` if a worker thread cannot be spawned. In the latter
    /// case the workers spawned so far keep running, and a later `poison`
    /// queues one sentinel for each of them. Sentinels queued by a `poison`
    /// issued before the failed `start` are not taken back.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.started {
            return Err(PoolError::AlreadyStarted);
        }
        lifecycle.started = true;
        // A poison issued before start has already queued the sentinels.
        if self.state() == PoolState::Idle {
            self.set_state(PoolState::Running);
        }

        let mut workers = lock(&self.workers);
        for id in 0..self.size {
            let worker = Worker {
                id,
                rx: self.rx.clone(),
                on_failure: self.on_failure.clone(),
                live: self.live.clone(),
            };
            let handle = worker.spawn(format!("{}-{id}", self.thread_name), self.stack_size)?;
            workers.push(handle);
            lifecycle.spawned += 1;
        }
        debug!("Started {} workers", self.size);

        Ok(())
    }

    /// Appends a job to the tail of the queue.
    ///
    /// Never blocks and may be called in any state. A job enqueued after
    /// `poison` sits behind every sentinel and is never executed.
    pub fn enq<J: Job>(&self, job: J) {
        if matches!(self.state(), PoolState::Draining | PoolState::Stopped) {
            warn!("Job enqueued after poison will not be executed");
        }
        self.send(Entry::Job(Box::new(job)));
    }

    /// Requests shutdown by queueing one sentinel per worker.
    ///
    /// Jobs already queued run before the workers exit, and jobs that are
    /// executing are never interrupted. Calling it again is a no-op.
    pub fn poison(&self) {
        let lifecycle = lock(&self.lifecycle);
        match self.state() {
            PoolState::Draining | PoolState::Stopped => {
                warn!("Pool already poisoned, ignoring");
                return;
            }
            PoolState::Idle | PoolState::Running => self.set_state(PoolState::Draining),
        }

        // Before `start` every worker is still to come; after it, only
        // the ones that were actually spawned need a sentinel.
        let sentinels = if lifecycle.started {
            lifecycle.spawned
        } else {
            self.size
        };
        // The lifecycle lock is held so no other `poison` can interleave.
        for _ in 0..sentinels {
            self.send(Entry::Shutdown);
        }
        debug!("Queued {} shutdown sentinels", sentinels);
    }

    /// Blocks until every worker has exited.
    ///
    /// Entries queued behind the sentinels stay in the queue, so the
    /// queue is not necessarily empty afterwards. Once the pool has
    /// stopped, further calls return immediately.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::NotStarted` if `start` was never called, and
    /// `PoolError::WorkerPanicked` if a worker thread died abnormally.
    pub fn join(&self) -> Result<()> {
        if !lock(&self.lifecycle).started {
            return Err(PoolError::NotStarted);
        }

        let mut panicked = None;
        {
            // Held for the whole join so a concurrent caller cannot return early.
            let mut workers = lock(&self.workers);
            if workers.is_empty() {
                return Ok(());
            }
            for handle in mem::take(&mut *workers) {
                let name = handle.thread().name().unwrap_or("<unnamed>").to_owned();
                if handle.join().is_err() {
                    error!("Worker thread {name} panicked");
                    panicked.get_or_insert(name);
                }
            }
        }
        {
            let _lifecycle = lock(&self.lifecycle);
            self.set_state(PoolState::Stopped);
        }
        debug!("All workers joined");

        match panicked {
            Some(name) => Err(PoolError::WorkerPanicked(name)),
            None => Ok(()),
        }
    }

    /// Returns the number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> PoolState {
        match self.state.load(Ordering::SeqCst) {
            IDLE => PoolState::Idle,
            RUNNING => PoolState::Running,
            DRAINING => PoolState::Draining,
            _ => PoolState::Stopped,
        }
    }

    /// Returns the number of worker threads still inside their loop.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Returns the number of entries (jobs and sentinels) still queued.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn set_state(&self, state: PoolState) {
        let value = match state {
            PoolState::Idle => IDLE,
            PoolState::Running => RUNNING,
            PoolState::Draining => DRAINING,
            PoolState::Stopped => STOPPED,
        };
        self.state.store(value, Ordering::SeqCst);
    }

    fn send(&self, entry: Entry) {
        // The pool owns a receiver, so the channel cannot be disconnected.
        if self.tx.send(entry).is_err() {
            error!("Job queue is disconnected, entry dropped");
        }
    }
}

impl fmt::Debug for ConsumerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerPool")
            .field("size", &self.size)
            .field("thread_name", &self.thread_name)
            .field("state", &self.state())
            .field("live_workers", &self.live_workers())
            .field("pending", &self.pending())
            .finish()
    }
}

struct Lifecycle {
    started: bool,
    spawned: usize,
}

/// Builder for a [`ConsumerPool`].
pub struct Builder {
    size: usize,
    thread_name: String,
    stack_size: Option<usize>,
    on_failure: FailureHook,
}

impl Builder {
    /// Creates a builder with one worker per CPU and the default failure hook.
    pub fn new() -> Self {
        Builder {
            size: num_cpus::get(),
            thread_name: DEFAULT_THREAD_NAME.to_owned(),
            stack_size: None,
            on_failure: Arc::new(log_failure),
        }
    }

    /// Sets the number of workers.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Sets the worker thread name prefix. Threads are named `{prefix}-{id}`.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the stack size, in bytes, of each worker thread.
    pub fn thread_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Sets the hook called on the worker thread whenever a job panics.
    ///
    /// The hook replaces the default, which logs the failure. A panic
    /// raised by the hook is caught and logged as well.
    pub fn on_failure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&JobFailure) + Send + Sync + 'static,
    {
        self.on_failure = Arc::new(hook);
        self
    }

    /// Builds the pool without starting it.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidSize` if the size is zero.
    pub fn build(self) -> Result<ConsumerPool> {
        if self.size == 0 {
            return Err(PoolError::InvalidSize(self.size));
        }

        let (tx, rx) = channel::unbounded();
        Ok(ConsumerPool {
            size: self.size,
            thread_name: self.thread_name,
            stack_size: self.stack_size,
            tx,
            rx,
            state: AtomicU8::new(IDLE),
            lifecycle: Mutex::new(Lifecycle {
                started: false,
                spawned: 0,
            }),
            workers: Mutex::new(Vec::with_capacity(self.size)),
            live: Arc::new(AtomicUsize::new(0)),
            on_failure: self.on_failure,
        })
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

fn log_failure(failure: &JobFailure) {
    error!("Worker {} job panicked, continuing: {}", failure.worker, failure.message);
}

/// Jobs run outside every pool lock, so a poisoned lock still guards
/// consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
