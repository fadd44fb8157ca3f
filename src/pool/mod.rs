use std::fmt;

/// A unit of work executed by a pool worker.
///
/// The pool never inspects a job: it hands ownership to whichever worker
/// dequeues it, and that worker calls `run` synchronously on its own thread.
/// Any closure `FnOnce() + Send + 'static` is a job.
pub trait Job: Send + 'static {
    /// Executes the job to completion on the calling worker thread.
    fn run(self: Box<Self>);
}

impl<F> Job for F
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// An entry of the shared queue.
///
/// Jobs and shutdown sentinels travel through the same FIFO channel, so a
/// sentinel is only reached once every entry ahead of it has been taken.
pub(crate) enum Entry {
    Job(Box<dyn Job>),
    Shutdown,
}

/// Lifecycle of a [`ConsumerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Constructed, no workers spawned yet.
    Idle,
    /// Workers are spawned and consuming the queue.
    Running,
    /// Shutdown sentinels are queued; workers exit as they reach them.
    Draining,
    /// Every worker has exited and been joined.
    Stopped,
}

/// Describes a job that panicked while a worker was running it.
#[derive(Debug, Clone)]
pub struct JobFailure {
    /// Index of the worker that ran the job.
    pub worker: usize,
    /// Name of the worker thread.
    pub thread: String,
    /// The panic message, if it was a string.
    pub message: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job on {} panicked: {}", self.thread, self.message)
    }
}

mod consumer;
mod worker;

pub use self::consumer::{Builder, ConsumerPool};
