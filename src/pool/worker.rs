use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;
use log::{debug, error};

use super::{Entry, JobFailure};

/// Callback invoked with every job that panicked.
pub(crate) type FailureHook = Arc<dyn Fn(&JobFailure) + Send + Sync + 'static>;

/// Everything a worker thread needs, moved into the thread at spawn time.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) rx: Receiver<Entry>,
    pub(crate) on_failure: FailureHook,
    pub(crate) live: Arc<AtomicUsize>,
}

/// Decrements the live worker count when the worker loop is left,
/// whichever way it is left.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Worker {
    /// Spawns the worker loop on a new named thread.
    ///
    /// Returns as soon as the thread exists; it does not wait for the
    /// worker to take its first entry.
    pub(crate) fn spawn(
        self,
        name: String,
        stack_size: Option<usize>,
    ) -> io::Result<JoinHandle<()>> {
        let live = self.live.clone();
        live.fetch_add(1, Ordering::SeqCst);
        let mut builder = thread::Builder::new().name(name);
        if let Some(size) = stack_size {
            builder = builder.stack_size(size);
        }
        let spawned = builder.spawn(move || self.run());
        if spawned.is_err() {
            live.fetch_sub(1, Ordering::SeqCst);
        }
        spawned
    }

    fn run(self) {
        let _guard = LiveGuard(self.live.clone());
        let id = self.id;

        loop {
            match self.rx.recv() {
                Ok(Entry::Job(job)) => {
                    debug!("Worker {id} executing job");
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
                        let failure = JobFailure {
                            worker: id,
                            thread: current_thread_name(),
                            message: panic_message(payload.as_ref()),
                        };
                        self.report(&failure);
                    }
                }
                Ok(Entry::Shutdown) => {
                    debug!("Worker {id} received shutdown, exiting");
                    return;
                }
                Err(_) => {
                    debug!("Worker {id}: queue disconnected, exiting");
                    return;
                }
            }
        }
    }

    /// Hands a failure to the hook. A panicking hook must not take the
    /// worker down with it.
    fn report(&self, failure: &JobFailure) {
        let hook = &self.on_failure;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| hook(failure))) {
            error!(
                "Worker {} failure hook panicked: {} (job failure: {})",
                self.id,
                panic_message(payload.as_ref()),
                failure
            );
        }
    }
}

fn current_thread_name() -> String {
    thread::current().name().unwrap_or("<unnamed>").to_owned()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
