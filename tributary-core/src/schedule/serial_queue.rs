//! Serial Queues
//!
//! A serial queue owns one worker thread and runs submitted jobs one at a
//! time, in submission order. Stores use one as their serialized execution
//! context; signals can redirect delivery onto one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};

use super::context::{ContextGuard, ContextId, ExecutionContext, Job};

/// A FIFO execution context backed by a dedicated worker thread.
///
/// The worker exits once the last handle to the queue is dropped and the
/// remaining jobs have run. A job that panics takes the worker down with it;
/// later submissions are dropped and logged, and blocking calls panic.
pub struct SerialQueue {
    id: ContextId,
    name: String,
    sender: mpsc::UnboundedSender<Job>,
    /// Jobs submitted but not yet finished.
    pending: Arc<AtomicUsize>,
}

impl SerialQueue {
    /// Create a queue and start its worker thread.
    ///
    /// The worker thread carries `name`, which also shows up in log output.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        let id = ContextId::new();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let pending = Arc::new(AtomicUsize::new(0));

        let worker_pending = Arc::clone(&pending);
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let _guard = ContextGuard::enter(id);
                while let Some(job) = receiver.blocking_recv() {
                    job();
                    worker_pending.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .expect("failed to spawn serial queue worker");

        tracing::debug!(queue = %name, context = %id, "started serial queue");

        Arc::new(Self {
            id,
            name,
            sender,
            pending,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submit a closure to run after everything already queued.
    pub fn perform<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(f));
    }

    /// Run a closure on the queue and wait for its result.
    ///
    /// Runs inline when called from the queue's own worker, so a job may
    /// safely hop to its own queue.
    ///
    /// Must not be called from inside an async task: it blocks the thread.
    pub fn perform_and_wait<R, F>(&self, f: F) -> R
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.is_current() {
            return f();
        }

        let (tx, rx) = oneshot::channel();
        self.perform(move || {
            let _ = tx.send(f());
        });
        rx.blocking_recv().unwrap_or_else(|_| {
            panic!("serial queue `{}` terminated before finishing a job", self.name)
        })
    }

    /// Block until the queue has no pending work.
    ///
    /// Jobs enqueued by running jobs are waited for as well, so after this
    /// returns every cascade of follow-up work triggered so far has finished.
    pub fn wait_until_idle(&self) {
        if self.is_current() {
            debug_assert!(false, "wait_until_idle called from its own queue `{}`", self.name);
            return;
        }

        loop {
            let pending = Arc::clone(&self.pending);
            // The marker job itself is still counted while it runs.
            let queued_behind = self.perform_and_wait(move || pending.load(Ordering::SeqCst));
            if queued_behind <= 1 {
                break;
            }
        }
    }

    /// Number of jobs submitted but not yet finished.
    pub fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn submit(&self, job: Job) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::error!(queue = %self.name, "serial queue worker is gone, job dropped");
        }
    }
}

impl ExecutionContext for SerialQueue {
    fn id(&self) -> ContextId {
        self.id
    }

    fn execute(&self, job: Job) {
        self.submit(job);
    }
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pending", &self.pending_jobs())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn jobs_run_in_submission_order() {
        let queue = SerialQueue::new("test-fifo");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = seen.clone();
            queue.perform(move || seen.lock().push(i));
        }
        queue.wait_until_idle();

        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn jobs_run_on_the_named_worker() {
        let queue = SerialQueue::new("test-worker-name");
        let name = queue.perform_and_wait(|| thread::current().name().map(str::to_owned));
        assert_eq!(name.as_deref(), Some("test-worker-name"));
    }

    #[test]
    fn perform_and_wait_is_reentrant() {
        let queue = SerialQueue::new("test-reentrant");
        let inner = queue.clone();
        let value = queue.perform_and_wait(move || {
            assert!(inner.is_current());
            inner.perform_and_wait(|| 7)
        });
        assert_eq!(value, 7);
        assert!(!queue.is_current());
    }

    #[test]
    fn wait_until_idle_covers_follow_up_jobs() {
        let queue = SerialQueue::new("test-cascade");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let outer_queue = queue.clone();
        let outer_seen = seen.clone();
        queue.perform(move || {
            outer_seen.lock().push("first");
            let inner_seen = outer_seen.clone();
            let follow_queue = outer_queue.clone();
            outer_queue.perform(move || {
                inner_seen.lock().push("second");
                follow_queue.perform(move || inner_seen.lock().push("third"));
            });
        });
        queue.wait_until_idle();

        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }
}
