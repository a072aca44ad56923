//! Execution Contexts
//!
//! An execution context is anything that can be handed a closure to run
//! later. Queue-redirect signals deliver through one, and every store owns a
//! serial one through which all of its reads and writes are funneled.
//!
//! # Implementation
//!
//! Each context has a process-unique [`ContextId`]. Worker threads that
//! belong to a context record that id in a thread-local slot while they run
//! jobs, so code can ask "am I already on this context?" and avoid
//! deadlocking on a synchronous hop to itself.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;

/// A unit of work submitted to an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Unique identifier for an execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Generate a new unique context ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Something that runs closures on behalf of a caller.
///
/// Implementations decide where and when the job runs. A context that
/// promises FIFO execution says so in its own documentation.
pub trait ExecutionContext: Send + Sync {
    /// The identity of this context.
    fn id(&self) -> ContextId;

    /// Submit a job for execution.
    fn execute(&self, job: Job);

    /// Whether the calling thread is currently running a job of this context.
    fn is_current(&self) -> bool {
        current_context() == Some(self.id())
    }
}

thread_local! {
    static CURRENT_CONTEXT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// The context whose job the calling thread is running, if any.
pub fn current_context() -> Option<ContextId> {
    CURRENT_CONTEXT.with(Cell::get)
}

/// Guard that marks the current thread as running inside a context.
///
/// The previous marker is restored when the guard drops, so nested entries
/// (an immediate context invoked from a serial queue job) unwind correctly.
pub struct ContextGuard {
    entered: ContextId,
    previous: Option<ContextId>,
}

impl ContextGuard {
    /// Mark the current thread as running jobs for `id`.
    pub fn enter(id: ContextId) -> Self {
        let previous = CURRENT_CONTEXT.with(|slot| slot.replace(Some(id)));
        Self {
            entered: id,
            previous,
        }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let popped = CURRENT_CONTEXT.with(|slot| slot.replace(self.previous));
        debug_assert_eq!(
            popped,
            Some(self.entered),
            "ContextGuard mismatch: expected {:?}, got {:?}",
            self.entered,
            popped
        );
    }
}

/// Runs every job synchronously on the submitting thread.
#[derive(Debug, Default)]
pub struct Immediate {
    id: ContextId,
}

impl Immediate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionContext for Immediate {
    fn id(&self) -> ContextId {
        self.id
    }

    fn execute(&self, job: Job) {
        let _guard = ContextGuard::enter(self.id);
        job();
    }
}

/// Spawns jobs onto a tokio runtime.
///
/// Jobs are spawned in submission order, but a multi-threaded runtime may run
/// them in any order. Use a [`SerialQueue`](super::SerialQueue) when FIFO
/// delivery matters.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    id: ContextId,
    handle: Handle,
}

impl RuntimeContext {
    pub fn new(handle: Handle) -> Self {
        Self {
            id: ContextId::new(),
            handle,
        }
    }

    /// Wrap the runtime the caller is currently running on.
    ///
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl ExecutionContext for RuntimeContext {
    fn id(&self) -> ContextId {
        self.id
    }

    fn execute(&self, job: Job) {
        let id = self.id;
        self.handle.spawn(async move {
            let _guard = ContextGuard::enter(id);
            job();
        });
    }
}
