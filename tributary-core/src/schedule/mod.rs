//! Scheduling
//!
//! Signals push synchronously on the caller's thread by default. This module
//! provides the three ways work leaves the caller's stack:
//!
//! - [`ExecutionContext`]: a place closures can be handed to. Queue-redirect
//!   signals deliver through one.
//! - [`SerialQueue`]: a FIFO worker thread. Each store funnels all of its
//!   reads and writes through one.
//! - [`Timer`]: deadline-ordered execution, used by delayed signals.

mod context;
mod serial_queue;
mod timer;

pub use context::{
    current_context, ContextGuard, ContextId, ExecutionContext, Immediate, Job, RuntimeContext,
};
pub use serial_queue::SerialQueue;
pub use timer::Timer;
