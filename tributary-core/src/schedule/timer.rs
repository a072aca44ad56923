//! Delay Timer
//!
//! Runs jobs no earlier than a given deadline. Delayed signals use the
//! process-wide [`Timer::global`] instance.
//!
//! # Ordering
//!
//! Pending jobs are kept in a heap keyed by `(deadline, sequence)`, where the
//! sequence number increases with every submission. Jobs with equal
//! deadlines therefore fire in submission order, and a caller that submits
//! with non-decreasing deadlines gets strict FIFO delivery.
//!
//! # Implementation
//!
//! The timer owns a thread running a current-thread tokio runtime. One task
//! on it receives submissions over a channel and sleeps until the earliest
//! deadline. The deadline is re-checked against the clock after every wake,
//! so a job never fires before its deadline.

use std::cmp::{Ordering as CmpOrdering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::context::Job;

struct Scheduled {
    deadline: Instant,
    sequence: u64,
    job: Job,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.deadline, self.sequence).cmp(&(other.deadline, other.sequence))
    }
}

/// A deadline-ordered job runner.
pub struct Timer {
    name: String,
    sender: mpsc::UnboundedSender<Scheduled>,
    sequence: AtomicU64,
}

impl Timer {
    /// The shared timer used by delayed signals.
    pub fn global() -> &'static Timer {
        static GLOBAL: OnceLock<Timer> = OnceLock::new();
        GLOBAL.get_or_init(|| Timer::spawn("tributary-timer"))
    }

    /// Start a timer with its own driver thread.
    ///
    /// Jobs still pending when the timer is dropped are discarded.
    pub fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .expect("failed to build timer runtime");
                runtime.block_on(drive(receiver));
            })
            .expect("failed to spawn timer thread");

        Self {
            name,
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `job` once `delay` has elapsed from now.
    pub fn schedule_after(&self, delay: Duration, job: Job) {
        self.schedule_at(Instant::now() + delay, job);
    }

    /// Run `job` at or after `deadline`.
    pub fn schedule_at(&self, deadline: Instant, job: Job) {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let scheduled = Scheduled {
            deadline,
            sequence,
            job,
        };
        if self.sender.send(scheduled).is_err() {
            tracing::error!(timer = %self.name, "timer driver is gone, job dropped");
        }
    }
}

async fn drive(mut incoming: mpsc::UnboundedReceiver<Scheduled>) {
    let mut pending: BinaryHeap<Reverse<Scheduled>> = BinaryHeap::new();

    loop {
        let next_deadline = pending.peek().map(|Reverse(entry)| entry.deadline);

        tokio::select! {
            received = incoming.recv() => match received {
                Some(entry) => pending.push(Reverse(entry)),
                None => break,
            },
            () = sleep_until(next_deadline) => {
                let now = Instant::now();
                while pending
                    .peek()
                    .is_some_and(|Reverse(entry)| entry.deadline <= now)
                {
                    if let Some(Reverse(entry)) = pending.pop() {
                        fire(entry);
                    }
                }
            }
        }
    }

    if !pending.is_empty() {
        tracing::debug!(discarded = pending.len(), "timer stopped with pending jobs");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn fire(entry: Scheduled) {
    if catch_unwind(AssertUnwindSafe(entry.job)).is_err() {
        tracing::error!(sequence = entry.sequence, "timer job panicked");
    }
}
