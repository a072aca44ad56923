//! Update sessions.
//!
//! A session collects writes into one transaction. Nothing reaches the store
//! until the session ends, and then everything lands in a single commit, so
//! fetch signals see one change instead of many.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::Transaction;

static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

enum SessionState {
    Open(Transaction),
    Ended,
}

struct SessionInner {
    id: u64,
    state: Mutex<SessionState>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let SessionState::Open(transaction) = &*self.state.get_mut() {
            if !transaction.is_empty() {
                tracing::warn!(
                    session = self.id,
                    writes = transaction.len(),
                    "update session dropped without being ended; writes discarded"
                );
            }
        }
    }
}

/// A pending write scope, opened with
/// [`Model::begin_session`](super::Model::begin_session).
///
/// Clones refer to the same session. The session moves from open to ended
/// exactly once; any write through an ended session panics.
#[derive(Clone)]
pub struct UpdateSession {
    inner: Arc<SessionInner>,
}

impl UpdateSession {
    pub(crate) fn begin() -> Self {
        let id = SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(session = id, "update session opened");
        Self {
            inner: Arc::new(SessionInner {
                id,
                state: Mutex::new(SessionState::Open(Transaction::new())),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.inner.state.lock(), SessionState::Open(_))
    }

    /// Number of writes waiting for the session to end.
    pub fn pending_writes(&self) -> usize {
        match &*self.inner.state.lock() {
            SessionState::Open(transaction) => transaction.len(),
            SessionState::Ended => 0,
        }
    }

    /// Add writes to the open transaction.
    ///
    /// # Panics
    ///
    /// Panics if the session has already ended.
    pub(crate) fn record<F>(&self, write: F)
    where
        F: FnOnce(&mut Transaction),
    {
        match &mut *self.inner.state.lock() {
            SessionState::Open(transaction) => write(transaction),
            SessionState::Ended => panic!("update session {} has already ended", self.inner.id),
        }
    }

    /// End the session, handing back everything it collected.
    ///
    /// # Panics
    ///
    /// Panics if the session has already ended.
    pub(crate) fn finish(&self) -> Transaction {
        let state = std::mem::replace(&mut *self.inner.state.lock(), SessionState::Ended);
        match state {
            SessionState::Open(transaction) => {
                tracing::debug!(session = self.inner.id, writes = transaction.len(), "update session ended");
                transaction
            }
            SessionState::Ended => panic!("update session {} has already ended", self.inner.id),
        }
    }
}

impl fmt::Debug for UpdateSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSession")
            .field("id", &self.inner.id)
            .field("open", &self.is_open())
            .field("pending_writes", &self.pending_writes())
            .finish()
    }
}
