//! Persistence-Change Bridge
//!
//! Fetch signals keep the result of a store query current. Each one runs its
//! query once on creation and again whenever a store commit could have
//! changed the answer.
//!
//! # How Fetch Signals Work
//!
//! 1. The bridge registers with the store as a [`ChangeObserver`].
//!
//! 2. For every change set it checks, cheaply and without querying, whether
//!    any changed record matches the query now or matched it before.
//!
//! 3. If so it schedules a re-query on the store's queue. Re-queries are
//!    keyed by store revision, so several commits landing before one
//!    re-query runs produce a single push.
//!
//! 4. The raw records go through the caller's transform; `None` means "no
//!    news" and nothing is pushed.
//!
//! [`ChangeObserver`]: crate::store::ChangeObserver

mod fetch;

pub use fetch::{array_fetch_signal, fetch_signal, item_fetch_signal};
