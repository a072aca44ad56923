//! Store Contract
//!
//! The signal engine does not own any data. It talks to a store that can run
//! predicate queries, commit transactions, and report what each commit
//! changed. [`MemoryStore`] is the in-process implementation.
//!
//! # Threading
//!
//! Each store owns a [`SerialQueue`]. Every read and write must run on that
//! queue, and change observers are called on it too, so query results never
//! interleave with a concurrent commit.

mod change;
mod memory;
mod query;
mod record;
mod transaction;

use std::sync::{Arc, Weak};

pub use change::{Change, ChangeKind, ChangeObserver, ChangeSet, ObserverId};
pub use memory::MemoryStore;
pub use query::{Predicate, Query};
pub use record::RawRecord;
pub use transaction::{FieldWriter, Mutation, Transaction};

use crate::error::StoreResult;
use crate::schedule::SerialQueue;

/// A queryable store that announces its changes.
pub trait Store: Send + Sync {
    fn name(&self) -> &str;

    /// The queue all access to this store goes through.
    fn queue(&self) -> &Arc<SerialQueue>;

    /// Revision of the last commit. Grows by one per non-empty commit.
    fn revision(&self) -> u64;

    /// Run `query`, returning matching records in storage order.
    fn execute(&self, query: &Query) -> StoreResult<Vec<RawRecord>>;

    /// Apply `transaction` atomically and notify observers.
    ///
    /// Returns `None` for an empty transaction, which changes nothing and
    /// notifies nobody.
    fn commit(&self, transaction: Transaction) -> StoreResult<Option<ChangeSet>>;

    /// Re-announce every record of `entity` as refreshed.
    fn refresh(&self, entity: &str) -> StoreResult<Option<ChangeSet>>;

    /// Register a change observer. The store only holds it weakly.
    fn add_observer(&self, observer: Weak<dyn ChangeObserver>) -> ObserverId;

    fn remove_observer(&self, id: ObserverId);
}
