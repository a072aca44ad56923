//! Change notifications emitted by a store after each commit.

use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::query::Query;
use super::record::RawRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
    /// Re-announced without a content change, e.g. after an external merge.
    Refreshed,
}

/// One affected record.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub kind: ChangeKind,
    /// The record after the change; for deletions, the record as it was.
    pub record: RawRecord,
    /// The record before an update.
    pub previous: Option<RawRecord>,
}

impl Change {
    /// Whether this change could alter the results of `query`.
    ///
    /// An update counts when either side matches, so a record that stops
    /// matching is noticed too.
    pub fn may_affect(&self, query: &Query) -> bool {
        query.matches(&self.record)
            || self
                .previous
                .as_ref()
                .is_some_and(|previous| query.matches(previous))
    }
}

/// Everything one commit changed, tagged with the store revision it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub revision: u64,
    pub changes: SmallVec<[Change; 4]>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn may_affect(&self, query: &Query) -> bool {
        self.changes.iter().any(|change| change.may_affect(query))
    }

    /// The changes of one kind.
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &Change> {
        self.changes.iter().filter(move |change| change.kind == kind)
    }
}

/// Receives a store's change sets.
///
/// Called on the store's serial queue, after the commit is visible.
pub trait ChangeObserver: Send + Sync {
    fn store_did_change(&self, changes: &ChangeSet);
}

static OBSERVER_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Registration token for a [`ChangeObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    pub fn new() -> Self {
        Self(OBSERVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}
