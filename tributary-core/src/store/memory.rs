//! In-memory store.
//!
//! Tables are insertion-ordered maps from identifier to record. A commit
//! stages its mutations against a copy of the tables it touches and swaps
//! them in only when every mutation succeeded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::change::{Change, ChangeKind, ChangeObserver, ChangeSet, ObserverId};
use super::query::Query;
use super::record::RawRecord;
use super::transaction::{Mutation, Transaction};
use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::schedule::{ExecutionContext, SerialQueue};

type Table = IndexMap<u64, RawRecord>;

/// Serialized form of a [`MemoryStore`].
#[derive(Serialize, Deserialize)]
struct Snapshot {
    revision: u64,
    schema: Option<Vec<String>>,
    tables: IndexMap<String, Vec<RawRecord>>,
}

pub struct MemoryStore {
    name: String,
    queue: Arc<SerialQueue>,
    schema: Option<IndexSet<String>>,
    tables: RwLock<IndexMap<String, Table>>,
    revision: AtomicU64,
    observers: DashMap<ObserverId, Weak<dyn ChangeObserver>>,
}

impl MemoryStore {
    /// A store accepting any entity name.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// A store accepting only the listed entities.
    pub fn with_schema<I, S>(name: impl Into<String>, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(
            name.into(),
            Some(entities.into_iter().map(Into::into).collect()),
        )
    }

    fn build(name: String, schema: Option<IndexSet<String>>) -> Self {
        let tables = schema
            .iter()
            .flatten()
            .map(|entity| (entity.clone(), Table::new()))
            .collect();
        Self {
            queue: SerialQueue::new(name.clone()),
            name,
            schema,
            tables: RwLock::new(tables),
            revision: AtomicU64::new(0),
            observers: DashMap::new(),
        }
    }

    /// Encode the full store contents as MessagePack.
    pub fn snapshot(&self) -> StoreResult<Vec<u8>> {
        let snapshot = {
            let tables = self.tables.read();
            Snapshot {
                revision: self.revision(),
                schema: self.schema.as_ref().map(|s| s.iter().cloned().collect()),
                tables: tables
                    .iter()
                    .map(|(entity, table)| (entity.clone(), table.values().cloned().collect()))
                    .collect(),
            }
        };
        Ok(rmp_serde::to_vec_named(&snapshot)?)
    }

    /// Rebuild a store from [`snapshot`](Self::snapshot) bytes.
    pub fn from_snapshot(name: impl Into<String>, bytes: &[u8]) -> StoreResult<Self> {
        let snapshot: Snapshot = rmp_serde::from_slice(bytes)?;
        let store = Self::build(name.into(), snapshot.schema.map(IndexSet::from_iter));
        {
            let mut tables = store.tables.write();
            for (entity, records) in snapshot.tables {
                let table = tables.entry(entity).or_default();
                table.extend(records.into_iter().map(|record| (record.id, record)));
            }
        }
        store.revision.store(snapshot.revision, Ordering::SeqCst);
        Ok(store)
    }

    /// Number of records across all tables.
    pub fn len(&self) -> usize {
        self.tables.read().values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registered change observers, live or not.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn check_entity(&self, entity: &str) -> StoreResult<()> {
        match &self.schema {
            Some(schema) if !schema.contains(entity) => {
                Err(StoreError::UnknownEntity(entity.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn assert_on_queue(&self) {
        debug_assert!(
            self.queue.is_current(),
            "store `{}` accessed off its queue",
            self.name
        );
    }

    /// Apply one mutation to the staged tables.
    fn stage(
        &self,
        staged: &mut IndexMap<String, Table>,
        mutation: Mutation,
    ) -> StoreResult<Change> {
        self.check_entity(mutation.entity())?;
        match mutation {
            Mutation::Insert(record) => {
                let table = staged.entry(record.entity.clone()).or_default();
                if table.contains_key(&record.id) {
                    return Err(StoreError::DuplicateRecord {
                        entity: record.entity,
                        id: record.id,
                    });
                }
                table.insert(record.id, record.clone());
                Ok(Change {
                    kind: ChangeKind::Inserted,
                    record,
                    previous: None,
                })
            }
            Mutation::Update { entity, id, apply } => {
                let Some(stored) = staged.get_mut(&entity).and_then(|t| t.get_mut(&id)) else {
                    return Err(StoreError::MissingRecord { entity, id });
                };
                let previous = stored.clone();
                apply(stored);
                // Identity is not a field.
                stored.entity = entity;
                stored.id = id;
                Ok(Change {
                    kind: ChangeKind::Updated,
                    record: stored.clone(),
                    previous: Some(previous),
                })
            }
            Mutation::Delete { entity, id } => {
                let Some(removed) = staged.get_mut(&entity).and_then(|t| t.shift_remove(&id))
                else {
                    return Err(StoreError::MissingRecord { entity, id });
                };
                Ok(Change {
                    kind: ChangeKind::Deleted,
                    record: removed,
                    previous: None,
                })
            }
        }
    }

    /// Bump the revision and tell every live observer.
    fn publish(&self, changes: SmallVec<[Change; 4]>) -> ChangeSet {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let change_set = ChangeSet { revision, changes };

        let mut live = Vec::new();
        self.observers.retain(|_, observer| match observer.upgrade() {
            Some(observer) => {
                live.push(observer);
                true
            }
            None => false,
        });
        tracing::debug!(
            store = %self.name,
            revision,
            changes = change_set.changes.len(),
            observers = live.len(),
            "publishing change set"
        );
        for observer in live {
            observer.store_did_change(&change_set);
        }
        change_set
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn queue(&self) -> &Arc<SerialQueue> {
        &self.queue
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    fn execute(&self, query: &Query) -> StoreResult<Vec<RawRecord>> {
        self.assert_on_queue();
        self.check_entity(&query.entity)?;
        let tables = self.tables.read();
        Ok(tables
            .get(&query.entity)
            .map(|table| {
                table
                    .values()
                    .filter(|record| query.matches(record))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn commit(&self, transaction: Transaction) -> StoreResult<Option<ChangeSet>> {
        self.assert_on_queue();
        if transaction.is_empty() {
            return Ok(None);
        }

        let changes = {
            let mut tables = self.tables.write();
            let mut staged: IndexMap<String, Table> = IndexMap::new();
            let mut changes = SmallVec::new();
            for mutation in transaction.into_mutations() {
                let entity = mutation.entity();
                if !staged.contains_key(entity) {
                    let current = tables.get(entity).cloned().unwrap_or_default();
                    staged.insert(entity.to_string(), current);
                }
                changes.push(self.stage(&mut staged, mutation)?);
            }
            for (entity, table) in staged {
                tables.insert(entity, table);
            }
            changes
        };

        Ok(Some(self.publish(changes)))
    }

    fn refresh(&self, entity: &str) -> StoreResult<Option<ChangeSet>> {
        self.assert_on_queue();
        self.check_entity(entity)?;
        let changes: SmallVec<[Change; 4]> = self
            .tables
            .read()
            .get(entity)
            .map(|table| {
                table
                    .values()
                    .map(|record| Change {
                        kind: ChangeKind::Refreshed,
                        record: record.clone(),
                        previous: None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if changes.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.publish(changes)))
    }

    fn add_observer(&self, observer: Weak<dyn ChangeObserver>) -> ObserverId {
        let id = ObserverId::new();
        self.observers.insert(id, observer);
        id
    }

    fn remove_observer(&self, id: ObserverId) {
        self.observers.remove(&id);
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.name)
            .field("revision", &self.revision())
            .field("records", &self.len())
            .finish()
    }
}
