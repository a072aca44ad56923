//! Fetch signal construction.

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use crate::config::FailurePolicy;
use crate::error::FetchError;
use crate::reactive::{Signal, WeakSignal};
use crate::schedule::ExecutionContext;
use crate::store::{ChangeObserver, ChangeSet, ObserverId, Query, RawRecord, Store};

type Transform<V> = Box<dyn FnMut(Vec<RawRecord>) -> Option<V> + Send>;

/// Links one query on one store to the signal carrying its results.
///
/// Owned by that signal; the store only sees it weakly.
struct FetchBridge<V>
where
    V: Clone + Send + Sync + 'static,
{
    this: Weak<FetchBridge<V>>,
    query: Query,
    store: Arc<dyn Store>,
    policy: FailurePolicy,
    transform: Mutex<Transform<V>>,
    /// Store revision of the last executed fetch.
    last_revision: Mutex<Option<u64>>,
    target: WeakSignal<V>,
    observer_id: OnceLock<ObserverId>,
}

impl<V> FetchBridge<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Schedule a fetch on the store's queue.
    fn fetch_updates(&self) {
        let this = self.this.clone();
        self.store.queue().perform(move || {
            if let Some(bridge) = this.upgrade() {
                bridge.fetch_now();
            }
        });
    }

    /// Run the query and push the transformed result. Store queue only.
    fn fetch_now(&self) {
        debug_assert!(self.store.queue().is_current());
        let Some(target) = self.target.upgrade() else {
            return;
        };

        let revision = self.store.revision();
        {
            let mut last = self.last_revision.lock();
            if *last == Some(revision) {
                tracing::trace!(entity = %self.query.entity, revision, "fetch already current");
                return;
            }
            *last = Some(revision);
        }

        let records = match self.store.execute(&self.query) {
            Ok(records) => records,
            Err(error) => {
                self.policy.handle_detached("fetch", &error);
                return;
            }
        };
        tracing::debug!(
            store = self.store.name(),
            entity = %self.query.entity,
            revision,
            matches = records.len(),
            "fetched"
        );

        let value = {
            let mut transform = self.transform.lock();
            (*transform)(records)
        };
        if let Some(value) = value {
            target.push(value);
        }
    }
}

impl<V> ChangeObserver for FetchBridge<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn store_did_change(&self, changes: &ChangeSet) {
        if changes.may_affect(&self.query) {
            self.fetch_updates();
        }
    }
}

impl<V> Drop for FetchBridge<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(id) = self.observer_id.get() {
            self.store.remove_observer(*id);
        }
    }
}

/// A signal carrying `transform` of the records matching `query`.
///
/// The query runs once right away and again after every commit that could
/// affect it, always on the store's queue; values are pushed from there.
/// When `transform` returns `None` nothing is pushed.
pub fn fetch_signal<V, F>(
    store: Arc<dyn Store>,
    query: Query,
    policy: FailurePolicy,
    transform: F,
) -> Signal<V>
where
    V: Clone + Send + Sync + 'static,
    F: FnMut(Vec<RawRecord>) -> Option<V> + Send + 'static,
{
    let signal = Signal::derived(Some(store.queue().id()));
    let bridge = Arc::new_cyclic(|this| FetchBridge {
        this: this.clone(),
        query,
        store: Arc::clone(&store),
        policy,
        transform: Mutex::new(Box::new(transform)),
        last_revision: Mutex::new(None),
        target: signal.downgrade(),
        observer_id: OnceLock::new(),
    });

    let observer: Weak<dyn ChangeObserver> = Arc::downgrade(&bridge) as Weak<dyn ChangeObserver>;
    let id = store.add_observer(observer);
    let _ = bridge.observer_id.set(id);

    bridge.fetch_updates();
    signal.retain(bridge);
    signal
}

/// A fetch signal for a query expected to match at most one record.
///
/// Pushes `Ok` with the decoded match. Once a match has been seen, a fetch
/// that finds none pushes `Err(FetchError::Deleted)`. Until the first match,
/// empty results push nothing.
pub fn item_fetch_signal<V, F>(
    store: Arc<dyn Store>,
    query: Query,
    policy: FailurePolicy,
    decode: F,
) -> Signal<Result<V, FetchError>>
where
    V: Clone + Send + Sync + 'static,
    F: Fn(&RawRecord) -> Option<V> + Send + 'static,
{
    let entity = query.entity.clone();
    let mut has_seen_match = false;
    fetch_signal(store, query, policy, move |records| {
        let mut matches: Vec<V> = records.iter().filter_map(&decode).collect();
        if matches.len() > 1 {
            tracing::warn!(%entity, count = matches.len(), "item query matched more than one record");
        }
        if !matches.is_empty() {
            has_seen_match = true;
            return Some(Ok(matches.swap_remove(0)));
        }
        if has_seen_match {
            has_seen_match = false;
            return Some(Err(FetchError::Deleted));
        }
        None
    })
}

/// A fetch signal for a list query.
///
/// Pushes on every fetch, including an empty list when nothing matches.
/// Records `decode` rejects are left out.
pub fn array_fetch_signal<V, F>(
    store: Arc<dyn Store>,
    query: Query,
    policy: FailurePolicy,
    decode: F,
) -> Signal<Vec<V>>
where
    V: Clone + Send + Sync + 'static,
    F: Fn(&RawRecord) -> Option<V> + Send + 'static,
{
    fetch_signal(store, query, policy, move |records| {
        Some(records.iter().filter_map(&decode).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Predicate, Transaction};
    use std::sync::mpsc;
    use std::time::Duration;

    fn memory_store(name: &str) -> Arc<dyn Store> {
        Arc::new(MemoryStore::new(name))
    }

    fn commit(store: &Arc<dyn Store>, transaction: Transaction) {
        let on_queue = Arc::clone(store);
        store
            .queue()
            .perform_and_wait(move || on_queue.commit(transaction))
            .unwrap();
    }

    fn settle(store: &Arc<dyn Store>) {
        store.queue().wait_until_idle();
    }

    fn ids(records: Vec<RawRecord>) -> Option<Vec<u64>> {
        Some(records.iter().map(|r| r.id).collect())
    }

    fn collect<T>(signal: &Signal<T>) -> Arc<Mutex<Vec<T>>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        signal.subscribe(move |value: &T| sink.lock().push(value.clone()));
        seen
    }

    #[test]
    fn initial_fetch_pushes_current_results() {
        let store = memory_store("test-fetch-initial");
        let mut transaction = Transaction::new();
        transaction.insert(RawRecord::new("Role", 1));
        commit(&store, transaction);

        let signal = fetch_signal(store.clone(), Query::all("Role"), FailurePolicy::Fatal, ids);
        settle(&store);
        assert_eq!(signal.current_value(), Some(vec![1]));
        assert_eq!(signal.notification_context(), Some(store.queue().id()));
    }

    #[test]
    fn values_are_pushed_on_the_store_queue() {
        let store = memory_store("test-fetch-thread");
        let signal = fetch_signal(store.clone(), Query::all("Role"), FailurePolicy::Fatal, ids);
        settle(&store);

        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        signal.subscribe(move |ids: &Vec<u64>| {
            if !ids.is_empty() {
                let name = std::thread::current().name().map(str::to_owned);
                let _ = tx.lock().send(name);
            }
        });

        let mut transaction = Transaction::new();
        transaction.insert(RawRecord::new("Role", 1));
        commit(&store, transaction);

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("test-fetch-thread"));
    }

    #[test]
    fn unrelated_changes_do_not_refetch() {
        let store = memory_store("test-fetch-unrelated");
        let signal = fetch_signal(store.clone(), Query::all("Role"), FailurePolicy::Fatal, ids);
        let seen = collect(&signal);
        settle(&store);

        let mut transaction = Transaction::new();
        transaction.insert(RawRecord::new("Review", 9));
        commit(&store, transaction);
        settle(&store);

        assert_eq!(*seen.lock(), vec![Vec::<u64>::new()]);
    }

    #[test]
    fn record_leaving_the_predicate_triggers_refetch() {
        let store = memory_store("test-fetch-leaving");
        let mut transaction = Transaction::new();
        transaction.insert(RawRecord::new("Role", 1).with_field("is_active", true));
        commit(&store, transaction);

        let query = Query::all("Role").filter(Predicate::field_equals("is_active", true));
        let signal = fetch_signal(store.clone(), query, FailurePolicy::Fatal, ids);
        settle(&store);
        assert_eq!(signal.current_value(), Some(vec![1]));

        let mut transaction = Transaction::new();
        transaction.update("Role", 1, |record| record.set_field("is_active", false));
        commit(&store, transaction);
        settle(&store);
        assert_eq!(signal.current_value(), Some(vec![]));
    }

    #[test]
    fn commits_before_a_refetch_runs_are_coalesced() {
        let store = memory_store("test-fetch-coalesce");
        let signal = fetch_signal(store.clone(), Query::all("Role"), FailurePolicy::Fatal, ids);
        let seen = collect(&signal);
        settle(&store);

        let on_queue = Arc::clone(&store);
        store.queue().perform_and_wait(move || {
            for id in 1..=3 {
                let mut transaction = Transaction::new();
                transaction.insert(RawRecord::new("Role", id));
                on_queue.commit(transaction).unwrap();
            }
        });
        settle(&store);

        assert_eq!(*seen.lock(), vec![vec![], vec![1, 2, 3]]);
    }

    #[test]
    fn transform_returning_none_pushes_nothing() {
        let store = memory_store("test-fetch-none");
        let signal = fetch_signal(store.clone(), Query::all("Role"), FailurePolicy::Fatal, |_| {
            None::<u64>
        });
        settle(&store);
        assert_eq!(signal.current_value(), None);
    }

    #[test]
    fn item_fetch_reports_deletion() {
        let store = memory_store("test-fetch-item");
        let mut transaction = Transaction::new();
        transaction.insert(RawRecord::new("Role", 4));
        commit(&store, transaction);

        let signal = item_fetch_signal(
            store.clone(),
            Query::for_identifier("Role", 4),
            FailurePolicy::Fatal,
            |record| Some(record.id),
        );
        let seen = collect(&signal);
        settle(&store);

        let mut transaction = Transaction::new();
        transaction.delete("Role", 4);
        commit(&store, transaction);
        settle(&store);

        assert_eq!(*seen.lock(), vec![Ok(4), Err(FetchError::Deleted)]);
    }

    #[test]
    fn item_fetch_stays_quiet_until_a_match_appears() {
        let store = memory_store("test-fetch-item-late");
        let signal = item_fetch_signal(
            store.clone(),
            Query::for_identifier("Role", 8),
            FailurePolicy::Fatal,
            |record| Some(record.id),
        );
        settle(&store);
        assert_eq!(signal.current_value(), None);

        let mut transaction = Transaction::new();
        transaction.insert(RawRecord::new("Role", 8));
        commit(&store, transaction);
        settle(&store);
        assert_eq!(signal.current_value(), Some(Ok(8)));
    }

    #[test]
    fn array_fetch_skips_undecodable_records() {
        let store = memory_store("test-fetch-array");
        let mut transaction = Transaction::new();
        transaction
            .insert(RawRecord::new("Role", 1).with_field("short_name", "Parent"))
            .insert(RawRecord::new("Role", 2));
        commit(&store, transaction);

        let signal = array_fetch_signal(store.clone(), Query::all("Role"), FailurePolicy::Fatal, |record| {
            record.field("short_name").and_then(|v| v.as_str()).map(str::to_owned)
        });
        settle(&store);
        assert_eq!(signal.current_value(), Some(vec!["Parent".to_string()]));
    }

    #[test]
    fn dropping_the_signal_unregisters_the_bridge() {
        let memory = Arc::new(MemoryStore::new("test-fetch-drop"));
        let store: Arc<dyn Store> = memory.clone();
        let signal = fetch_signal(store.clone(), Query::all("Role"), FailurePolicy::Fatal, ids);
        settle(&store);

        assert_eq!(memory.observer_count(), 1);

        drop(signal);
        let mut transaction = Transaction::new();
        transaction.insert(RawRecord::new("Role", 1));
        commit(&store, transaction);
        settle(&store);
        assert_eq!(memory.revision(), 1);
        assert_eq!(memory.observer_count(), 0);
    }

    #[test]
    fn log_policy_survives_a_failed_fetch() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::with_schema("test-fetch-log", ["Role"]));
        let signal = fetch_signal(store.clone(), Query::all("Planet"), FailurePolicy::Log, ids);
        settle(&store);
        assert_eq!(signal.current_value(), None);
    }
}
