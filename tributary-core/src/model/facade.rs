//! Transactional Update Facade
//!
//! [`Model`] is the one object application code talks to. It hands out
//! fetch signals for records and record lists, and turns value writes into
//! store transactions, either one per call or batched in an
//! [`UpdateSession`].
//!
//! Writes are committed on the store's queue. The calling thread waits for
//! the commit itself; the fetch signals it wakes update afterwards, on the
//! queue. Call [`Model::settle`] to wait for those as well.

use std::sync::Arc;

use super::identifier::Identifier;
use super::session::UpdateSession;
use super::value::StoreBacked;
use crate::config::ModelConfig;
use crate::error::{ConfigError, FetchError};
use crate::persistence::{array_fetch_signal, item_fetch_signal};
use crate::reactive::Signal;
use crate::store::{MemoryStore, Query, Store, Transaction};

/// Reads and writes domain values through a store.
///
/// # Example
///
/// ```rust
/// use tributary_core::model::{Model, Role};
///
/// let model = Model::in_memory("doc-model");
/// let roles = model.values_for::<Role>();
///
/// let id = model.instantiate::<Role>();
/// model.settle();
/// assert_eq!(roles.current_value().map(|r| r.len()), Some(1));
///
/// let session = model.begin_session();
/// let mut role = roles.current_value().unwrap().remove(0);
/// role.short_name = "Parent".into();
/// model.update_in(&role, &session);
/// model.end_session(&session);
/// model.settle();
///
/// assert_eq!(roles.current_value().unwrap()[0].short_name, "Parent");
/// assert_eq!(roles.current_value().unwrap()[0].identifier, id);
/// ```
#[derive(Clone)]
pub struct Model {
    store: Arc<dyn Store>,
    config: ModelConfig,
}

impl Model {
    pub fn new(store: Arc<dyn Store>, config: ModelConfig) -> Self {
        tracing::debug!(store = store.name(), "model created");
        Self { store, config }
    }

    /// A model over a fresh, schemaless in-memory store.
    pub fn in_memory(name: impl Into<String>) -> Self {
        let config = ModelConfig {
            store_name: name.into(),
            ..ModelConfig::default()
        };
        let store = Arc::new(MemoryStore::new(config.store_name.clone()));
        Self::new(store, config)
    }

    /// A model over an in-memory store built from `config`.
    pub fn from_config(config: ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = match &config.entities {
            Some(entities) => MemoryStore::with_schema(config.store_name.clone(), entities.clone()),
            None => MemoryStore::new(config.store_name.clone()),
        };
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Create an empty record of type `V` and return its identifier.
    pub fn instantiate<V: StoreBacked>(&self) -> Identifier<V> {
        let identifier = Identifier::generate();
        let mut transaction = Transaction::new();
        transaction.insert(V::empty_record(identifier));
        self.submit("instantiate", transaction);
        identifier
    }

    /// A signal carrying the current value of the record `identifier`.
    ///
    /// Pushes `Err(FetchError::Deleted)` if the record goes away.
    pub fn value_for<V: StoreBacked>(
        &self,
        identifier: Identifier<V>,
    ) -> Signal<Result<V, FetchError>> {
        item_fetch_signal(
            Arc::clone(&self.store),
            Query::all(V::ENTITY).filter(identifier.predicate()),
            self.config.failure_policy,
            V::from_raw,
        )
    }

    /// A signal carrying every record of type `V`, in storage order.
    pub fn values_for<V: StoreBacked>(&self) -> Signal<Vec<V>> {
        array_fetch_signal(
            Arc::clone(&self.store),
            Query::all(V::ENTITY),
            self.config.failure_policy,
            V::from_raw,
        )
    }

    /// [`instantiate`](Self::instantiate) followed by [`value_for`](Self::value_for).
    pub fn value_for_new_instance<V: StoreBacked>(&self) -> Signal<Result<V, FetchError>> {
        let identifier = self.instantiate::<V>();
        self.value_for(identifier)
    }

    /// Overwrite the stored record for `value` with its fields.
    ///
    /// # Panics
    ///
    /// Under the default failure policy, panics if no such record exists.
    pub fn update<V: StoreBacked>(&self, value: &V) {
        let mut transaction = Transaction::new();
        Self::write_update(&mut transaction, value);
        self.submit("update", transaction);
    }

    /// Remove the stored record for `value`.
    pub fn delete<V: StoreBacked>(&self, value: &V) {
        let mut transaction = Transaction::new();
        transaction.delete(V::ENTITY, value.identifier().raw());
        self.submit("delete", transaction);
    }

    /// Open a session for batching updates into one commit.
    pub fn begin_session(&self) -> UpdateSession {
        UpdateSession::begin()
    }

    /// Queue an update in `session`. Nothing is written until the session ends.
    ///
    /// # Panics
    ///
    /// Panics if `session` has already ended.
    pub fn update_in<V: StoreBacked>(&self, value: &V, session: &UpdateSession) {
        session.record(|transaction| Self::write_update(transaction, value));
    }

    /// Commit everything queued in `session` as one transaction.
    ///
    /// # Panics
    ///
    /// Panics if `session` has already ended.
    pub fn end_session(&self, session: &UpdateSession) {
        let transaction = session.finish();
        self.submit("end session", transaction);
    }

    /// Block until the store queue, and every fetch it triggered, is idle.
    pub fn settle(&self) {
        self.store.queue().wait_until_idle();
    }

    fn write_update<V: StoreBacked>(transaction: &mut Transaction, value: &V) {
        let value = value.clone();
        transaction.update(V::ENTITY, value.identifier().raw(), move |record| {
            value.write_fields(record);
        });
    }

    /// Commit `transaction` on the store queue, applying the failure policy.
    fn submit(&self, action: &'static str, transaction: Transaction) {
        let writes = transaction.len();
        let store = Arc::clone(&self.store);
        let result = self
            .store
            .queue()
            .perform_and_wait(move || store.commit(transaction));
        match result {
            Ok(Some(changes)) => {
                tracing::debug!(action, writes, revision = changes.revision, "committed");
            }
            Ok(None) => tracing::trace!(action, "nothing to commit"),
            Err(error) => self.config.failure_policy.handle(action, &error),
        }
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FailurePolicy;
    use crate::model::{Review, Role};

    #[test]
    fn instantiated_value_is_readable() {
        let model = Model::in_memory("test-facade-instantiate");
        let role = model.value_for_new_instance::<Role>();
        model.settle();

        let role = role.current_value().unwrap().unwrap();
        assert_eq!(role.short_name, "");
    }

    #[test]
    fn update_overwrites_fields() {
        let model = Model::in_memory("test-facade-update");
        let id = model.instantiate::<Role>();
        let signal = model.value_for(id);
        model.settle();

        let mut role = signal.current_value().unwrap().unwrap();
        role.explanation = "Family first".into();
        role.is_active = true;
        model.update(&role);
        model.settle();

        assert_eq!(signal.current_value(), Some(Ok(role)));
    }

    #[test]
    fn delete_reports_deleted() {
        let model = Model::in_memory("test-facade-delete");
        let signal = model.value_for_new_instance::<Review>();
        model.settle();

        let review = signal.current_value().unwrap().unwrap();
        model.delete(&review);
        model.settle();
        assert_eq!(signal.current_value(), Some(Err(FetchError::Deleted)));
    }

    #[test]
    #[should_panic(expected = "store update failed")]
    fn updating_a_missing_record_is_fatal() {
        let model = Model::in_memory("test-facade-missing");
        let ghost = Role::from_raw(&Role::empty_record(Identifier::from_raw(1))).unwrap();
        model.update(&ghost);
    }

    #[test]
    fn log_policy_tolerates_a_missing_record() {
        let config = ModelConfig {
            store_name: "test-facade-log".into(),
            failure_policy: FailurePolicy::Log,
            ..ModelConfig::default()
        };
        let model = Model::from_config(config).unwrap();
        let ghost = Role::from_raw(&Role::empty_record(Identifier::from_raw(1))).unwrap();
        model.update(&ghost);
        assert_eq!(model.store().revision(), 0);
    }

    #[test]
    fn schema_from_config_is_enforced() {
        let config = ModelConfig {
            store_name: "test-facade-schema".into(),
            entities: Some(vec!["Role".into()]),
            failure_policy: FailurePolicy::Log,
        };
        let model = Model::from_config(config).unwrap();
        model.instantiate::<Review>();
        model.instantiate::<Role>();
        assert_eq!(model.store().revision(), 1);
    }

    #[test]
    fn empty_session_commits_nothing() {
        let model = Model::in_memory("test-facade-empty-session");
        let session = model.begin_session();
        model.end_session(&session);
        assert_eq!(model.store().revision(), 0);
    }

    #[test]
    #[should_panic(expected = "has already ended")]
    fn updating_through_an_ended_session_panics() {
        let model = Model::in_memory("test-facade-ended");
        let id = model.instantiate::<Role>();
        let role = Role::from_raw(&Role::empty_record(id)).unwrap();
        let session = model.begin_session();
        model.end_session(&session);
        model.update_in(&role, &session);
    }
}
