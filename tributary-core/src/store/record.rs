//! Raw store records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One stored row: an entity name, its identifier, and untyped fields.
///
/// This is the only shape a [`Store`](super::Store) knows about. Typed
/// domain values are built from it by a
/// [`StoreBacked`](crate::model::StoreBacked) implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub entity: String,
    pub id: u64,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl RawRecord {
    /// A record with no fields set.
    pub fn new(entity: impl Into<String>, id: u64) -> Self {
        Self {
            entity: entity.into(),
            id,
            fields: Map::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Builder-style [`set_field`](Self::set_field).
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }
}
