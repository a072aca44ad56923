//! Capability traits for values kept in a store.
//!
//! A [`StoreBacked`] type is a snapshot of one store record. Conversions go
//! through serde: the record's fields, plus its identifier under
//! [`IDENTIFIER_FIELD`], deserialize into the value, and the value serializes
//! back into fields. Unknown fields on the record are left alone.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::identifier::Identifier;
use crate::store::RawRecord;

/// Field name the identifier is exposed under during conversion.
pub const IDENTIFIER_FIELD: &str = "identifier";

/// A value that knows which record it is.
pub trait Identifiable: Sized {
    fn identifier(&self) -> Identifier<Self>;
}

/// A value that can be read from and written to a raw store record.
pub trait StoreBacked:
    Identifiable + Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    /// Entity name of the records holding values of this type.
    const ENTITY: &'static str;

    /// Build a value from `record`, or `None` if it is not one of ours.
    fn from_raw(record: &RawRecord) -> Option<Self> {
        if record.entity != Self::ENTITY {
            return None;
        }
        let mut fields = record.fields.clone();
        fields.insert(IDENTIFIER_FIELD.to_string(), Value::from(record.id));
        match serde_json::from_value(Value::Object(fields)) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(entity = Self::ENTITY, id = record.id, %error, "undecodable record");
                None
            }
        }
    }

    /// Copy this value's fields into `record`.
    fn write_fields(&self, record: &mut RawRecord) {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut fields)) => {
                fields.remove(IDENTIFIER_FIELD);
                record.fields.extend(fields);
            }
            Ok(other) => {
                tracing::warn!(entity = Self::ENTITY, kind = ?other, "value did not serialize to fields");
            }
            Err(error) => {
                tracing::warn!(entity = Self::ENTITY, %error, "value failed to serialize");
            }
        }
    }

    /// A new, empty record for `identifier`.
    fn empty_record(identifier: Identifier<Self>) -> RawRecord {
        RawRecord::new(Self::ENTITY, identifier.raw())
    }
}
