//! Query specifications.
//!
//! A [`Query`] names one entity and optionally filters it with a
//! [`Predicate`]. The same predicate is used both to run the query and to
//! decide cheaply whether a change could affect its results.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::record::RawRecord;

/// A filter over raw records of one entity.
#[derive(Clone)]
pub enum Predicate {
    /// Matches the record with this identifier.
    Identifier(u64),
    /// Matches records whose field equals the value. A missing field never matches.
    FieldEquals(String, Value),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Arbitrary test over the record.
    Custom(Arc<dyn Fn(&RawRecord) -> bool + Send + Sync>),
}

impl Predicate {
    pub fn field_equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::FieldEquals(name.into(), value.into())
    }

    pub fn custom<F>(test: F) -> Self
    where
        F: Fn(&RawRecord) -> bool + Send + Sync + 'static,
    {
        Predicate::Custom(Arc::new(test))
    }

    pub fn matches(&self, record: &RawRecord) -> bool {
        match self {
            Predicate::Identifier(id) => record.id == *id,
            Predicate::FieldEquals(name, value) => record.field(name) == Some(value),
            Predicate::And(all) => all.iter().all(|p| p.matches(record)),
            Predicate::Or(any) => any.iter().any(|p| p.matches(record)),
            Predicate::Not(inner) => !inner.matches(record),
            Predicate::Custom(test) => test(record),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Identifier(id) => write!(f, "Identifier({id:016x})"),
            Predicate::FieldEquals(name, value) => write!(f, "{name} == {value}"),
            Predicate::And(all) => f.debug_tuple("And").field(all).finish(),
            Predicate::Or(any) => f.debug_tuple("Or").field(any).finish(),
            Predicate::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Predicate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// An entity name plus an optional filter.
#[derive(Debug, Clone)]
pub struct Query {
    pub entity: String,
    pub predicate: Option<Predicate>,
}

impl Query {
    /// Every record of `entity`.
    pub fn all(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: None,
        }
    }

    /// The single record of `entity` with identifier `id`.
    pub fn for_identifier(entity: impl Into<String>, id: u64) -> Self {
        Self::all(entity).filter(Predicate::Identifier(id))
    }

    /// Restrict the query further. Successive filters are combined with `And`.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(match self.predicate.take() {
            None => predicate,
            Some(Predicate::And(mut all)) => {
                all.push(predicate);
                Predicate::And(all)
            }
            Some(existing) => Predicate::And(vec![existing, predicate]),
        });
        self
    }

    /// Whether `record` belongs to this query's result set.
    pub fn matches(&self, record: &RawRecord) -> bool {
        record.entity == self.entity
            && self
                .predicate
                .as_ref()
                .map_or(true, |predicate| predicate.matches(record))
    }
}
