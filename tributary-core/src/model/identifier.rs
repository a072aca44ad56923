//! Typed record identifiers.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::store::Predicate;

/// Names one logical record of type `T`, independent of where it is stored.
///
/// Identifiers are 64 random bits. They compare by value, serialize as a
/// plain integer and display as sixteen hex digits.
pub struct Identifier<T> {
    raw: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Identifier<T> {
    /// A fresh random identifier.
    pub fn generate() -> Self {
        Self::from_raw(rand::random())
    }

    pub fn from_raw(raw: u64) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }

    /// A predicate matching exactly the record with this identifier.
    pub fn predicate(&self) -> Predicate {
        Predicate::Identifier(self.raw)
    }
}

impl<T> Clone for Identifier<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Identifier<T> {}

impl<T> PartialEq for Identifier<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Identifier<T> {}

impl<T> Hash for Identifier<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Identifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({:016x})", self.raw)
    }
}

impl<T> fmt::Display for Identifier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.raw)
    }
}

impl<T> Serialize for Identifier<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.raw)
    }
}

impl<'de, T> Deserialize<'de> for Identifier<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u64::deserialize(deserializer).map(Self::from_raw)
    }
}
