//! Error types.
//!
//! Only recoverable conditions are represented here. Broken caller
//! invariants, such as writing through an ended session, panic instead.

use thiserror::Error;

/// Failures raised by a [`Store`](crate::store::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no {entity} record with identifier {id:016x}")]
    MissingRecord { entity: String, id: u64 },

    #[error("a {entity} record with identifier {id:016x} already exists")]
    DuplicateRecord { entity: String, id: u64 },

    #[error("entity `{0}` is not part of the store schema")]
    UnknownEntity(String),

    #[error("failed to encode store snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode store snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Domain-level outcomes reported in-band by single-result fetch signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The record matched earlier and no longer does.
    #[error("record was deleted")]
    Deleted,
}

/// Failures loading a [`ModelConfig`](crate::config::ModelConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid model configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("store name must not be empty")]
    EmptyStoreName,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_record_message_shows_hex_identifier() {
        let error = StoreError::MissingRecord {
            entity: "Role".into(),
            id: 0xbeef,
        };
        assert_eq!(
            error.to_string(),
            "no Role record with identifier 000000000000beef"
        );
    }

    #[test]
    fn json_errors_convert_into_config_errors() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: ConfigError = parse.into();
        assert!(matches!(error, ConfigError::Parse(_)));
    }
}
