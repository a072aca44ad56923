//! Model configuration.
//!
//! A [`ModelConfig`] is plain data: it can be built in code, defaulted, or
//! read from JSON.
//!
//! ```rust
//! use tributary_core::config::{FailurePolicy, ModelConfig};
//!
//! let config = ModelConfig::from_json(r#"{ "store_name": "goals", "failure_policy": "log" }"#)
//!     .unwrap();
//! assert_eq!(config.store_name, "goals");
//! assert_eq!(config.failure_policy, FailurePolicy::Log);
//! assert!(config.entities.is_none());
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StoreError};

/// What to do when a store read or write fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and stop. Suits a local store where failures mean
    /// the process state is already broken.
    ///
    /// Failures seen by a caller panic on the caller's thread. Failures with
    /// no caller to unwind into, such as a background fetch on the store
    /// queue, abort the process.
    #[default]
    Fatal,
    /// Log the failure and carry on without the result.
    Log,
}

impl FailurePolicy {
    /// Apply the policy to a failed store `action`.
    ///
    /// Returns only under [`FailurePolicy::Log`].
    pub fn handle(self, action: &str, error: &StoreError) {
        tracing::error!(%error, action, "store operation failed");
        if self == FailurePolicy::Fatal {
            panic!("store {action} failed: {error}");
        }
    }

    /// Apply the policy to a failed store `action` that ran on a worker
    /// thread nobody is waiting on.
    ///
    /// Under [`FailurePolicy::Fatal`] this aborts the process.
    pub fn handle_detached(self, action: &str, error: &StoreError) {
        tracing::error!(%error, action, "store operation failed");
        if self == FailurePolicy::Fatal {
            eprintln!("store {action} failed: {error}");
            std::process::abort();
        }
    }
}

/// Settings for a [`Model`](crate::model::Model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Name given to the store and its serial queue.
    pub store_name: String,
    /// Entity names the store accepts. `None` accepts any entity.
    pub entities: Option<Vec<String>>,
    pub failure_policy: FailurePolicy,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            store_name: "tributary".to_string(),
            entities: None,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ModelConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ModelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_name.trim().is_empty() {
            return Err(ConfigError::EmptyStoreName);
        }
        Ok(())
    }
}
