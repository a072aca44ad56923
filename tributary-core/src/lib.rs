//! Tributary Core
//!
//! This crate provides a push-based reactive engine and the plumbing that
//! connects it to a queryable store. It implements:
//!
//! - Signals with replay-on-subscribe, derived with `map` and `flatmap`
//! - Weak subscriptions whose lifetime the subscriber controls
//! - Combinators for queue redirection, one-shot, delayed and zipped delivery
//! - Fetch signals that keep a query's results current as the store changes
//! - A model facade that batches writes into single commits
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Signals, weak proxies and combinators
//! - `schedule`: Execution contexts, serial queues and the delay timer
//! - `store`: The store contract and an in-memory implementation
//! - `persistence`: Fetch signals bridging store changes into signals
//! - `model`: Domain records and the transactional update facade
//!
//! # Example
//!
//! ```rust
//! use tributary_core::reactive::UpdatableSignal;
//!
//! // Create a root signal
//! let count = UpdatableSignal::new();
//!
//! // Create a derived signal
//! let doubled = count.map(|n: &i32| n * 2);
//!
//! // Observe it
//! doubled.subscribe(|n| println!("Doubled: {n}"));
//!
//! // Push a value; the observer runs before push returns
//! count.push(5);
//! assert_eq!(doubled.current_value(), Some(10));
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod reactive;
pub mod schedule;
pub mod store;

pub use config::{FailurePolicy, ModelConfig};
pub use error::{ConfigError, FetchError, StoreError};
pub use model::{Identifier, Model, UpdateSession};
pub use reactive::{Signal, UpdatableSignal, WeakHandle};
