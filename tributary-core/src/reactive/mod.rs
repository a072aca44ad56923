//! Reactive Primitives
//!
//! This module implements the push-based signal engine: signals, weak
//! subscriptions, and the combinators derived from them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A [`Signal`] is a node that caches its most recent value and notifies its
//! observers with every new one. Client code pushes through an
//! [`UpdatableSignal`]; every other signal is derived from one.
//!
//! ## Weak Subscriptions
//!
//! Plain subscriptions live as long as the signal does. A [`WeakProxy`]
//! lets a client subscribe without the signal owning the subscriber: the
//! subscription ends when the client drops its [`WeakHandle`].
//!
//! ## Combinators
//!
//! - `map` / `flatmap` transform values, the latter dropping absent results.
//! - `deliver_on` hops delivery onto an execution context.
//! - `one_shot` delivers a single value and then goes quiet.
//! - `delayed` re-emits each value after a fixed interval.
//! - `zip`, `zip3` and [`zip_all`] combine the latest values of several signals.
//!
//! # Implementation Notes
//!
//! Derivation edges own their targets, so a chain built with `map` lives as
//! long as its root. Combinators that need their sources kept alive hold
//! them on the derived side and subscribe through the weak proxy, which
//! keeps the ownership graph acyclic.

mod delayed;
mod one_shot;
mod redirect;
mod result;
mod signal;
mod subscriber;
mod weak_proxy;
mod zip;

pub use one_shot::OneShotSignal;
pub use result::ResultSignalExt;
pub use signal::{Signal, SignalId, UpdatableSignal};
pub use subscriber::{Observer, SubscriberId};
pub use weak_proxy::{WeakHandle, WeakProxy};
pub use zip::zip_all;

pub(crate) use signal::WeakSignal;
