//! Helpers for signals that carry a `Result`.
//!
//! Fetch bridges report failures in-band as `Err` values. These adapters let
//! observers split the two paths without matching on every value.

use super::signal::Signal;

/// Combinators over `Signal<Result<T, E>>`.
pub trait ResultSignalExt<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Only the successful values.
    fn ok_values(&self) -> Signal<T>;

    /// Only the errors.
    fn errors(&self) -> Signal<E>;

    /// Transform successful values, passing errors through untouched.
    fn map_ok<U, F>(&self, transform: F) -> Signal<Result<U, E>>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static;

    /// Observe successful values, forwarding everything unchanged.
    fn inspect_ok<F>(&self, inspect: F) -> Signal<Result<T, E>>
    where
        F: Fn(&T) + Send + Sync + 'static;

    /// Observe errors, forwarding everything unchanged.
    fn inspect_err<F>(&self, inspect: F) -> Signal<Result<T, E>>
    where
        F: Fn(&E) + Send + Sync + 'static;
}

impl<T, E> ResultSignalExt<T, E> for Signal<Result<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn ok_values(&self) -> Signal<T> {
        self.flatmap(|result| result.as_ref().ok().cloned())
    }

    fn errors(&self) -> Signal<E> {
        self.flatmap(|result| result.as_ref().err().cloned())
    }

    fn map_ok<U, F>(&self, transform: F) -> Signal<Result<U, E>>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.map(move |result| match result {
            Ok(value) => Ok(transform(value)),
            Err(error) => Err(error.clone()),
        })
    }

    fn inspect_ok<F>(&self, inspect: F) -> Signal<Result<T, E>>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.map(move |result| {
            if let Ok(value) = result {
                inspect(value);
            }
            result.clone()
        })
    }

    fn inspect_err<F>(&self, inspect: F) -> Signal<Result<T, E>>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.map(move |result| {
            if let Err(error) = result {
                inspect(error);
            }
            result.clone()
        })
    }
}
