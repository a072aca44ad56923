//! Observer types for the signal graph.
//!
//! An observer is a callback registered on a signal. Signals keep observers
//! in subscription order and invoke them with every pushed value.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscriber.
///
/// Each observer gets a unique ID when created. The ID shows up in trace
/// output and lets the graph tell observers apart without comparing closures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A callback subscribed to a signal producing values of type `T`.
///
/// Cloning an observer shares the callback, which lets a signal snapshot its
/// observer list and release its lock before invoking anyone.
pub struct Observer<T> {
    id: SubscriberId,
    callback: Arc<dyn Fn(&T) + Send + Sync>,
}

impl<T> Observer<T> {
    /// Create a new observer with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            callback: Arc::new(callback),
        }
    }

    /// Get the observer's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Hand a value to the observer.
    pub fn notify(&self, value: &T) {
        (self.callback)(value);
    }
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn observer_notify_passes_value() {
        let total = Arc::new(AtomicI32::new(0));
        let total_clone = total.clone();

        let observer = Observer::new(move |value: &i32| {
            total_clone.fetch_add(*value, Ordering::SeqCst);
        });

        observer.notify(&3);
        observer.clone().notify(&4);
        assert_eq!(total.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn clones_share_identity() {
        let observer = Observer::new(|_: &()| {});
        assert_eq!(observer.id(), observer.clone().id());
    }
}
