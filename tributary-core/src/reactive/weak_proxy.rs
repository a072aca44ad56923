//! Weak Subscription Proxy
//!
//! Every signal lazily owns exactly one [`WeakProxy`]. The proxy subscribes
//! to its signal once, caches the latest value, and fans values out to
//! observers that it references only weakly. The client owns each
//! subscription through a [`WeakHandle`]; dropping the handle ends it.
//!
//! This is how a long-lived signal can be observed without keeping the
//! observer, and everything the observer captures, alive forever.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::signal::Signal;
use super::subscriber::Observer;
use crate::schedule::ExecutionContext;

/// The wrapped observer behind a [`WeakHandle`].
struct HandleInner<T> {
    observer: Observer<T>,
    proxy: Weak<WeakProxy<T>>,
}

impl<T> Drop for HandleInner<T> {
    fn drop(&mut self) {
        if let Some(proxy) = self.proxy.upgrade() {
            proxy.prune();
        }
    }
}

/// An opaque token keeping one weak subscription alive.
///
/// Dropping the handle unsubscribes. Cleanup is lazy: the dead entry is
/// removed when the handle is destroyed, and in any case before the next
/// delivery pass starts.
#[must_use = "dropping a WeakHandle ends the subscription immediately"]
pub struct WeakHandle {
    _inner: Arc<dyn Any + Send + Sync>,
}

impl fmt::Debug for WeakHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle").finish_non_exhaustive()
    }
}

/// Companion of a [`Signal`] that supports unsubscribing.
///
/// Obtained through [`Signal::weak_proxy`].
pub struct WeakProxy<T> {
    current: RwLock<Option<T>>,
    entries: Mutex<Vec<Weak<HandleInner<T>>>>,
    /// Where entries are added, for a proxy of a redirect signal.
    context: Option<Arc<dyn ExecutionContext>>,
}

impl<T> WeakProxy<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create the proxy for `signal` and subscribe it.
    ///
    /// The signal's observer list owns the proxy; the proxy holds nothing
    /// of the signal.
    pub(crate) fn attach(signal: &Signal<T>) -> Arc<Self> {
        let proxy = Arc::new(Self {
            current: RwLock::new(None),
            entries: Mutex::new(Vec::new()),
            context: signal.redirect_target(),
        });
        let target = Arc::clone(&proxy);
        signal.add_observer(Observer::new(move |value: &T| target.deliver(value)));
        proxy
    }

    /// The latest value seen by the proxy.
    pub fn current_value(&self) -> Option<T> {
        self.current.read().clone()
    }

    /// Number of subscriptions whose handles are still alive.
    pub fn live_handle_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    /// Subscribe `observer` for as long as the returned handle lives.
    ///
    /// The cached value, if any, is replayed before this returns, unless the
    /// proxy belongs to a redirect signal and the caller is not on its
    /// context; then the subscription and replay are queued there. The entry
    /// is added and the cache read under the lock `deliver` caches under, so
    /// a concurrent push reaches the new observer once, either way.
    pub fn subscribe_weak<F>(self: &Arc<Self>, observer: F) -> WeakHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let inner = Arc::new(HandleInner {
            observer: Observer::new(observer),
            proxy: Arc::downgrade(self),
        });
        tracing::trace!(subscriber = ?inner.observer.id(), "subscribe weak");
        match &self.context {
            Some(context) if !context.is_current() => {
                let proxy = Arc::clone(self);
                let pending = Arc::downgrade(&inner);
                context.execute(Box::new(move || {
                    if let Some(inner) = pending.upgrade() {
                        proxy.register(&inner);
                    }
                }));
            }
            _ => self.register(&inner),
        }
        WeakHandle { _inner: inner }
    }

    fn register(&self, inner: &Arc<HandleInner<T>>) {
        let replay = {
            let mut entries = self.entries.lock();
            entries.push(Arc::downgrade(inner));
            self.current.read().clone()
        };
        if let Some(value) = replay {
            inner.observer.notify(&value);
        }
    }

    /// Calls `transform` for every value while the handle lives, pushing the
    /// results on the returned signal.
    pub fn map<U, F>(self: &Arc<Self>, transform: F) -> (WeakHandle, Signal<U>)
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let output = Signal::derived(None);
        let target = output.clone();
        let handle = self.subscribe_weak(move |value| target.push(transform(value)));
        (handle, output)
    }

    /// Like [`map`](Self::map), but pushes only the present results.
    pub fn flatmap<U, F>(self: &Arc<Self>, transform: F) -> (WeakHandle, Signal<U>)
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        let output = Signal::derived(None);
        let target = output.clone();
        let handle = self.subscribe_weak(move |value| {
            if let Some(mapped) = transform(value) {
                target.push(mapped);
            }
        });
        (handle, output)
    }

    fn deliver(&self, value: &T) {
        let live: Vec<Arc<HandleInner<T>>> = {
            let mut entries = self.entries.lock();
            *self.current.write() = Some(value.clone());
            entries.retain(|entry| entry.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };
        for handle in &live {
            handle.observer.notify(value);
        }
    }
}

impl<T> WeakProxy<T> {
    /// Forget entries whose handles are gone.
    fn prune(&self) {
        self.entries.lock().retain(|entry| entry.strong_count() > 0);
    }
}

impl<T> fmt::Debug for WeakProxy<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakProxy")
            .field("value", &self.current_value())
            .field("live_handles", &self.live_handle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::UpdatableSignal;

    #[test]
    fn proxy_is_created_once_per_signal() {
        let signal = UpdatableSignal::<i32>::new();
        let first = signal.weak_proxy();
        let second = signal.weak_proxy();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(signal.observer_count(), 1);
    }

    #[test]
    fn dropped_handle_stops_notifications() {
        let signal = UpdatableSignal::new();
        let strong = Arc::new(Mutex::new(Vec::new()));
        let weak = Arc::new(Mutex::new(Vec::new()));

        let strong_sink = strong.clone();
        signal.subscribe(move |n: &i32| strong_sink.lock().push(*n));
        {
            let weak_sink = weak.clone();
            let _handle = signal.subscribe_weak(move |n: &i32| weak_sink.lock().push(*n));

            signal.push(0);
            signal.push(1);
            signal.push(2);
        }

        signal.push(3);
        signal.push(4);

        assert_eq!(*strong.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(*weak.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn handle_drop_prunes_entry() {
        let signal = UpdatableSignal::<i32>::new();
        let proxy = signal.weak_proxy();

        let handle = proxy.subscribe_weak(|_| {});
        assert_eq!(proxy.live_handle_count(), 1);
        assert_eq!(proxy.entries.lock().len(), 1);

        drop(handle);
        assert_eq!(proxy.live_handle_count(), 0);
        assert!(proxy.entries.lock().is_empty());
    }

    #[test]
    fn subscribe_weak_replays_cached_value() {
        let signal = UpdatableSignal::with_value("ready".to_string());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _handle = signal.subscribe_weak(move |s: &String| sink.lock().push(s.clone()));

        assert_eq!(*seen.lock(), vec!["ready".to_string()]);
    }

    #[test]
    fn proxy_does_not_keep_observer_captures_alive() {
        let signal = UpdatableSignal::<i32>::new();
        let captured = Arc::new(());

        let held = captured.clone();
        let handle = signal.subscribe_weak(move |_| {
            let _ = &held;
        });
        assert_eq!(Arc::strong_count(&captured), 2);

        drop(handle);
        assert_eq!(Arc::strong_count(&captured), 1);
    }

    #[test]
    fn proxy_map_lives_as_long_as_its_handle() {
        let signal = UpdatableSignal::new();
        let (handle, doubled) = signal.weak_proxy().map(|n: &i32| n * 2);

        signal.push(2);
        assert_eq!(doubled.current_value(), Some(4));

        drop(handle);
        signal.push(5);
        assert_eq!(doubled.current_value(), Some(4));
    }

    #[test]
    fn proxy_flatmap_skips_absent_results() {
        let signal = UpdatableSignal::new();
        let (_handle, evens) = signal
            .weak_proxy()
            .flatmap(|n: &i32| (n % 2 == 0).then_some(*n));

        signal.push(2);
        signal.push(3);
        assert_eq!(evens.current_value(), Some(2));
    }

    #[test]
    fn handle_dropped_during_delivery_is_safe() {
        let signal = UpdatableSignal::new();
        let slot: Arc<Mutex<Option<WeakHandle>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(Mutex::new(0));

        let inner_slot = slot.clone();
        let inner_calls = calls.clone();
        let handle = signal.subscribe_weak(move |_: &i32| {
            *inner_calls.lock() += 1;
            // Unsubscribe from inside the callback.
            let taken = inner_slot.lock().take();
            drop(taken);
        });
        *slot.lock() = Some(handle);

        signal.push(1);
        signal.push(2);
        assert_eq!(*calls.lock(), 1);
    }
}
