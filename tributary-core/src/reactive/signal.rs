//! Signal Implementation
//!
//! A Signal is the fundamental push-based node. It caches the most recent
//! value and invokes its observers, in subscription order, with every value
//! pushed on it.
//!
//! # How Signals Work
//!
//! 1. A root [`UpdatableSignal`] accepts values from client code.
//!
//! 2. `map` and `flatmap` create derived signals. The source keeps the
//!    derivation closure, and the closure keeps the derived signal, so a
//!    derivation chain lives exactly as long as its source does.
//!
//! 3. Every observer is invoked with the cached value as soon as it
//!    subscribes, and once per push after that.
//!
//! # Ownership
//!
//! Derivation edges (source to derived) are owning. Edges that exist only to
//! observe, such as those created through a [`WeakProxy`], are non-owning: the
//! proxy holds weak references and the client holds the
//! [`WeakHandle`](super::WeakHandle). Combinators that must keep their
//! sources alive hang them on the derived signal's retained list, which
//! never points back toward a source's observers.
//!
//! # Thread Safety
//!
//! Signals are `Send + Sync`, and pushes may come from any thread, but pushes
//! on any one signal must be serialized by the caller. Caching a pushed value
//! and snapshotting the observers happen in one critical section, the same
//! one in which a new observer reads its replay value, so a subscriber racing
//! a push sees the value exactly once. No lock is held while observers run,
//! so observers may freely subscribe, read, or push again.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};

use super::subscriber::Observer;
use super::weak_proxy::{WeakHandle, WeakProxy};
use crate::schedule::{ContextId, ExecutionContext};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a signal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    fn next() -> Self {
        Self(SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// How a signal hands pushed values to its observers.
pub(crate) enum Delivery<T> {
    /// Invoke every observer on the pushing thread.
    Immediate,
    /// Deliver the first value once, then forget all observers.
    OneShot,
    /// Deliver on another execution context.
    ///
    /// Observers are registered and notified only on `target`, and replay
    /// `delivered`, the last value handed out there.
    Redirect {
        target: Arc<dyn ExecutionContext>,
        delivered: Mutex<Option<T>>,
    },
}

impl<T> Delivery<T> {
    pub(crate) fn redirect(target: Arc<dyn ExecutionContext>) -> Self {
        Delivery::Redirect {
            target,
            delivered: Mutex::new(None),
        }
    }
}

struct SignalInner<T> {
    id: SignalId,
    current: RwLock<Option<T>>,
    observers: Mutex<Vec<Observer<T>>>,
    delivery: Delivery<T>,
    /// Context on which this signal notifies, when known.
    context: Option<ContextId>,
    proxy: OnceLock<Arc<WeakProxy<T>>>,
    /// Sources and subscription handles this node keeps alive.
    retained: Mutex<Vec<Box<dyn Any + Send + Sync>>>,
}

/// A push-based node producing values of type `T`.
///
/// `Signal` is a cheap, cloneable handle; clones share the same node. Only
/// the crate's own derivation logic can push on a plain `Signal`; client code
/// pushes through an [`UpdatableSignal`].
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use tributary_core::reactive::UpdatableSignal;
///
/// let input = UpdatableSignal::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let sink = seen.clone();
/// input
///     .flatmap(|text: &String| text.parse::<i32>().ok())
///     .subscribe(move |n| sink.lock().unwrap().push(*n));
///
/// input.push("1".to_string());
/// input.push("dog".to_string());
/// input.push("3".to_string());
/// assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

/// A non-owning reference to a signal node.
pub(crate) struct WeakSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Weak<SignalInner<T>>,
}

impl<T> WeakSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn upgrade(&self) -> Option<Signal<T>> {
        self.inner.upgrade().map(|inner| Signal { inner })
    }
}

impl<T> Clone for WeakSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn with_delivery(delivery: Delivery<T>, context: Option<ContextId>) -> Self {
        let context = match &delivery {
            Delivery::Redirect { target, .. } => Some(target.id()),
            _ => context,
        };
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::next(),
                current: RwLock::new(None),
                observers: Mutex::new(Vec::new()),
                delivery,
                context,
                proxy: OnceLock::new(),
                retained: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A derived node notifying on `context`.
    pub(crate) fn derived(context: Option<ContextId>) -> Self {
        Self::with_delivery(Delivery::Immediate, context)
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// The most recently pushed value, if any.
    pub fn current_value(&self) -> Option<T> {
        self.inner.current.read().clone()
    }

    /// The execution context this signal notifies on, if it is tied to one.
    pub fn notification_context(&self) -> Option<ContextId> {
        self.inner.context
    }

    /// Number of directly registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    /// The context a redirect signal delivers on.
    pub(crate) fn redirect_target(&self) -> Option<Arc<dyn ExecutionContext>> {
        match &self.inner.delivery {
            Delivery::Redirect { target, .. } => Some(Arc::clone(target)),
            _ => None,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakSignal<T> {
        WeakSignal {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Push a new value: cache it, then notify observers in subscription order.
    ///
    /// Panics raised by observers are not caught; they unwind into the caller.
    pub(crate) fn push(&self, value: T) {
        tracing::trace!(signal = self.inner.id.0, "push");
        match &self.inner.delivery {
            Delivery::Immediate => {
                let observers = {
                    let observers = self.inner.observers.lock();
                    *self.inner.current.write() = Some(value.clone());
                    observers.clone()
                };
                for observer in &observers {
                    observer.notify(&value);
                }
            }
            Delivery::Redirect { target, .. } => {
                *self.inner.current.write() = Some(value.clone());
                let this = self.downgrade();
                target.execute(Box::new(move || {
                    if let Some(signal) = this.upgrade() {
                        signal.deliver_redirected(value);
                    }
                }));
            }
            Delivery::OneShot => {
                let observers = {
                    let mut observers = self.inner.observers.lock();
                    let mut current = self.inner.current.write();
                    if current.is_some() {
                        return;
                    }
                    *current = Some(value.clone());
                    std::mem::take(&mut *observers)
                };
                for observer in &observers {
                    observer.notify(&value);
                }
                // Nothing further will be delivered, so let go of the source.
                self.release_retained();
            }
        }
    }

    /// Notify observers of a redirect signal. Target context only.
    fn deliver_redirected(&self, value: T) {
        let Delivery::Redirect { delivered, .. } = &self.inner.delivery else {
            return;
        };
        let observers = {
            let observers = self.inner.observers.lock();
            *delivered.lock() = Some(value.clone());
            observers.clone()
        };
        for observer in &observers {
            observer.notify(&value);
        }
    }

    /// Register an observer, replaying the cached value to it.
    ///
    /// The replay happens before this returns, except on a redirect signal
    /// subscribed from outside its target context: there both registration
    /// and replay are queued on the target, behind any pending deliveries.
    pub(crate) fn add_observer(&self, observer: Observer<T>) {
        tracing::trace!(signal = self.inner.id.0, subscriber = ?observer.id(), "subscribe");
        if let Delivery::Redirect { target, .. } = &self.inner.delivery {
            if !target.is_current() {
                let this = self.downgrade();
                target.execute(Box::new(move || {
                    if let Some(signal) = this.upgrade() {
                        signal.register(observer);
                    }
                }));
                return;
            }
        }
        self.register(observer);
    }

    fn register(&self, observer: Observer<T>) {
        let replay = {
            let mut observers = self.inner.observers.lock();
            let current = match &self.inner.delivery {
                Delivery::Redirect { delivered, .. } => delivered.lock().clone(),
                _ => self.inner.current.read().clone(),
            };
            match self.inner.delivery {
                // A primed one-shot has no future to store the observer for.
                Delivery::OneShot if current.is_some() => {}
                _ => observers.push(observer.clone()),
            }
            current
        };
        if let Some(value) = replay {
            observer.notify(&value);
        }
    }

    /// Keep `anchor` alive for as long as this signal lives.
    pub(crate) fn retain<A>(&self, anchor: A)
    where
        A: Any + Send + Sync,
    {
        self.inner.retained.lock().push(Box::new(anchor));
    }

    pub(crate) fn release_retained(&self) {
        let released = std::mem::take(&mut *self.inner.retained.lock());
        drop(released);
    }

    /// Subscribe `observer` for the lifetime of this signal.
    ///
    /// The observer, and everything it captures, stays alive as long as the
    /// signal does. Use [`subscribe_weak`](Self::subscribe_weak) to be able
    /// to unsubscribe.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add_observer(Observer::new(observer));
    }

    /// Subscribe `observer` through this signal's weak proxy.
    ///
    /// The subscription lasts until the returned handle is dropped.
    pub fn subscribe_weak<F>(&self, observer: F) -> WeakHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.weak_proxy().subscribe_weak(observer)
    }

    /// The weak proxy for this signal, created on first use.
    pub fn weak_proxy(&self) -> Arc<WeakProxy<T>> {
        Arc::clone(self.inner.proxy.get_or_init(|| WeakProxy::attach(self)))
    }

    /// Calls `transform` for every value, pushing the result on the returned signal.
    ///
    /// The returned signal is owned by this one: it receives values for as
    /// long as this signal lives, whether or not the caller keeps it.
    pub fn map<U, F>(&self, transform: F) -> Signal<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let output = Signal::derived(self.inner.context);
        let target = output.clone();
        self.add_observer(Observer::new(move |value: &T| {
            target.push(transform(value));
        }));
        output
    }

    /// Calls `transform` for every value, pushing only the present results.
    ///
    /// Absent results produce no notification at all.
    pub fn flatmap<U, F>(&self, transform: F) -> Signal<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        let output = Signal::derived(self.inner.context);
        let target = output.clone();
        self.add_observer(Observer::new(move |value: &T| {
            if let Some(mapped) = transform(value) {
                target.push(mapped);
            }
        }));
        output
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.current_value())
            .field("observer_count", &self.observer_count())
            .finish()
    }
}

/// A root signal to which client code can push values.
///
/// Dereferences to the read-only [`Signal`] view, which is what should be
/// handed to code that only observes.
pub struct UpdatableSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> UpdatableSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a signal with no value yet.
    pub fn new() -> Self {
        Self {
            signal: Signal::derived(None),
        }
    }

    /// Create a signal already holding `value`.
    pub fn with_value(value: T) -> Self {
        let signal = Self::new();
        signal.push(value);
        signal
    }

    /// Push a new value on the signal.
    pub fn push(&self, value: T) {
        self.signal.push(value);
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(Option<&T>) -> T,
    {
        let next = f(self.signal.current_value().as_ref());
        self.push(next);
    }

    /// The read-only view of this signal.
    pub fn signal(&self) -> Signal<T> {
        self.signal.clone()
    }
}

impl<T> Default for UpdatableSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for UpdatableSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> std::ops::Deref for UpdatableSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Target = Signal<T>;

    fn deref(&self) -> &Signal<T> {
        &self.signal
    }
}

impl<T> Debug for UpdatableSignal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UpdatableSignal").field(&self.signal).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
