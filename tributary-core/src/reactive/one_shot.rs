//! One-Shot Signals
//!
//! A one-shot signal delivers the first value it receives to every observer
//! registered at that point, exactly once, then forgets them. Later source
//! pushes are ignored. Observers arriving after the value are replayed
//! immediately and not stored, since there is no future to deliver.

use std::fmt;
use std::ops::Deref;

use super::signal::{Delivery, Signal};

/// A signal that notifies its observers exactly once.
///
/// Holds its source until the first value arrives, so clients need only
/// keep the one-shot itself. After that it lets go of the source.
pub struct OneShotSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> OneShotSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Whether a value has already been captured.
    pub fn is_primed(&self) -> bool {
        self.signal.current_value().is_some()
    }

    /// The plain signal view of this one-shot.
    pub fn signal(&self) -> Signal<T> {
        self.signal.clone()
    }
}

impl<T> Deref for OneShotSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Target = Signal<T>;

    fn deref(&self) -> &Signal<T> {
        &self.signal
    }
}

impl<T> Clone for OneShotSignal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

impl<T> fmt::Debug for OneShotSignal<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotSignal")
            .field("primed", &self.is_primed())
            .field("signal", &self.signal)
            .finish()
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A signal that delivers only the first value this one produces.
    ///
    /// If this signal already holds a value, the one-shot is primed with it
    /// right away.
    pub fn one_shot(&self) -> OneShotSignal<T> {
        let output = Signal::with_delivery(Delivery::OneShot, self.notification_context());
        let target = output.downgrade();
        let handle = self.subscribe_weak(move |value: &T| {
            if let Some(target) = target.upgrade() {
                target.push(value.clone());
            }
        });

        // Primed by the replay: the source has nothing more to offer.
        if output.current_value().is_none() {
            output.retain(self.clone());
            output.retain(handle);
        }
        OneShotSignal { signal: output }
    }
}
