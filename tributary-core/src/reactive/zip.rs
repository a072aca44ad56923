//! Zip Combinators
//!
//! A zip signal combines the latest value of each of its sources into one
//! tuple and emits it whenever any source pushes. Sources that have not yet
//! produced a value appear as `None`.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::signal::{Signal, WeakSignal};

struct ZipState<S> {
    slots: S,
    /// Tuples built but not yet pushed, oldest first.
    outbox: VecDeque<S>,
    emitting: bool,
}

/// Shared state of one zip signal.
///
/// Sources may push from different threads. Each update builds its tuple
/// under the lock, and a single emitter at a time drains the tuples in the
/// order they were built, so the output never goes back in time.
struct Zipper<S>
where
    S: Clone + Send + Sync + 'static,
{
    state: Mutex<ZipState<S>>,
    target: WeakSignal<S>,
}

impl<S> Zipper<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn new(slots: S, target: &Signal<S>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ZipState {
                slots,
                outbox: VecDeque::new(),
                emitting: false,
            }),
            target: target.downgrade(),
        })
    }

    fn update(&self, write: impl FnOnce(&mut S)) {
        {
            let mut state = self.state.lock();
            write(&mut state.slots);
            let latest = state.slots.clone();
            state.outbox.push_back(latest);
            if state.emitting {
                // The active emitter, possibly further up this very stack,
                // pushes it after what it already holds.
                return;
            }
            state.emitting = true;
        }

        let _reset = EmitReset(&self.state);
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.outbox.pop_front() {
                    Some(next) => next,
                    None => {
                        state.emitting = false;
                        return;
                    }
                }
            };
            if let Some(target) = self.target.upgrade() {
                target.push(next);
            }
        }
    }
}

/// Hands emission back if an observer panics mid-drain.
struct EmitReset<'a, S>(&'a Mutex<ZipState<S>>);

impl<S> Drop for EmitReset<'_, S> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.0.lock();
            state.outbox.clear();
            state.emitting = false;
        }
    }
}

impl<A> Signal<A>
where
    A: Clone + Send + Sync + 'static,
{
    /// Combine this signal with `other`.
    ///
    /// ```rust
    /// use std::sync::{Arc, Mutex};
    /// use tributary_core::reactive::UpdatableSignal;
    ///
    /// let numbers = UpdatableSignal::new();
    /// let letters = UpdatableSignal::new();
    /// let zipped = numbers.zip(&letters);
    ///
    /// numbers.push(0);
    /// letters.push("A");
    /// assert_eq!(zipped.current_value(), Some((Some(0), Some("A"))));
    /// ```
    pub fn zip<B>(&self, other: &Signal<B>) -> Signal<(Option<A>, Option<B>)>
    where
        B: Clone + Send + Sync + 'static,
    {
        let output = Signal::derived(None);
        let zipper = Zipper::new((None::<A>, None::<B>), &output);

        let first = {
            let zipper = Arc::clone(&zipper);
            self.subscribe_weak(move |value: &A| {
                zipper.update(|slots| slots.0 = Some(value.clone()));
            })
        };
        let second = {
            let zipper = Arc::clone(&zipper);
            other.subscribe_weak(move |value: &B| {
                zipper.update(|slots| slots.1 = Some(value.clone()));
            })
        };

        output.retain(self.clone());
        output.retain(other.clone());
        output.retain(first);
        output.retain(second);
        output
    }

    /// Combine this signal with two others.
    pub fn zip3<B, C>(
        &self,
        second: &Signal<B>,
        third: &Signal<C>,
    ) -> Signal<(Option<A>, Option<B>, Option<C>)>
    where
        B: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
    {
        let output = Signal::derived(None);
        let zipper = Zipper::new((None::<A>, None::<B>, None::<C>), &output);

        macro_rules! track {
            ($source:expr, $ty:ty, $slot:tt) => {{
                let zipper = Arc::clone(&zipper);
                $source.subscribe_weak(move |value: &$ty| {
                    zipper.update(|slots| slots.$slot = Some(value.clone()));
                })
            }};
        }

        let handles = (track!(self, A, 0), track!(second, B, 1), track!(third, C, 2));
        output.retain(self.clone());
        output.retain(second.clone());
        output.retain(third.clone());
        output.retain(handles.0);
        output.retain(handles.1);
        output.retain(handles.2);
        output
    }
}

/// Combine any number of same-typed signals.
///
/// Slot `i` of every emitted vector holds the latest value of `signals[i]`.
/// With no sources the result never emits.
pub fn zip_all<T>(signals: &[Signal<T>]) -> Signal<Vec<Option<T>>>
where
    T: Clone + Send + Sync + 'static,
{
    let output = Signal::derived(None);
    let zipper = Zipper::new(vec![None::<T>; signals.len()], &output);

    for (index, signal) in signals.iter().enumerate() {
        let zipper = Arc::clone(&zipper);
        let handle = signal.subscribe_weak(move |value: &T| {
            zipper.update(|slots| slots[index] = Some(value.clone()));
        });
        output.retain(signal.clone());
        output.retain(handle);
    }
    output
}
