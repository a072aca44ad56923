//! Delayed Signals
//!
//! A delayed signal re-emits each source value after a fixed interval,
//! measured from the moment the source pushed it. Deliveries happen on the
//! process-wide [`Timer`] thread and keep the source's order: two values
//! pushed in sequence are scheduled with non-decreasing deadlines, and the
//! timer fires equal deadlines in submission order.

use std::time::Duration;

use super::signal::Signal;
use crate::schedule::Timer;

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A signal that re-emits every value of this one after `delay`.
    ///
    /// A value pending in the timer when the delayed signal is dropped is
    /// discarded.
    pub fn delayed(&self, delay: Duration) -> Signal<T> {
        let output = Signal::derived(None);
        let target = output.downgrade();
        let handle = self.subscribe_weak(move |value: &T| {
            let target = target.clone();
            let value = value.clone();
            Timer::global().schedule_after(
                delay,
                Box::new(move || {
                    if let Some(target) = target.upgrade() {
                        target.push(value);
                    }
                }),
            );
        });
        output.retain(self.clone());
        output.retain(handle);
        output
    }
}
