//! Queue-Redirect Signals
//!
//! A redirect signal mirrors its source but notifies its own observers on a
//! chosen [`ExecutionContext`] instead of the pushing thread. Observer order
//! within one push is preserved; across pushes delivery follows the
//! context's own submission order, which is FIFO for a
//! [`SerialQueue`](crate::schedule::SerialQueue).
//!
//! Subscribing is queued on the target context as well, so the replay of
//! the cached value runs there too, and in order with the deliveries.

use std::sync::Arc;

use super::signal::{Delivery, Signal};
use crate::schedule::ExecutionContext;

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// A signal carrying the same values, delivered on `context`.
    ///
    /// Returns this signal itself when it already notifies on `context`.
    /// The returned signal keeps this one alive; it observes it only through
    /// the weak proxy.
    pub fn deliver_on(&self, context: Arc<dyn ExecutionContext>) -> Signal<T> {
        if self.notification_context() == Some(context.id()) {
            return self.clone();
        }

        let output = Signal::with_delivery(Delivery::redirect(context), None);
        let target = output.downgrade();
        let handle = self.subscribe_weak(move |value: &T| {
            if let Some(target) = target.upgrade() {
                target.push(value.clone());
            }
        });
        output.retain(self.clone());
        output.retain(handle);
        output
    }
}
