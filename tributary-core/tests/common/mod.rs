//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;
use tributary_core::reactive::{Signal, WeakHandle};

static TRACING: Once = Once::new();

/// Route `tracing` output to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Records every value a signal delivers, for as long as it is alive.
pub struct Recorder<T> {
    seen: Arc<Mutex<Vec<T>>>,
    _handle: WeakHandle,
}

impl<T> Recorder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn attach(signal: &Signal<T>) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = signal.subscribe_weak(move |value: &T| sink.lock().push(value.clone()));
        Self {
            seen,
            _handle: handle,
        }
    }

    pub fn values(&self) -> Vec<T> {
        self.seen.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().len()
    }
}
