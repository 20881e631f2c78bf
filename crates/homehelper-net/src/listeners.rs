//! Ordered listener registries.
//!
//! A `ListenerSet` invokes every registered listener in registration order.
//! A listener that returns an error or panics is logged and skipped; the
//! remaining listeners still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use tracing::{error, warn};

/// Receives payloads of type `T`.
pub trait Listener<T: ?Sized>: Send + Sync {
    fn handle(&self, payload: &T) -> anyhow::Result<()>;
}

impl<T: ?Sized, F> Listener<T> for F
where
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, payload: &T) -> anyhow::Result<()> {
        self(payload)
    }
}

pub struct ListenerSet<T: ?Sized> {
    name: &'static str,
    listeners: RwLock<Vec<Arc<dyn Listener<T>>>>,
}

impl<T: ?Sized> ListenerSet<T> {
    /// Create an empty set. `name` only appears in log output.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn register<L>(&self, listener: L)
    where
        L: Listener<T> + 'static,
    {
        self.register_arc(Arc::new(listener));
    }

    pub fn register_arc(&self, listener: Arc<dyn Listener<T>>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(poisoned) => poisoned.into_inner().push(listener),
        }
    }

    pub fn len(&self) -> usize {
        match self.listeners.read() {
            Ok(listeners) => listeners.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every listener with `payload`. Returns how many succeeded.
    ///
    /// The registry is snapshotted first, so a listener may register further
    /// listeners without deadlocking; those run from the next dispatch on.
    pub fn dispatch(&self, payload: &T) -> usize {
        let snapshot: Vec<Arc<dyn Listener<T>>> = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        let mut ok = 0;
        for (index, listener) in snapshot.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener.handle(payload))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    warn!(set = self.name, index, error = %e, "Listener failed");
                }
                Err(_) => {
                    error!(set = self.name, index, "Listener panicked");
                }
            }
        }
        ok
    }
}
