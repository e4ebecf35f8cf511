//! Listener identity and the ordered listener collection of a handle.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::event::MediaEvent;

/// A change callback.
///
/// Identity follows the shared allocation: clones of a `Listener` are the same
/// callback, two `Listener::new` calls with equal closures are not.
#[derive(Clone)]
pub struct Listener(Arc<dyn Fn(&MediaEvent) + Send + Sync>);

impl Listener {
    /// Wraps a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&MediaEvent) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Invokes the callback.
    pub fn call(&self, event: &MediaEvent) {
        (self.0)(event);
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast::<()>()
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.addr()).finish()
    }
}

/// Options accepted by `add_event_listener`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation.
    pub once: bool,
}

impl ListenerOptions {
    /// Options with `once` set.
    #[must_use]
    pub const fn once() -> Self {
        Self { once: true }
    }
}

/// A registered listener and its fire-once flag.
#[derive(Debug, Clone)]
pub struct ListenerEntry {
    /// The callback.
    pub listener: Listener,
    /// Removed after its next delivery when set.
    pub once: bool,
}

/// Listeners in registration order, each at most once.
#[derive(Debug, Default)]
pub struct ListenerSet {
    entries: Vec<ListenerEntry>,
}

impl ListenerSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, listener: &Listener) -> Option<usize> {
        self.entries.iter().position(|e| &e.listener == listener)
    }

    /// Registers a listener through the event-listener contract.
    ///
    /// A new listener takes the `once` flag as given. Re-adding without
    /// `once` makes an existing listener persistent; re-adding with `once`
    /// leaves an existing listener as it was.
    pub fn add(&mut self, listener: Listener, once: bool) {
        match self.position(&listener) {
            None => self.entries.push(ListenerEntry { listener, once }),
            Some(i) if !once => self.entries[i].once = false,
            Some(_) => {}
        }
    }

    /// Registers a listener through the legacy contract. Never sets `once`.
    pub fn add_legacy(&mut self, listener: Listener) {
        if self.position(&listener).is_none() {
            self.entries.push(ListenerEntry { listener, once: false });
        }
    }

    /// Removes a listener and its `once` flag. Returns true if it was present.
    pub fn remove(&mut self, listener: &Listener) -> bool {
        match self.position(listener) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Removes a listener only if it is still registered as fire-once.
    pub fn remove_if_once(&mut self, listener: &Listener) -> bool {
        match self.position(listener) {
            Some(i) if self.entries[i].once => {
                self.entries.remove(i);
                true
            }
            _ => false,
        }
    }

    /// Returns true if the listener is registered.
    #[must_use]
    pub fn contains(&self, listener: &Listener) -> bool {
        self.position(listener).is_some()
    }

    /// Returns true if the listener is registered and marked fire-once.
    #[must_use]
    pub fn is_once(&self, listener: &Listener) -> bool {
        self.position(listener).is_some_and(|i| self.entries[i].once)
    }

    /// Listeners in delivery order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Listener> {
        self.entries.iter().map(|e| e.listener.clone()).collect()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every listener and `once` flag.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
