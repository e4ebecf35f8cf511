//! The live handle returned by `MediaEngine::match_media`.
//!
//! A handle carries two listener contracts over one collection: the legacy
//! `add_listener`/`remove_listener` pair and the event-listener pair that
//! also understands `{ once: true }`.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::environment::Environment;
use crate::error::{DispatchError, MediaResult};
use crate::event::{EventArg, MediaEvent, CHANGE_EVENT};
use crate::listener::{Listener, ListenerOptions, ListenerSet};
use crate::matcher;
use crate::query::ParsedQuery;
use crate::stream::ChangeStream;

/// Unique identifier for a registered handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(Uuid);

impl HandleId {
    /// Create a new random handle id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Serializes updates and dispatches on one engine; re-entrant on the owning thread.
pub(crate) type UpdateGate = Arc<ReentrantMutex<()>>;

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct HandleInner {
    id: HandleId,
    media: String,
    query: ParsedQuery,
    features: BTreeSet<String>,
    environment: Arc<RwLock<Environment>>,
    origin: DateTime<Utc>,
    stream_capacity: usize,
    gate: UpdateGate,
    listeners: Mutex<ListenerSet>,
    onchange: Mutex<Option<Listener>>,
}

/// A registered media query, analogous to a browser `MediaQueryList`.
///
/// Cloning yields another reference to the same handle.
#[derive(Clone)]
pub struct MediaQueryList {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for MediaQueryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaQueryList")
            .field("id", &self.inner.id)
            .field("media", &self.inner.media)
            .field("features", &self.inner.features)
            .finish_non_exhaustive()
    }
}

impl MediaQueryList {
    pub(crate) fn new(
        media: String,
        query: ParsedQuery,
        environment: Arc<RwLock<Environment>>,
        origin: DateTime<Utc>,
        stream_capacity: usize,
        gate: UpdateGate,
    ) -> Self {
        let features = query.features();
        Self {
            inner: Arc::new(HandleInner {
                id: HandleId::new(),
                media,
                query,
                features,
                environment,
                origin,
                stream_capacity,
                gate,
                listeners: Mutex::new(ListenerSet::new()),
                onchange: Mutex::new(None),
            }),
        }
    }

    /// Identifier assigned at registration.
    #[must_use]
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// The query text exactly as registered.
    #[must_use]
    pub fn media(&self) -> &str {
        &self.inner.media
    }

    /// Whether the query matches the current environment.
    ///
    /// Evaluated on every call, so it reflects updates that have not been
    /// dispatched yet.
    #[must_use]
    pub fn matches(&self) -> bool {
        let env = self
            .inner
            .environment
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        self.evaluate(&env)
    }

    pub(crate) fn evaluate(&self, env: &Environment) -> bool {
        // The query was validated at registration; an error here means "never".
        matcher::evaluate(&self.inner.query, env).unwrap_or(false)
    }

    /// Feature names the (possibly substituted) query refers to.
    #[must_use]
    pub fn features(&self) -> &BTreeSet<String> {
        &self.inner.features
    }

    pub(crate) fn references_any(&self, touched: &[String]) -> bool {
        touched.iter().any(|f| self.inner.features.contains(f))
    }

    /// Current `onchange` callback.
    #[must_use]
    pub fn onchange(&self) -> Option<Listener> {
        lock(&self.inner.onchange).clone()
    }

    /// Assigns or clears the `onchange` callback.
    pub fn set_onchange(&self, callback: Option<Listener>) {
        *lock(&self.inner.onchange) = callback;
    }

    /// Registers a listener for `event_type`. Only `"change"` is recognized.
    pub fn add_event_listener(&self, event_type: &str, listener: Listener, options: ListenerOptions) {
        if event_type != CHANGE_EVENT {
            return;
        }
        lock(&self.inner.listeners).add(listener, options.once);
    }

    /// Removes a listener for `event_type`. Only `"change"` is recognized.
    pub fn remove_event_listener(&self, event_type: &str, listener: &Listener) {
        if event_type != CHANGE_EVENT {
            return;
        }
        lock(&self.inner.listeners).remove(listener);
    }

    /// Legacy registration; the listener is persistent.
    pub fn add_listener(&self, listener: Listener) {
        lock(&self.inner.listeners).add_legacy(listener);
    }

    /// Legacy removal.
    pub fn remove_listener(&self, listener: &Listener) {
        lock(&self.inner.listeners).remove(listener);
    }

    /// Returns true if the listener is in the listener collection.
    #[must_use]
    pub fn has_listener(&self, listener: &Listener) -> bool {
        lock(&self.inner.listeners).contains(listener)
    }

    /// Number of listeners, not counting `onchange`.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    pub(crate) fn clear_listeners(&self) {
        lock(&self.inner.listeners).clear();
    }

    /// Dispatches an event to `onchange` and then every listener in
    /// registration order.
    ///
    /// Events whose type is not `"change"` are accepted and ignored. A
    /// listener removed by an earlier callback in the same pass is skipped;
    /// fire-once listeners are removed right after they run.
    ///
    /// # Errors
    ///
    /// `DispatchError::MissingArgument` when `event` is `None` and
    /// `DispatchError::NotAnEvent` when it is not a [`MediaEvent`].
    ///
    /// Delivery holds the engine's update gate, so it never interleaves with
    /// an update running on another thread.
    pub fn dispatch_event(&self, event: Option<EventArg>) -> MediaResult<bool> {
        let Some(arg) = event else {
            return Err(DispatchError::MissingArgument.into());
        };
        let EventArg::Event(event) = arg else {
            return Err(DispatchError::NotAnEvent.into());
        };
        if !event.is_change() {
            return Ok(true);
        }

        let _gate = self.inner.gate.lock();
        if let Some(onchange) = self.onchange() {
            onchange.call(&event);
        }

        let pass = lock(&self.inner.listeners).snapshot();
        for listener in pass {
            if !self.has_listener(&listener) {
                continue;
            }
            listener.call(&event);
            lock(&self.inner.listeners).remove_if_once(&listener);
        }

        Ok(true)
    }

    /// Creates a fresh `"change"` event stamped relative to the engine clock.
    #[must_use]
    pub fn change_event(&self, matches: bool) -> MediaEvent {
        MediaEvent::change(self.inner.media.clone(), matches, self.inner.origin)
    }

    /// Subscribes a channel-backed stream using the engine's default capacity.
    #[must_use]
    pub fn change_stream(&self) -> ChangeStream {
        ChangeStream::attach(self.clone(), self.inner.stream_capacity)
    }

    /// Subscribes a channel-backed stream with an explicit capacity.
    #[must_use]
    pub fn change_stream_with_capacity(&self, capacity: usize) -> ChangeStream {
        ChangeStream::attach(self.clone(), capacity)
    }
}
