//! The media engine: environment owner, query registry and change dispatcher.
//!
//! `set_media` merges the update, then walks the registry one handle at a
//! time: recompute against the live environment, update the cached result,
//! release the locks and deliver that handle's event before moving on. A
//! listener that calls back into the engine is absorbed by the outer pass,
//! since later handles are compared against whatever state is current when
//! the pass reaches them. Updates from different threads are serialized by a
//! re-entrant gate held for the whole pass.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use parking_lot::ReentrantMutex;
use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::MediaResult;
use crate::handle::{lock, MediaQueryList, UpdateGate};
use crate::matcher;
use crate::query::{ParsedQuery, NEVER_MATCHING_QUERY};

/// Feature toggled by [`MediaEngine::set_dark_mode`].
pub const COLOR_SCHEME_FEATURE: &str = "prefers-color-scheme";

#[derive(Debug)]
struct RegistryEntry {
    handle: MediaQueryList,
    previous_matched: bool,
}

#[derive(Debug, Default)]
struct Registry {
    entries: Vec<RegistryEntry>,
}

#[derive(Debug)]
struct EngineInner {
    cfg: EngineConfig,
    origin: DateTime<Utc>,
    // Held for a whole update or reset pass, including delivery.
    update_gate: UpdateGate,
    // Lock order: update gate, registry, then environment.
    registry: Mutex<Registry>,
    environment: Arc<RwLock<Environment>>,
}

/// A simulated media environment with `matchMedia` semantics.
///
/// Cloning yields another reference to the same engine.
#[derive(Debug, Clone)]
pub struct MediaEngine {
    inner: Arc<EngineInner>,
}

impl Default for MediaEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl MediaEngine {
    /// Creates an engine with an empty environment.
    #[must_use]
    pub fn new(cfg: EngineConfig) -> Self {
        Self::with_environment(cfg, Environment::new())
    }

    /// Creates an engine with the given configuration and initial environment.
    #[must_use]
    pub fn with_environment(cfg: EngineConfig, environment: Environment) -> Self {
        debug!(features = environment.len(), "media engine created");
        Self {
            inner: Arc::new(EngineInner {
                cfg,
                origin: Utc::now(),
                update_gate: Arc::new(ReentrantMutex::new(())),
                registry: Mutex::new(Registry::default()),
                environment: Arc::new(RwLock::new(environment)),
            }),
        }
    }

    /// Creates an engine with default configuration and initial feature values.
    #[must_use]
    pub fn with_media<I, K, V>(initial: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_environment(EngineConfig::default(), initial.into_iter().collect())
    }

    /// Creates an engine from a media literal such as
    /// `{'prefers-color-scheme': 'light'}`.
    ///
    /// # Errors
    ///
    /// Returns an environment error if the literal is not an object of scalars.
    pub fn from_literal(literal: &str) -> MediaResult<Self> {
        let environment = Environment::from_literal(literal)?;
        Ok(Self::with_environment(EngineConfig::default(), environment))
    }

    /// The limits this engine was created with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.cfg
    }

    /// When the engine was created; event time stamps are relative to it.
    #[must_use]
    pub fn origin(&self) -> DateTime<Utc> {
        self.inner.origin
    }

    fn read_env(&self) -> RwLockReadGuard<'_, Environment> {
        self.inner.environment.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_env(&self) -> RwLockWriteGuard<'_, Environment> {
        self.inner.environment.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a media query and returns its live handle.
    ///
    /// Never fails: a query that cannot be parsed or evaluated registers as
    /// `"not all"` and never matches.
    #[must_use]
    pub fn match_media(&self, query: &str) -> MediaQueryList {
        let _gate = self.inner.update_gate.lock();
        let mut registry = lock(&self.inner.registry);
        let env = self.read_env();

        let (effective, previous_matched) = match ParsedQuery::parse_with(query, &self.inner.cfg)
            .and_then(|parsed| matcher::evaluate(&parsed, &env).map(|m| (parsed, m)))
        {
            Ok(pair) => pair,
            Err(err) => {
                warn!(query, error = %err, fallback = NEVER_MATCHING_QUERY, "media query rejected");
                (ParsedQuery::never_matching(), false)
            }
        };
        drop(env);

        let handle = MediaQueryList::new(
            query.to_string(),
            effective,
            Arc::clone(&self.inner.environment),
            self.inner.origin,
            self.inner.cfg.stream_capacity,
            Arc::clone(&self.inner.update_gate),
        );
        debug!(
            id = %handle.id(),
            query,
            matches = previous_matched,
            features = handle.features().len(),
            "media query registered"
        );

        registry.entries.push(RegistryEntry {
            handle: handle.clone(),
            previous_matched,
        });
        handle
    }

    /// Evaluates a query against the current environment without registering it.
    ///
    /// # Errors
    ///
    /// Returns the parse error a registration would have absorbed.
    pub fn matches(&self, query: &str) -> MediaResult<bool> {
        matcher::matches(query, &self.read_env(), &self.inner.cfg)
    }

    /// Merges feature values into the environment and notifies every handle
    /// whose match result flipped.
    ///
    /// Every handle is recomputed, whether or not its query mentions one of
    /// the touched features. Each notified handle receives one freshly built
    /// `"change"` event through its `dispatch_event`, in registration order,
    /// before the next handle is recomputed.
    ///
    /// The pass holds the engine's update gate, so a listener must not block
    /// on another thread that updates the same engine.
    pub fn set_media<I, K, V>(&self, partial: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let _gate = self.inner.update_gate.lock();
        let touched = {
            let _registry = lock(&self.inner.registry);
            self.write_env().merge(partial)
        };

        let mut notified = 0usize;
        let mut index = 0;
        loop {
            let (handle, matches) = {
                let mut registry = lock(&self.inner.registry);
                let Some(entry) = registry.entries.get_mut(index) else {
                    break;
                };
                index += 1;

                let matches = entry.handle.evaluate(&self.read_env());
                if matches == entry.previous_matched {
                    continue;
                }
                entry.previous_matched = matches;
                trace!(
                    id = %entry.handle.id(),
                    matches,
                    references_touched = entry.handle.references_any(&touched),
                    "media query flipped"
                );
                (entry.handle.clone(), matches)
            };

            notified += 1;
            let event = handle.change_event(matches);
            if let Err(err) = handle.dispatch_event(Some(event.into())) {
                warn!(id = %handle.id(), error = %err, "change event dispatch failed");
            }
        }

        debug!(touched = touched.len(), handles = index, notified, "media updated");
    }

    /// Sets `prefers-color-scheme` to `dark` or `light`.
    pub fn set_dark_mode(&self, dark: bool) {
        let scheme = if dark { "dark" } else { "light" };
        self.set_media([(COLOR_SCHEME_FEATURE, scheme)]);
    }

    /// Clears every handle's listeners, forgets every handle and empties the
    /// environment.
    pub fn reset(&self) {
        let _gate = self.inner.update_gate.lock();
        let mut registry = lock(&self.inner.registry);
        for entry in &registry.entries {
            entry.handle.clear_listeners();
        }
        let released = registry.entries.len();
        registry.entries.clear();
        self.write_env().clear();
        debug!(released, "media engine reset");
    }

    /// Number of registered handles.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        lock(&self.inner.registry).entries.len()
    }

    /// Copy of the current environment.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.read_env().snapshot()
    }

    /// The current environment as a JSON object.
    #[must_use]
    pub fn media_json(&self) -> String {
        self.read_env().to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{Listener, ListenerOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (hits, Listener::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn registration_falls_back_to_never_matching() {
        let engine = MediaEngine::with_media([("width", "500px")]);
        let mql = engine.match_media("not (hover)");
        assert!(!mql.matches());
        assert_eq!(mql.media(), "not (hover)");
        assert!(mql.features().is_empty());
        assert_eq!(engine.handle_count(), 1);
    }

    #[test]
    fn over_long_query_falls_back() {
        let cfg = EngineConfig {
            max_query_len: 8,
            ..EngineConfig::default()
        };
        let engine = MediaEngine::with_environment(cfg, [("width", "500px")].into_iter().collect());
        let mql = engine.match_media("(min-width: 1px)");
        assert!(!mql.matches());
        assert!(engine.matches("(min-width: 1px)").unwrap_err().is_parse());
    }

    #[test]
    fn flip_delivers_one_event() {
        let engine = MediaEngine::with_media([("width", "500px")]);
        let mql = engine.match_media("(min-width: 100px)");
        let (hits, l) = counter();
        mql.add_listener(l);

        engine.set_media([("width", "50px")]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        engine.set_media([("width", "60px")]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unrelated_feature_updates_are_silent() {
        let engine = MediaEngine::with_media([("width", "500px")]);
        let mql = engine.match_media("(min-width: 100px)");
        let (hits, l) = counter();
        mql.add_event_listener("change", l, ListenerOptions::default());

        engine.set_media([("height", "10px")]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(mql.matches());
    }

    #[test]
    fn reset_clears_everything() {
        let engine = MediaEngine::with_media([("width", "500px")]);
        let mql = engine.match_media("(min-width: 100px)");
        let (hits, l) = counter();
        mql.add_listener(l);

        engine.reset();
        assert_eq!(engine.handle_count(), 0);
        assert_eq!(mql.listener_count(), 0);
        assert!(engine.snapshot().is_empty());

        engine.set_media([("width", "50px")]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dark_mode_toggles_color_scheme() {
        let engine = MediaEngine::from_literal("{'prefers-color-scheme': 'light'}").unwrap();
        let dark = engine.match_media("(prefers-color-scheme: dark)");
        assert!(!dark.matches());

        engine.set_dark_mode(true);
        assert!(dark.matches());
        assert_eq!(engine.media_json(), r#"{"prefers-color-scheme":"dark"}"#);
    }

    #[test]
    fn listener_may_reenter_engine() {
        let engine = MediaEngine::with_media([("width", "500px")]);
        let mql = engine.match_media("(min-width: 100px)");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (e, m, s) = (engine.clone(), mql.clone(), Arc::clone(&seen));
        mql.add_listener(Listener::new(move |ev| {
            s.lock().unwrap().push((ev.matches, m.matches()));
            if !ev.matches {
                e.set_media([("width", "700px")]);
            }
        }));

        engine.set_media([("width", "50px")]);
        assert_eq!(*seen.lock().unwrap(), vec![(false, false), (true, true)]);
    }

    #[test]
    fn reentrant_update_is_absorbed_by_later_handles() {
        let engine = MediaEngine::with_media([("width", "500px")]);
        let a = engine.match_media("(min-width: 100px)");
        let b = engine.match_media("(min-width: 100px)");

        let a_seen = Arc::new(Mutex::new(Vec::new()));
        let restored = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (e, s, r) = (engine.clone(), Arc::clone(&a_seen), Arc::clone(&restored));
        a.add_listener(Listener::new(move |ev| {
            s.lock().unwrap().push(ev.matches);
            if !r.swap(true, Ordering::SeqCst) {
                e.set_media([("width", "500px")]);
            }
        }));

        let b_seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&b_seen);
        b.add_listener(Listener::new(move |ev| s.lock().unwrap().push(ev.matches)));

        engine.set_media([("width", "50px")]);
        assert_eq!(*a_seen.lock().unwrap(), vec![false, true]);
        assert!(b_seen.lock().unwrap().is_empty());
        assert!(a.matches());
        assert!(b.matches());

        // cached state stays in step with the live result
        engine.set_media([("width", "50px")]);
        assert_eq!(*b_seen.lock().unwrap(), vec![false]);
    }

    #[test]
    fn reentrant_reset_stops_the_outer_pass() {
        let engine = MediaEngine::with_media([("width", "500px")]);
        let a = engine.match_media("(min-width: 100px)");
        let b = engine.match_media("(min-width: 100px)");
        let (hits, l) = counter();
        b.add_listener(l);

        let e = engine.clone();
        a.add_listener(Listener::new(move |_| e.reset()));

        engine.set_media([("width", "50px")]);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(engine.handle_count(), 0);
    }
}
