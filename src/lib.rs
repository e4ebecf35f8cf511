//! # mediastub - an in-process `matchMedia` emulator
//!
//! mediastub lets code that depends on media queries run against a simulated
//! viewport/device environment. It parses a small media-query grammar,
//! compares feature values with unit awareness, and notifies listeners only
//! when a query's match result actually flips.
//!
//! ## Core Concepts
//!
//! - **Environment**: the feature → value mapping (`width = "500px"`)
//! - **MediaQueryList**: the live handle returned for a registered query
//! - **MediaEvent**: the `"change"` event delivered to listeners
//! - **MediaEngine**: owns the environment and the registry of handles
//!
//! Clauses of a query are OR-ed: `(min-width: 1000px) and (orientation: portrait)`
//! matches when either test holds.
//!
//! ## Usage
//!
//! ```
//! use mediastub::{Listener, MediaEngine};
//!
//! let engine = MediaEngine::with_media([("width", "500px")]);
//! let mql = engine.match_media("(min-width: 100px)");
//! assert!(mql.matches());
//!
//! mql.add_listener(Listener::new(|event| assert!(!event.matches)));
//! engine.set_media([("width", "50px")]);
//! assert!(!mql.matches());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod event;
pub mod handle;
pub mod listener;
pub mod matcher;
pub mod normalize;
pub mod query;
pub mod stream;

// Re-export primary types at crate root for convenience
pub use config::EngineConfig;
pub use engine::MediaEngine;
pub use environment::Environment;
pub use error::{DispatchError, EnvironmentError, MediaError, MediaResult, ParseError};
pub use event::{EventArg, MediaEvent, CHANGE_EVENT};
pub use handle::{HandleId, MediaQueryList};
pub use listener::{Listener, ListenerOptions};
pub use normalize::{Normalized, Unit};
pub use query::{Clause, Expression, Modifier, ParsedQuery};
pub use stream::ChangeStream;
