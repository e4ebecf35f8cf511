//! Error types for mediastub.
//!
//! Errors are strongly typed using thiserror. Only `dispatch_event` and the
//! environment literal loader surface errors to callers; parse failures at
//! registration are absorbed by the engine.

use thiserror::Error;

/// Errors raised by `MediaQueryList::dispatch_event`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum DispatchError {
    #[error("Failed to execute 'dispatchEvent' on 'EventTarget': 1 argument required, but only 0 present.")]
    MissingArgument,

    #[error("Failed to execute 'dispatchEvent' on 'EventTarget': parameter 1 is not of type 'Event'.")]
    NotAnEvent,
}

/// Errors raised while parsing a media query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ParseError {
    #[error("Media query is {len} bytes long, maximum is {max}")]
    QueryTooLong {
        len: usize,
        max: usize,
    },

    #[error("Media query has {count} clauses, maximum is {max}")]
    TooManyClauses {
        count: usize,
        max: usize,
    },

    #[error("Unrecognized media feature expression '({text})'")]
    UnrecognizedExpression {
        text: String,
    },
}

/// Errors raised while loading environment state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum EnvironmentError {
    #[error("Invalid media literal: {reason}")]
    InvalidLiteral {
        reason: String,
    },

    #[error("Media literal must be an object, got {kind}")]
    NotAnObject {
        kind: String,
    },
}

/// Top-level error type for mediastub.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MediaError {
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },
}

impl MediaError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a dispatch error.
    #[must_use]
    pub const fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }

    /// Returns true if this is a parse error.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Returns true if this is an environment error.
    #[must_use]
    pub const fn is_environment(&self) -> bool {
        matches!(self, Self::Environment(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias for mediastub operations.
pub type MediaResult<T> = Result<T, MediaError>;
