//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Limits and buffer sizes for a [`crate::MediaEngine`].
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Queries longer than this (in bytes) register as permanently non-matching.
    pub max_query_len: usize,
    /// Queries yielding more clauses than this register as permanently non-matching.
    pub max_clauses: usize,
    /// Default buffer capacity for change streams.
    pub stream_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_query_len: 4096,
            max_clauses: 64,
            stream_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Loads a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Config` if the input is not a valid config object.
    pub fn from_json(json: &str) -> MediaResult<Self> {
        serde_json::from_str(json).map_err(|e| MediaError::config(format!("invalid engine config: {e}")))
    }
}
