//! Environment state: the feature → value mapping shared by every query.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EnvironmentError;

/// Feature values as strings, e.g. `width = "500px"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Environment {
    features: BTreeMap<String, String>,
}

impl Environment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a media literal.
    ///
    /// Accepts a JSON object or the single-quoted object style used by page
    /// harnesses, e.g. `{'prefers-color-scheme': 'light'}`. Numbers and
    /// booleans are stored in their textual form; `null` values are skipped.
    ///
    /// # Errors
    ///
    /// `EnvironmentError::InvalidLiteral` for unparsable input and
    /// `EnvironmentError::NotAnObject` when the top level is not an object.
    pub fn from_literal(literal: &str) -> Result<Self, EnvironmentError> {
        let value: serde_json::Value = match serde_json::from_str(literal) {
            Ok(v) => v,
            Err(first) => serde_json::from_str(&requote(literal)).map_err(|_| EnvironmentError::InvalidLiteral {
                reason: first.to_string(),
            })?,
        };

        let serde_json::Value::Object(map) = value else {
            return Err(EnvironmentError::NotAnObject {
                kind: json_kind(&value).to_string(),
            });
        };

        let mut env = Self::new();
        for (feature, v) in map {
            let text = match v {
                serde_json::Value::Null => continue,
                serde_json::Value::String(s) => s,
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(EnvironmentError::InvalidLiteral {
                        reason: format!("feature '{feature}' has non-scalar value {other}"),
                    })
                }
            };
            env.features.insert(feature, text);
        }
        Ok(env)
    }

    /// Current value of a feature.
    #[must_use]
    pub fn get(&self, feature: &str) -> Option<&str> {
        self.features.get(feature).map(String::as_str)
    }

    /// Overwrites the given features, leaving all others untouched.
    ///
    /// Returns the touched feature names in first-seen order, duplicates
    /// collapsed.
    pub fn merge<I, K, V>(&mut self, partial: I) -> Vec<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut touched: Vec<String> = Vec::new();
        for (feature, value) in partial {
            let feature = feature.into();
            if !touched.contains(&feature) {
                touched.push(feature.clone());
            }
            self.features.insert(feature, value.into());
        }
        touched
    }

    /// Removes every feature.
    pub fn clear(&mut self) {
        self.features.clear();
    }

    /// Number of features set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if no feature is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Copy of the whole mapping.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.features.clone()
    }

    /// JSON object text of the whole mapping.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.features).unwrap_or_else(|_| "{}".to_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Self::new();
        env.merge(iter);
        env
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Rewrites single-quoted strings as JSON double-quoted strings.
fn requote(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    let mut quote: Option<char> = None;

    while let Some(c) = chars.next() {
        match (quote, c) {
            (None, '\'') => {
                quote = Some('\'');
                out.push('"');
            }
            (None, '"') => {
                quote = Some('"');
                out.push('"');
            }
            (Some(q), '\\') => {
                if let Some(next) = chars.next() {
                    if q == '\'' && next == '\'' {
                        out.push('\'');
                    } else {
                        out.push('\\');
                        out.push(next);
                    }
                }
            }
            (Some('\''), '\'') | (Some('"'), '"') => {
                quote = None;
                out.push('"');
            }
            (Some('\''), '"') => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out
}
