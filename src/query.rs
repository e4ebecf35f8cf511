//! Media query parsing.
//!
//! The grammar is deliberately small. A query is scanned for every
//! `[<medium> and] (<expression>)` occurrence and each occurrence becomes an
//! independent [`Clause`]. Clauses are OR-ed by the matcher, so
//! `(a: 1) and (b: 2)` holds when either feature test holds.
//!
//! Negation applies to the whole query: when the lower-cased text starts with
//! `"not "` every clause is negated.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ParseError;
use crate::normalize::strip_quotes;

/// Medium used when a clause has no `<medium> and` prefix.
pub const DEFAULT_MEDIUM: &str = "all";

/// Query substituted for registrations that fail to parse or match.
pub const NEVER_MATCHING_QUERY: &str = "not all";

const CLAUSE_PATTERN: &str = r"(?:\s*([a-z-]+)\s*and\s*)?(?:\(\s*([^)]+)\s*\))";

const EXPRESSION_PATTERN: &str = concat!(
    r"\s*((min|max)-)?([a-z-]+)\s*:\s*",
    r#"((?:\d+(?:\.\d+)?\s*/\s*\d+(?:\.\d+)?|[a-z-]+|"[^"]+"|'[^']+'|\([^)]+\)|\d+(?:\.\d+)?[a-z]*)+)\s*"#,
);

fn clause_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CLAUSE_PATTERN).expect("clause pattern is valid"))
}

fn expression_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EXPRESSION_PATTERN).expect("expression pattern is valid"))
}

/// Comparison direction of a feature expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    /// Environment value must be greater than or equal to the literal.
    Min,
    /// Environment value must be less than or equal to the literal.
    Max,
}

impl Modifier {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min => write!(f, "min"),
            Self::Max => write!(f, "max"),
        }
    }
}

/// One feature test inside a clause.
///
/// `feature` is `None` when the parenthesized text is not a
/// `[min-|max-]<name>: <value>` expression; `value` then holds the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    /// Feature name without its `min-`/`max-` prefix.
    pub feature: Option<String>,
    /// `None` for an exact-match test.
    pub modifier: Option<Modifier>,
    /// Comparison literal with one pair of matching quotes removed.
    pub value: String,
}

impl Expression {
    /// Parses the text between a clause's parentheses.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let Some(caps) = expression_regex().captures(text) else {
            return Self {
                feature: None,
                modifier: None,
                value: text.to_string(),
            };
        };

        Self {
            feature: caps.get(3).map(|m| m.as_str().to_string()),
            modifier: caps.get(2).and_then(|m| Modifier::parse(m.as_str())),
            value: caps.get(4).map_or("", |m| strip_quotes(m.as_str())).to_string(),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.modifier, &self.feature) {
            (Some(m), Some(name)) => write!(f, "({m}-{name}: {})", self.value),
            (None, Some(name)) => write!(f, "({name}: {})", self.value),
            (_, None) => write!(f, "({})", self.value),
        }
    }
}

/// A medium, negation flag and feature expressions.
///
/// The parser always produces exactly one expression per clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    /// Medium before `and`, `"all"` when absent. Not evaluated.
    pub medium: String,
    /// Set on every clause when the query starts with `not `.
    pub negated: bool,
    /// Feature tests; a clause matches when all of them hold.
    pub expressions: Vec<Expression>,
}

/// A parsed media query: the ordered clause sequence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// Clauses in source order, OR-ed together.
    pub clauses: Vec<Clause>,
}

impl ParsedQuery {
    /// Parses a query with the default limits.
    ///
    /// # Errors
    ///
    /// See [`ParsedQuery::parse_with`].
    pub fn parse(query: &str) -> Result<Self, ParseError> {
        Self::parse_with(query, &EngineConfig::default())
    }

    /// Parses a query, enforcing the configured length and clause limits.
    ///
    /// Text that does not fit the grammar is skipped, so unrecognized input
    /// yields fewer (possibly zero) clauses rather than an error.
    ///
    /// # Errors
    ///
    /// `ParseError::QueryTooLong` or `ParseError::TooManyClauses` when a limit
    /// is exceeded.
    pub fn parse_with(query: &str, cfg: &EngineConfig) -> Result<Self, ParseError> {
        if query.len() > cfg.max_query_len {
            return Err(ParseError::QueryTooLong {
                len: query.len(),
                max: cfg.max_query_len,
            });
        }

        let query = query.to_lowercase();
        let negated = query.starts_with("not ");

        let mut clauses = Vec::new();
        for caps in clause_regex().captures_iter(&query) {
            let medium = caps.get(1).map_or(DEFAULT_MEDIUM, |m| m.as_str());
            let inner = caps.get(2).map_or("", |m| m.as_str()).trim();

            clauses.push(Clause {
                medium: medium.to_string(),
                negated,
                expressions: vec![Expression::parse(inner)],
            });

            if clauses.len() > cfg.max_clauses {
                return Err(ParseError::TooManyClauses {
                    count: clauses.len(),
                    max: cfg.max_clauses,
                });
            }
        }

        Ok(Self { clauses })
    }

    /// The never-matching query used as a registration fallback.
    #[must_use]
    pub fn never_matching() -> Self {
        // "not all" carries no parenthesized group, hence no clauses.
        Self::default()
    }

    /// Names of every feature referenced by the query.
    #[must_use]
    pub fn features(&self) -> BTreeSet<String> {
        self.clauses
            .iter()
            .flat_map(|c| c.expressions.iter())
            .filter_map(|e| e.feature.clone())
            .collect()
    }

    /// First expression without a feature name, if any.
    #[must_use]
    pub fn unrecognized(&self) -> Option<&Expression> {
        self.clauses
            .iter()
            .flat_map(|c| c.expressions.iter())
            .find(|e| e.feature.is_none())
    }

    /// Returns true if the query has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}
