//! Query evaluation against an [`Environment`].
//!
//! Clauses are combined by logical OR; each clause's negation flag inverts
//! that clause's own result before the OR is taken. Within a clause every
//! expression must hold.

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::{MediaResult, ParseError};
use crate::normalize::{Normalized, Unit};
use crate::query::{Clause, Expression, Modifier, ParsedQuery};

/// Parses `query` and evaluates it against `env`.
///
/// # Errors
///
/// Returns a parse error when a configured limit is exceeded or when a clause
/// holds an unrecognized expression.
pub fn matches(query: &str, env: &Environment, cfg: &EngineConfig) -> MediaResult<bool> {
    let parsed = ParsedQuery::parse_with(query, cfg)?;
    Ok(evaluate(&parsed, env)?)
}

/// Evaluates a parsed query against `env`.
///
/// Absent features and values that fail unit normalization make their
/// expression false; they never raise an error.
///
/// # Errors
///
/// `ParseError::UnrecognizedExpression` when any expression has no feature
/// name. The check covers every clause before evaluation starts, so the
/// outcome does not depend on the environment.
pub fn evaluate(query: &ParsedQuery, env: &Environment) -> Result<bool, ParseError> {
    if let Some(unnamed) = query.unrecognized() {
        return Err(ParseError::UnrecognizedExpression {
            text: unnamed.value.clone(),
        });
    }

    Ok(query.clauses.iter().any(|c| evaluate_clause(c, env)))
}

fn evaluate_clause(clause: &Clause, env: &Environment) -> bool {
    let all = clause.expressions.iter().all(|e| evaluate_expression(e, env));
    all != clause.negated
}

fn evaluate_expression(expression: &Expression, env: &Environment) -> bool {
    let Some(current) = expression.feature.as_deref().and_then(|f| env.get(f)) else {
        return false;
    };

    let unit = Unit::of_literal(&expression.value);
    let actual = unit.normalize(current);
    let expected = unit.normalize(&expression.value);

    compare(expression.modifier, &actual, &expected)
}

/// Compares two normalized values. Invalid values compare false.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn compare(modifier: Option<Modifier>, actual: &Normalized, expected: &Normalized) -> bool {
    match modifier {
        Some(Modifier::Min) => match (actual.as_number(), expected.as_number()) {
            (Some(a), Some(e)) => a >= e,
            _ => false,
        },
        Some(Modifier::Max) => match (actual.as_number(), expected.as_number()) {
            (Some(a), Some(e)) => a <= e,
            _ => false,
        },
        None => match (actual, expected) {
            (Normalized::Number(a), Normalized::Number(e)) => a == e,
            (Normalized::Text(a), Normalized::Text(e)) => a == e,
            _ => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs.iter().copied().collect()
    }

    fn check(query: &str, env: &Environment) -> bool {
        matches(query, env, &EngineConfig::default()).unwrap()
    }

    #[test]
    fn min_and_max_pixels() {
        let e = env(&[("width", "500px")]);
        assert!(check("(min-width: 100px)", &e));
        assert!(check("(min-width: 500px)", &e));
        assert!(!check("(min-width: 700px)", &e));
        assert!(check("(max-width: 500px)", &e));
        assert!(!check("(max-width: 499px)", &e));
        assert!(check("(width: 500px)", &e));
    }

    #[test]
    fn clauses_are_or_combined() {
        let e = env(&[("width", "500px"), ("orientation", "portrait")]);
        assert!(check("(min-width: 1000px) and (orientation: portrait)", &e));
        assert!(check("(min-width: 100px) and (orientation: landscape)", &e));
        assert!(!check("(min-width: 1000px) and (orientation: landscape)", &e));
    }

    #[test]
    fn negation_inverts_each_clause() {
        let e = env(&[("orientation", "portrait")]);
        assert!(!check("not all and (orientation: portrait)", &e));
        assert!(check("not all and (orientation: landscape)", &e));
    }

    #[test]
    fn absent_feature_is_false() {
        let e = Environment::new();
        assert!(!check("(min-width: 1px)", &e));
        assert!(!check("(orientation: portrait)", &e));
        assert!(!check("(min-aspect-ratio: 16/9)", &e));
    }

    #[test]
    fn units_are_compared_only_against_themselves() {
        let e = env(&[("width", "500px")]);
        assert!(!check("(min-width: 10mm)", &e));
        assert!(!check("(max-width: 10in)", &e));
    }

    #[test]
    fn dpcm_literal_scales_both_sides() {
        let e = env(&[("resolution", "100dpcm")]);
        assert!(check("(min-resolution: 99dpcm)", &e));
        assert!(!check("(min-resolution: 101dpcm)", &e));
        // dpi literal against a dpcm value does not normalize
        assert!(!check("(min-resolution: 100dpi)", &e));
    }

    #[test]
    fn ratios_compare_as_decimals() {
        let e = env(&[("aspect-ratio", "16/9")]);
        assert!(check("(min-aspect-ratio: 4/3)", &e));
        assert!(!check("(max-aspect-ratio: 4/3)", &e));
        assert!(check("(aspect-ratio: 32/18)", &e));
    }

    #[test]
    fn strings_compare_after_unquoting() {
        let e = env(&[("prefers-color-scheme", "'dark'")]);
        assert!(check("(prefers-color-scheme: dark)", &e));
        assert!(check("(prefers-color-scheme: \"dark\")", &e));
        assert!(!check("(prefers-color-scheme: light)", &e));
    }

    #[test]
    fn unitless_min_compares_numerically() {
        let e = env(&[("color", "8")]);
        assert!(check("(min-color: 4)", &e));
        assert!(!check("(min-color: 16)", &e));
        assert!(!check("(min-color: many)", &e));
    }

    #[test]
    fn malformed_environment_value_is_false() {
        let e = env(&[("width", "wide")]);
        assert!(!check("(min-width: 0px)", &e));
        assert!(!check("(width: 0px)", &e));
    }

    #[test]
    fn unnamed_expression_is_an_error() {
        let err = matches("(hover)", &Environment::new(), &EngineConfig::default()).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn unnamed_expression_fails_even_after_a_matching_clause() {
        let e = env(&[("width", "500px")]);
        let err = matches("(min-width: 1px) (hover)", &e, &EngineConfig::default()).unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn query_without_clauses_never_matches() {
        let e = env(&[("width", "500px")]);
        assert!(!check("screen", &e));
        assert!(!check("not all", &e));
    }
}
