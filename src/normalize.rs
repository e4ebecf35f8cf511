//! Unit-aware value normalization.
//!
//! A feature comparison normalizes both the environment value and the query
//! literal through the same [`Unit`], chosen from the literal's trailing suffix
//! or shape. Units are never converted into each other except `dpcm`, which is
//! scaled into the `dpi` domain.

use std::sync::OnceLock;

use regex::Regex;

/// Centimeters per inch, used to bring `dpcm` into the `dpi` domain.
pub const DPCM_TO_DPI: f64 = 2.54;

/// Comparison domain selected by the literal side of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Dots per inch.
    Dpi,
    /// Dots per centimeter, scaled to dots per inch.
    Dpcm,
    /// CSS pixels.
    Px,
    /// Millimeters.
    Mm,
    /// Inches.
    In,
    /// `numerator/denominator` reduced to a decimal.
    Ratio,
    /// Opaque string with one matching pair of quotes removed.
    Text,
}

impl Unit {
    /// Picks the comparison domain from a query literal.
    #[must_use]
    pub fn of_literal(literal: &str) -> Self {
        if literal.ends_with("dpi") {
            Self::Dpi
        } else if literal.ends_with("dpcm") {
            Self::Dpcm
        } else if literal.ends_with("px") {
            Self::Px
        } else if literal.ends_with("mm") {
            Self::Mm
        } else if literal.ends_with("in") {
            Self::In
        } else if literal.contains('/') {
            Self::Ratio
        } else {
            Self::Text
        }
    }

    /// Returns true for the numeric domains.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Normalizes a raw value into this domain.
    #[must_use]
    pub fn normalize(self, raw: &str) -> Normalized {
        let number = match self {
            Self::Dpi => to_dpi(raw),
            Self::Dpcm => to_dpcm(raw),
            Self::Px => to_pixels(raw),
            Self::Mm => to_millimeters(raw),
            Self::In => to_inches(raw),
            Self::Ratio => to_decimal(raw),
            Self::Text => return Normalized::Text(strip_quotes(raw).to_string()),
        };
        number.map_or(Normalized::Invalid, Normalized::Number)
    }
}

/// A value brought into a comparable domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A numeric value in the unit's domain.
    Number(f64),
    /// An opaque string.
    Text(String),
    /// The value did not match the unit pattern.
    Invalid,
}

impl Normalized {
    /// Numeric view used by `min`/`max` comparisons.
    ///
    /// Text is read as a plain decimal number, so `(min-color: 8)` compares
    /// numerically. Anything unreadable yields `None`.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Self::Invalid => None,
        }
    }
}

fn unit_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)(dpi|dpcm|px|mm|in)$").expect("unit token pattern is valid"))
}

fn unit_value(raw: &str, unit: &str) -> Option<f64> {
    let caps = unit_regex().captures(raw)?;
    if &caps[2] != unit {
        return None;
    }
    caps[1].parse::<f64>().ok()
}

/// Numeric value of a `<digits>dpi` token.
#[must_use]
pub fn to_dpi(raw: &str) -> Option<f64> {
    unit_value(raw, "dpi")
}

/// Numeric value of a `<digits>dpcm` token, scaled into the dpi domain.
#[must_use]
pub fn to_dpcm(raw: &str) -> Option<f64> {
    unit_value(raw, "dpcm").map(|v| v * DPCM_TO_DPI)
}

/// Numeric value of a `<digits>px` token.
#[must_use]
pub fn to_pixels(raw: &str) -> Option<f64> {
    unit_value(raw, "px")
}

/// Numeric value of a `<digits>mm` token.
#[must_use]
pub fn to_millimeters(raw: &str) -> Option<f64> {
    unit_value(raw, "mm")
}

/// Numeric value of a `<digits>in` token.
#[must_use]
pub fn to_inches(raw: &str) -> Option<f64> {
    unit_value(raw, "in")
}

/// Reduces `numerator/denominator` to a decimal.
///
/// Both halves must be plain decimal numbers; a zero denominator or a value
/// without exactly one `/` yields `None`.
#[must_use]
pub fn to_decimal(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    if den.contains('/') {
        return None;
    }
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    if den == 0.0 {
        return None;
    }
    let ratio = num / den;
    ratio.is_finite().then_some(ratio)
}

/// Removes one matching pair of leading/trailing `'` or `"` quotes.
#[must_use]
pub fn strip_quotes(raw: &str) -> &str {
    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return &raw[1..raw.len() - 1];
        }
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_is_picked_from_literal_suffix() {
        assert_eq!(Unit::of_literal("300dpi"), Unit::Dpi);
        assert_eq!(Unit::of_literal("118dpcm"), Unit::Dpcm);
        assert_eq!(Unit::of_literal("100px"), Unit::Px);
        assert_eq!(Unit::of_literal("20mm"), Unit::Mm);
        assert_eq!(Unit::of_literal("2in"), Unit::In);
        assert_eq!(Unit::of_literal("16/9"), Unit::Ratio);
        assert_eq!(Unit::of_literal("portrait"), Unit::Text);
    }

    #[test]
    fn suffix_wins_over_shape() {
        // "landscape" is plain text, "plain" ends with "in".
        assert_eq!(Unit::of_literal("landscape"), Unit::Text);
        assert_eq!(Unit::of_literal("plain"), Unit::In);
    }

    #[test]
    fn dpcm_scales_into_dpi() {
        let v = to_dpcm("100dpcm").unwrap();
        assert!((v - 254.0).abs() < 1e-9);
    }

    #[test]
    fn unit_tokens_reject_other_units() {
        assert_eq!(to_pixels("100px"), Some(100.0));
        assert_eq!(to_pixels("100mm"), None);
        assert_eq!(to_pixels("1.5px"), None);
        assert_eq!(to_pixels(" 100px"), None);
        assert_eq!(to_inches("3in"), Some(3.0));
        assert_eq!(to_millimeters("3in"), None);
    }

    #[test]
    fn decimal_from_ratio() {
        assert_eq!(to_decimal("16/9"), Some(16.0 / 9.0));
        assert_eq!(to_decimal(" 4 / 2 "), Some(2.0));
        assert_eq!(to_decimal("1/0"), None);
        assert_eq!(to_decimal("a/b"), None);
        assert_eq!(to_decimal("1/2/3"), None);
        assert_eq!(to_decimal("12"), None);
    }

    #[test]
    fn strip_quotes_requires_matching_pair() {
        assert_eq!(strip_quotes("'dark'"), "dark");
        assert_eq!(strip_quotes("\"dark\""), "dark");
        assert_eq!(strip_quotes("'dark\""), "'dark\"");
        assert_eq!(strip_quotes("'"), "'");
        assert_eq!(strip_quotes("dark"), "dark");
    }

    #[test]
    fn invalid_values_normalize_to_invalid() {
        assert_eq!(Unit::Px.normalize("wide"), Normalized::Invalid);
        assert_eq!(Normalized::Invalid.as_number(), None);
        assert_eq!(Unit::Text.normalize("'8'").as_number(), Some(8.0));
        assert_eq!(Unit::Text.normalize("dark").as_number(), None);
    }
}
