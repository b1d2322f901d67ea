//! Leading-number extraction for free-form ingredient quantities.
//!
//! Accepted forms are a decimal (`2`, `1.5`) or a simple fraction (`1/2`),
//! optionally followed by whitespace and a unit or description. Anything
//! else is reported as not parseable and must be shown verbatim. The number
//! must be the first character; leading whitespace is not skipped.

use regex::Regex;
use std::sync::LazyLock;

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:(?P<num>\d+)/(?P<den>\d+)|(?P<dec>\d+(?:\.\d+)?))\s*(?P<rest>.*)$")
        .expect("quantity pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuantity {
    pub magnitude: f64,
    pub unit: String,
}

/// Returns `None` when the string has no usable leading number, including
/// fractions with a zero denominator.
pub fn parse_quantity(quantity: &str) -> Option<ParsedQuantity> {
    let caps = QUANTITY_RE.captures(quantity)?;

    let magnitude = match (caps.name("num"), caps.name("den"), caps.name("dec")) {
        (Some(num), Some(den), _) => {
            let numerator: f64 = num.as_str().parse().ok()?;
            let denominator: f64 = den.as_str().parse().ok()?;
            if denominator == 0.0 {
                return None;
            }
            numerator / denominator
        }
        (_, _, Some(dec)) => dec.as_str().parse().ok()?,
        _ => return None,
    };

    if !magnitude.is_finite() {
        return None;
    }

    let unit = caps
        .name("rest")
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Some(ParsedQuantity { magnitude, unit })
}
