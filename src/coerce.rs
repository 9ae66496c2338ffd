//! Numeric coercion for noisy text fields and the crore → rupee derivation.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// One crore, the unit listed prices are quoted in.
pub const CRORE: f64 = 10_000_000.0;

const DIGIT_GROUP_SEPARATOR: char = ',';

fn amount_regex() -> &'static Regex {
    static AMOUNT: OnceLock<Regex> = OnceLock::new();
    AMOUNT.get_or_init(|| {
        Regex::new(r"[-+]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)").expect("amount pattern compiles")
    })
}

/// A row whose designated numeric field held no parseable amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoercionGap {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    pub raw: String,
}

/// Extracts the first decimal amount from `raw` after dropping digit-group separators.
///
/// Returns `None` when the text holds no digits or the amount overflows `f64`.
pub fn coerce_amount(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| *c != DIGIT_GROUP_SEPARATOR).collect();
    let found = amount_regex().find(&compact)?;
    found
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Converts a crore-scale amount to single rupees, propagating absence.
pub fn to_base_currency(amount: Option<f64>) -> Option<f64> {
    amount.map(|value| value * CRORE)
}

/// Renders a number in plain decimal form; integral values keep one fractional digit.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

pub fn format_optional(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}
