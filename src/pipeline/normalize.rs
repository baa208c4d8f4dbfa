//! Cell normalisation: deterministic cleanup of recognised text.
//!
//! Recognised table cells are noisy in predictable ways:
//!
//! - line breaks inside a cell wherever the printed text wrapped
//! - runs of spaces, tabs and invisible Unicode between words
//! - currency symbols and thousands separators glued to amounts
//!
//! Text cells go through [`clean_cell`]; numeric cells additionally go
//! through [`clean_number`] so that quantities and prices reach the CSV as
//! plain decimal strings.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

// ── Text cells ───────────────────────────────────────────────────────────

static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}\u{00AD}]").unwrap());

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalise a text cell.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 2. Replace CR / LF and every whitespace run with a single space
/// 3. Trim both ends
pub fn clean_cell(input: &str) -> String {
    let s = RE_INVISIBLE.replace_all(input, "");
    let s = RE_WHITESPACE.replace_all(&s, " ");
    s.trim().to_string()
}

// ── Numeric cells ────────────────────────────────────────────────────────

/// First number-looking token. A decimal-comma amount (`3,50`) is tried
/// before the general form: optional sign, digits with optional thousands
/// commas, optional fraction.
static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+,\d{1,2}\b|-?\d+(?:,\d{3})*(?:\.\d+)?").unwrap());

/// Normalise a numeric cell to a plain decimal string.
///
/// `"$3.50"` → `"3.50"`, `"S$ 1,234.00"` → `"1234.00"`, `"2 pcs"` → `"2"`,
/// `"3,50"` → `"3.50"`. Cells without any number are returned cleaned but
/// otherwise unchanged; nothing is rejected.
pub fn clean_number(input: &str) -> String {
    let text = clean_cell(input);
    let Some(m) = RE_NUMBER.find(&text) else {
        return text;
    };
    let token = m.as_str();

    let normalised = if !token.contains('.') && is_decimal_comma(token) {
        token.replace(',', ".")
    } else {
        token.replace(',', "")
    };

    match Decimal::from_str(&normalised) {
        Ok(_) => normalised,
        Err(_) => text,
    }
}

/// `12,5` and `3,50` use a decimal comma; `1,234` groups thousands.
fn is_decimal_comma(token: &str) -> bool {
    match token.rsplit_once(',') {
        Some((_, frac)) => token.matches(',').count() == 1 && (1..=2).contains(&frac.len()),
        None => false,
    }
}

/// Parse an already-normalised numeric cell.
pub fn parse_decimal(input: &str) -> Option<Decimal> {
    if input.is_empty() {
        return None;
    }
    Decimal::from_str(input).ok()
}
