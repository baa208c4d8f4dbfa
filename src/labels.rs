//! Field labels used to locate invoice data in an analysis response.
//!
//! Invoice layouts differ between vendors: the quantity column may be titled
//! "Qty", "Quantity" or "Units", the date key "Invoice Date" or "Issue date".
//! Every label the mapper looks for lives here, and every list can be
//! overridden through [`crate::config::FieldLabels`] (or the `[labels]`
//! table of the TOML config) without recompiling.

use serde::{Deserialize, Serialize};

/// Marker searched for in the first row of each table to find the line items.
pub const DEFAULT_TABLE_MARKER: &str = "product name";

/// Substring a form key must contain to be considered a date candidate.
pub const DEFAULT_DATE_KEY_MARKER: &str = "date";

/// `chrono` formats tried, in order, on every date candidate.
///
/// Seen in the wild as:
/// `DELIVERY TIME : Friday, 22 June, 2018`,
/// `Invoice Date: : 23 June, 2018`,
/// `Issue date: 2019-10-31`.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%d %B, %Y", "%A, %d %B, %Y", "%Y-%m-%d"];

pub const DEFAULT_DESCRIPTION_ALIASES: &[&str] =
    &["product name", "description", "item description", "item", "product"];

pub const DEFAULT_QUANTITY_ALIASES: &[&str] = &["quantity", "qty", "units", "qty."];

pub const DEFAULT_UNIT_PRICE_ALIASES: &[&str] =
    &["unit price", "price", "unit cost", "rate", "price per unit"];

pub const DEFAULT_LINE_TOTAL_ALIASES: &[&str] =
    &["line total", "total price", "amount", "total", "subtotal"];

/// The output columns a table header can be mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Description,
    Quantity,
    UnitPrice,
    LineTotal,
}

impl Field {
    /// Resolution order. Ties in substring matching go to the earlier field.
    pub const ALL: [Field; 4] = [
        Field::Description,
        Field::Quantity,
        Field::UnitPrice,
        Field::LineTotal,
    ];
}

/// Normalise a label for comparison: lowercase, whitespace collapsed,
/// trailing colons dropped.
pub fn normalise_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(':')
        .trim_end()
        .to_lowercase()
}

pub(crate) fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
