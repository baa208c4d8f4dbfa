//! Result mapping: analysis response → [`InvoiceRecord`]s.
//!
//! Two things are looked up in the response:
//!
//! 1. **The invoice date** — the first form key containing the date marker
//!    whose value parses with one of the configured formats. Invoices carry
//!    several dates (issue, delivery, due) that lie within days of each
//!    other, so the first parseable one is used for every row.
//! 2. **The line-item tables** — every table whose first row contains the
//!    table marker, not only the first one. Invoices spanning several pages
//!    produce one such table per page; their rows are concatenated in
//!    document order.
//!
//! Nothing here raises on missing data: an unrecognised column or date
//! becomes an empty string. The only hard failure is the absence of any
//! line-item table, since the file would otherwise silently yield no rows.

use crate::config::FieldLabels;
use crate::error::InvoiceError;
use crate::labels::{normalise_label, Field};
use crate::output::InvoiceRecord;
use crate::pipeline::normalize::{clean_cell, clean_number, parse_decimal};
use crate::pipeline::response::{AnalysisDocument, Table};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Records and metadata mapped from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedInvoice {
    pub invoice_date: Option<NaiveDate>,
    pub records: Vec<InvoiceRecord>,
}

/// Map a whole document. `source_name` is only used in errors and logs.
pub fn map_document(
    doc: &AnalysisDocument,
    labels: &FieldLabels,
    source_name: &str,
) -> Result<MappedInvoice, InvoiceError> {
    let invoice_date = locate_invoice_date(doc, labels);
    if invoice_date.is_none() {
        warn!("{}: no invoice date recognised", source_name);
    }
    let date_str = invoice_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let tables = doc.tables();
    let indices = locate_line_item_tables(&tables, &labels.table_marker);
    if indices.is_empty() {
        return Err(InvoiceError::TableNotFound {
            source_name: source_name.to_string(),
            marker: labels.table_marker.clone(),
        });
    }
    debug!(
        "{}: {} tables, line items in {:?}",
        source_name,
        tables.len(),
        indices
    );

    let mut records = Vec::new();
    for idx in indices {
        records.extend(map_table(&tables[idx], labels, &date_str));
    }

    Ok(MappedInvoice {
        invoice_date,
        records,
    })
}

/// First parseable date among keys containing the date marker.
pub fn locate_invoice_date(doc: &AnalysisDocument, labels: &FieldLabels) -> Option<NaiveDate> {
    let marker = normalise_label(&labels.date_key_marker);
    doc.key_values()
        .into_iter()
        .filter(|kv| normalise_label(&kv.key).contains(&marker))
        .find_map(|kv| parse_date(&kv.value, &labels.date_formats))
}

/// Parse a date value with each format in turn.
///
/// Leading separators left over from the key (`": 23 June, 2018"`) are
/// stripped first.
pub fn parse_date(value: &str, formats: &[String]) -> Option<NaiveDate> {
    let cleaned = clean_cell(value);
    let value = cleaned.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

/// Indices of the tables whose first row contains `marker`.
pub fn locate_line_item_tables(tables: &[Table], marker: &str) -> Vec<usize> {
    let marker = normalise_label(marker);
    tables
        .iter()
        .enumerate()
        .filter(|(_, t)| {
            t.rows.first().is_some_and(|row| {
                row.iter()
                    .any(|cell| normalise_label(&clean_cell(cell)).contains(&marker))
            })
        })
        .map(|(i, _)| i)
        .collect()
}

/// Map header cells to output fields.
///
/// Exact alias matches are resolved for every field before substring
/// matches, and each header cell is claimed by at most one field.
pub fn resolve_columns(header: &[String], labels: &FieldLabels) -> HashMap<Field, usize> {
    let headers: Vec<String> = header
        .iter()
        .map(|h| normalise_label(&clean_cell(h)))
        .collect();
    let mut taken = vec![false; headers.len()];
    let mut columns = HashMap::new();

    let exact = |h: &str, a: &str| h == a;
    let partial = |h: &str, a: &str| !h.is_empty() && h.contains(a);

    for matches in [&exact as &dyn Fn(&str, &str) -> bool, &partial] {
        for field in Field::ALL {
            if columns.contains_key(&field) {
                continue;
            }
            let hit = labels.aliases(field).iter().find_map(|alias| {
                let alias = normalise_label(alias);
                if alias.is_empty() {
                    return None;
                }
                headers
                    .iter()
                    .enumerate()
                    .position(|(i, h)| !taken[i] && matches(h.as_str(), alias.as_str()))
            });
            if let Some(i) = hit {
                taken[i] = true;
                columns.insert(field, i);
            }
        }
    }

    columns
}

/// One record per non-empty data row of a line-item table.
fn map_table(table: &Table, labels: &FieldLabels, invoice_date: &str) -> Vec<InvoiceRecord> {
    let Some((header, rows)) = table.rows.split_first() else {
        return Vec::new();
    };
    let columns = resolve_columns(header, labels);
    debug!("Column mapping: {:?}", columns);

    let cell = |row: &[String], field: Field| -> String {
        columns
            .get(&field)
            .and_then(|&i| row.get(i))
            .map(|s| s.as_str())
            .unwrap_or("")
            .to_string()
    };

    rows.iter()
        .filter(|row| row.iter().any(|c| !clean_cell(c).is_empty()))
        .map(|row| {
            let row = row.as_slice();
            let description = clean_cell(&cell(row, Field::Description));
            let quantity = clean_number(&cell(row, Field::Quantity));
            let unit_price = clean_number(&cell(row, Field::UnitPrice));
            let mut line_total = clean_number(&cell(row, Field::LineTotal));
            if line_total.is_empty() {
                line_total = computed_total(&quantity, &unit_price).unwrap_or_default();
            }
            InvoiceRecord::new(description, quantity, unit_price, line_total, invoice_date)
        })
        .collect()
}

/// `quantity × unit_price`, or `None` when either is not a number or the
/// product does not fit in a `Decimal`.
fn computed_total(quantity: &str, unit_price: &str) -> Option<String> {
    let q = parse_decimal(quantity)?;
    let p = parse_decimal(unit_price)?;
    match q.checked_mul(p) {
        Some(total) => Some(total.to_string()),
        None => {
            warn!("line total overflows: {} x {}", quantity, unit_price);
            None
        }
    }
}
