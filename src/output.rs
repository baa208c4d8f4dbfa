//! Output types: CSV records and per-run statistics.

use crate::error::FileError;
use crate::pipeline::extract::ExtractionJob;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Column header of the output CSV, in write order.
pub const CSV_HEADER: [&str; 5] = [
    "description",
    "quantity",
    "unit_price",
    "line_total",
    "invoice_date",
];

/// One invoice line item plus the invoice-level date.
///
/// Values are the normalised strings that end up in the CSV; a field that
/// could not be recognised is an empty string. Records are built by the
/// mapper and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    description: String,
    quantity: String,
    unit_price: String,
    line_total: String,
    invoice_date: String,
}

impl InvoiceRecord {
    pub fn new(
        description: impl Into<String>,
        quantity: impl Into<String>,
        unit_price: impl Into<String>,
        line_total: impl Into<String>,
        invoice_date: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            quantity: quantity.into(),
            unit_price: unit_price.into(),
            line_total: line_total.into(),
            invoice_date: invoice_date.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn quantity(&self) -> &str {
        &self.quantity
    }

    pub fn unit_price(&self) -> &str {
        &self.unit_price
    }

    pub fn line_total(&self) -> &str {
        &self.line_total
    }

    pub fn invoice_date(&self) -> &str {
        &self.invoice_date
    }

    /// Field values in [`CSV_HEADER`] order.
    pub fn as_row(&self) -> [&str; 5] {
        [
            &self.description,
            &self.quantity,
            &self.unit_price,
            &self.line_total,
            &self.invoice_date,
        ]
    }
}

/// Outcome of processing one input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResult {
    /// The input (PDF or saved response).
    pub path: PathBuf,
    /// The finished analysis job, if one was submitted.
    pub job: Option<ExtractionJob>,
    /// Rows appended to the CSV. Zero when `error` is set.
    pub records_written: usize,
    /// Whether an invoice date was recognised.
    pub date_found: bool,
    /// Wall-clock time for this file in milliseconds.
    pub duration_ms: u64,
    /// The failure, if any; no rows were written for this file.
    pub error: Option<FileError>,
}

impl FileResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub records_written: usize,
    pub files_without_date: usize,
    pub total_duration_ms: u64,
}

/// Complete result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub output_csv: PathBuf,
    pub files: Vec<FileResult>,
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_follows_header_order() {
        let r = InvoiceRecord::new("Bread", "2", "2.00", "4.00", "2024-03-01");
        assert_eq!(r.as_row(), ["Bread", "2", "2.00", "4.00", "2024-03-01"]);
        assert_eq!(CSV_HEADER[3], "line_total");
    }

    #[test]
    fn report_is_json_serialisable() {
        let report = RunReport {
            output_csv: "out.csv".into(),
            files: vec![FileResult {
                path: "a.pdf".into(),
                job: None,
                records_written: 2,
                date_found: true,
                duration_ms: 12,
                error: None,
            }],
            stats: RunStats {
                total_files: 1,
                processed_files: 1,
                records_written: 2,
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"records_written\":2"));
    }
}
