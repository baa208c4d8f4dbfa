//! CSV output: append records to a single file, header once.
//!
//! A [`CsvSink`] is opened once per run and shared by every input file, so
//! the header row is written at most once no matter how many invoices are
//! processed. The file is opened in append mode and the header is only
//! written when the file is empty, so re-running the tool adds a second set
//! of rows below the first instead of overwriting it.

use crate::error::InvoiceError;
use crate::output::{InvoiceRecord, CSV_HEADER};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only CSV writer for [`InvoiceRecord`]s.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
    header_written: bool,
    rows_written: usize,
}

impl CsvSink {
    /// Open (or create) `path` for appending, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, InvoiceError> {
        let io_err = |source| InvoiceError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;
        let existing_len = file.metadata().map_err(io_err)?.len();

        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        debug!(
            "Opened {} for appending ({} bytes present)",
            path.display(),
            existing_len
        );

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            header_written: existing_len > 0,
            rows_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this sink (header excluded).
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Append all `records`, preceded by the header if the file was empty.
    ///
    /// Records of one file are flushed together; an empty slice writes
    /// nothing, not even the header.
    pub fn append(&mut self, records: &[InvoiceRecord]) -> Result<(), InvoiceError> {
        if records.is_empty() {
            return Ok(());
        }
        if !self.header_written {
            self.writer
                .write_record(CSV_HEADER)
                .map_err(|e| self.csv_err(e))?;
            self.header_written = true;
        }
        for record in records {
            self.writer
                .write_record(record.as_row())
                .map_err(|e| self.csv_err(e))?;
        }
        self.writer.flush().map_err(|e| InvoiceError::OutputWriteFailed {
            path: self.path.clone(),
            source: e,
        })?;
        self.rows_written += records.len();
        Ok(())
    }

    fn csv_err(&self, source: csv::Error) -> InvoiceError {
        InvoiceError::CsvWriteFailed {
            path: self.path.clone(),
            source,
        }
    }
}
