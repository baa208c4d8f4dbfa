//! Input resolution: expand user-supplied paths into a list of local PDFs.
//!
//! Every input is validated here, before the run touches the network: a
//! missing file, an unreadable file, or a file without the `%PDF` magic
//! bytes fails the whole run up front rather than after half the batch has
//! been uploaded.

use crate::error::InvoiceError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check if the input string is a glob pattern rather than a plain path.
pub fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Resolve every input (file, directory, or glob) to a validated PDF path.
///
/// Directories contribute their `*.pdf` children in sorted order. Patterns
/// that match nothing contribute nothing; an explicit path that does not
/// exist is an error.
pub fn resolve_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PathBuf>, InvoiceError> {
    let mut resolved = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if is_pattern(input) {
            for path in expand_pattern(input)? {
                resolved.push(validate_pdf(&path)?);
            }
            continue;
        }

        let path = PathBuf::from(input);
        if path.is_dir() {
            let pattern = path.join("*.pdf");
            for child in expand_pattern(&pattern.to_string_lossy())? {
                resolved.push(validate_pdf(&child)?);
            }
        } else {
            resolved.push(validate_pdf(&path)?);
        }
    }
    debug!("Resolved {} input PDFs", resolved.len());
    Ok(resolved)
}

/// Resolve inputs that are saved analysis responses (`*.json`).
pub fn resolve_response_inputs<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PathBuf>, InvoiceError> {
    let mut resolved = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        let paths = if is_pattern(input) {
            expand_pattern(input)?
        } else if Path::new(input).is_dir() {
            expand_pattern(&Path::new(input).join("*.json").to_string_lossy())?
        } else {
            vec![PathBuf::from(input)]
        };
        for path in paths {
            if !path.is_file() {
                return Err(InvoiceError::FileNotFound { path });
            }
            resolved.push(path);
        }
    }
    Ok(resolved)
}

fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>, InvoiceError> {
    let paths = glob::glob(pattern).map_err(|e| InvoiceError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let mut out: Vec<PathBuf> = paths.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    out.sort();
    Ok(out)
}

/// Validate a local file: it exists, is readable, and starts with `%PDF`.
pub fn validate_pdf(path: &Path) -> Result<PathBuf, InvoiceError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(InvoiceError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            // A short or failed read leaves fewer than four bytes and is rejected.
            let mut magic = Vec::with_capacity(4);
            let _ = f.take(4).read_to_end(&mut magic);
            if magic.as_slice() != b"%PDF" {
                return Err(InvoiceError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(InvoiceError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(InvoiceError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_pdf(dir: &Path, name: &str) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, b"%PDF-1.4\n%%EOF\n").unwrap();
        p
    }

    #[test]
    fn test_is_pattern() {
        assert!(is_pattern("invoices/*.pdf"));
        assert!(is_pattern("inv-202?.pdf"));
        assert!(!is_pattern("/tmp/doc.pdf"));
        assert!(!is_pattern("doc.pdf"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_inputs(&["/definitely/not/here.pdf"]).unwrap_err();
        assert!(matches!(err, InvoiceError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("notes.pdf");
        fs::write(&p, b"hello world").unwrap();
        let err = validate_pdf(&p).unwrap_err();
        match err {
            InvoiceError::NotAPdf { magic, .. } => assert_eq!(magic, b"hell"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn short_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.pdf");
        fs::write(&empty, b"").unwrap();
        match validate_pdf(&empty).unwrap_err() {
            InvoiceError::NotAPdf { magic, .. } => assert!(magic.is_empty()),
            other => panic!("unexpected: {other}"),
        }

        let stub = dir.path().join("stub.pdf");
        fs::write(&stub, b"%PD").unwrap();
        match validate_pdf(&stub).unwrap_err() {
            InvoiceError::NotAPdf { magic, .. } => assert_eq!(magic, b"%PD"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn directory_expands_to_sorted_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        write_pdf(dir.path(), "b.pdf");
        write_pdf(dir.path(), "a.pdf");
        fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let found = resolve_inputs(&[dir.path().to_string_lossy()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn glob_expands_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        write_pdf(dir.path(), "inv-1.pdf");
        write_pdf(dir.path(), "inv-2.pdf");
        let pattern = dir.path().join("inv-*.pdf");
        let found = resolve_inputs(&[pattern.to_string_lossy()]).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn response_inputs_require_existing_files() {
        let err = resolve_response_inputs(&["/nope/response.json"]).unwrap_err();
        assert!(matches!(err, InvoiceError::FileNotFound { .. }));
    }
}
