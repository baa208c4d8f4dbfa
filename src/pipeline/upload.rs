//! Upload stage: copy a local PDF to remote object storage.
//!
//! The analysis service reads documents from object storage, never from the
//! request body, so each invoice is first copied to
//! `remote_upload_path + file name`. The transfer itself sits behind the
//! [`ObjectStore`] trait; the S3 implementation lives in [`crate::aws`].

use crate::error::InvoiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

/// A configured upload destination, `s3://bucket/prefix`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePrefix {
    pub bucket: String,
    /// Key prefix, empty or ending in `/` once normalised.
    pub prefix: String,
}

impl RemotePrefix {
    /// Parse `s3://bucket` or `s3://bucket/some/prefix`.
    ///
    /// A non-empty prefix always gains a trailing `/` so that file names are
    /// appended as a new path segment.
    pub fn parse(path: &str) -> Result<Self, InvoiceError> {
        let invalid = |reason: &str| InvoiceError::InvalidRemotePath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let rest = path
            .trim()
            .strip_prefix("s3://")
            .ok_or_else(|| invalid("expected an s3://bucket/prefix URL"))?;
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(invalid("bucket name is empty"));
        }
        if bucket.contains(char::is_whitespace) {
            return Err(invalid("bucket name contains whitespace"));
        }

        let prefix = prefix.trim_start_matches('/');
        let prefix = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };

        Ok(Self {
            bucket: bucket.to_string(),
            prefix,
        })
    }

    /// The object location a local file is uploaded to.
    pub fn location_for(&self, local: &Path) -> RemoteLocation {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        RemoteLocation {
            bucket: self.bucket.clone(),
            key: format!("{}{}", self.prefix, name),
        }
    }
}

/// One object in remote storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteLocation {
    pub bucket: String,
    pub key: String,
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Remote object storage the analysis service can read from.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy `local` to `destination`.
    ///
    /// Implementations map transport and authorisation failures to
    /// [`InvoiceError::UploadFailed`].
    async fn upload(&self, local: &Path, destination: &RemoteLocation) -> Result<(), InvoiceError>;
}

/// Read a local file for transfer, mapping failures to input errors.
pub async fn read_local(path: &Path) -> Result<Vec<u8>, InvoiceError> {
    tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => InvoiceError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => InvoiceError::FileNotFound {
            path: path.to_path_buf(),
        },
    })
}

/// Upload one validated PDF under the configured prefix.
pub async fn upload_file(
    store: &dyn ObjectStore,
    prefix: &RemotePrefix,
    local: &Path,
) -> Result<RemoteLocation, InvoiceError> {
    if prefix.bucket.is_empty() {
        return Err(InvoiceError::InvalidRemotePath {
            path: String::new(),
            reason: "no upload bucket configured".into(),
        });
    }
    let destination = prefix.location_for(local);
    info!("Uploading {} → {}", local.display(), destination);
    store.upload(local, &destination).await?;
    Ok(destination)
}
