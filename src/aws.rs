//! AWS backends: S3 for uploads, Textract for document analysis.
//!
//! Both clients are built from one shared SDK configuration, resolved the
//! usual AWS way (environment, shared config files, instance metadata) and
//! narrowed by the optional `aws_profile` / `aws_region` settings.
//!
//! Enabled by the default `aws` feature.

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::pipeline::extract::{DocumentAnalyzer, JobStatus};
use crate::pipeline::response::{RawBlock, RawRelationship, RawResponse};
use crate::pipeline::upload::{read_local, ObjectStore, RemoteLocation};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_textract::types::{
    Block, DocumentLocation, FeatureType, JobStatus as TextractJobStatus, S3Object,
};
use std::path::Path;
use tracing::debug;

/// Load the shared SDK configuration for the configured profile and region.
pub async fn load_sdk_config(config: &ExtractionConfig) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(ref profile) = config.aws_profile {
        loader = loader.profile_name(profile);
    }
    if let Some(ref region) = config.aws_region {
        loader = loader.region(Region::new(region.clone()));
    }
    loader.load().await
}

// ── S3 ───────────────────────────────────────────────────────────────────

/// [`ObjectStore`] backed by S3 `PutObject`.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, local: &Path, destination: &RemoteLocation) -> Result<(), InvoiceError> {
        let bytes = read_local(local).await?;
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&destination.bucket)
            .key(&destination.key)
            .content_type("application/pdf")
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| InvoiceError::UploadFailed {
                path: local.to_path_buf(),
                destination: destination.to_string(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        debug!("Uploaded {} bytes to {}", size, destination);
        Ok(())
    }
}

// ── Textract ─────────────────────────────────────────────────────────────

/// [`DocumentAnalyzer`] backed by Textract asynchronous document analysis
/// with the `TABLES` and `FORMS` features.
pub struct TextractAnalyzer {
    client: aws_sdk_textract::Client,
}

impl TextractAnalyzer {
    pub fn new(sdk: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_textract::Client::new(sdk),
        }
    }
}

fn request_failed(location: impl ToString, reason: String) -> InvoiceError {
    InvoiceError::AnalysisRequestFailed {
        location: location.to_string(),
        reason,
    }
}

#[async_trait]
impl DocumentAnalyzer for TextractAnalyzer {
    async fn start_analysis(&self, source: &RemoteLocation) -> Result<String, InvoiceError> {
        let location = DocumentLocation::builder()
            .s3_object(
                S3Object::builder()
                    .bucket(&source.bucket)
                    .name(&source.key)
                    .build(),
            )
            .build();

        let out = self
            .client
            .start_document_analysis()
            .document_location(location)
            .feature_types(FeatureType::Tables)
            .feature_types(FeatureType::Forms)
            .send()
            .await
            .map_err(|e| request_failed(source, DisplayErrorContext(&e).to_string()))?;

        out.job_id()
            .map(str::to_string)
            .ok_or_else(|| request_failed(source, "service returned no job id".into()))
    }

    async fn job_status(&self, job_id: &str) -> Result<JobStatus, InvoiceError> {
        let out = self
            .client
            .get_document_analysis()
            .job_id(job_id)
            .max_results(1)
            .send()
            .await
            .map_err(|e| request_failed(job_id, DisplayErrorContext(&e).to_string()))?;

        let message = out.status_message().unwrap_or_default();
        let status = match out.job_status() {
            Some(TextractJobStatus::Succeeded) => JobStatus::Succeeded,
            Some(TextractJobStatus::Failed) => JobStatus::Failed {
                reason: if message.is_empty() {
                    "analysis failed".to_string()
                } else {
                    message.to_string()
                },
            },
            // Some pages could not be analysed; a file is all or nothing.
            Some(TextractJobStatus::PartialSuccess) => JobStatus::Failed {
                reason: format!("partial success: {message}"),
            },
            _ => JobStatus::InProgress,
        };
        Ok(status)
    }

    async fn fetch_result(&self, job_id: &str) -> Result<RawResponse, InvoiceError> {
        let mut response = RawResponse::default();
        let mut next_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let out = self
                .client
                .get_document_analysis()
                .job_id(job_id)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| request_failed(job_id, DisplayErrorContext(&e).to_string()))?;

            pages += 1;
            response.job_status = out.job_status().map(|s| s.as_str().to_string());
            response.status_message = out.status_message().map(str::to_string);
            response.blocks.extend(out.blocks().iter().map(convert_block));

            match out.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(
            "Job {}: fetched {} blocks in {} result pages",
            job_id,
            response.blocks.len(),
            pages
        );
        Ok(response)
    }
}

/// SDK block → wire-shape block, so SDK and saved-JSON responses share one
/// code path from here on.
fn convert_block(b: &Block) -> RawBlock {
    RawBlock {
        block_type: b
            .block_type()
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        id: b.id().unwrap_or_default().to_string(),
        text: b.text().map(str::to_string),
        relationships: b
            .relationships()
            .iter()
            .map(|r| RawRelationship {
                kind: r.r#type().map(|t| t.as_str().to_string()).unwrap_or_default(),
                ids: r.ids().to_vec(),
            })
            .collect(),
        entity_types: b
            .entity_types()
            .iter()
            .map(|t| t.as_str().to_string())
            .collect(),
        row_index: b.row_index().and_then(|i| u32::try_from(i).ok()),
        column_index: b.column_index().and_then(|i| u32::try_from(i).ok()),
        selection_status: b.selection_status().map(|s| s.as_str().to_string()),
        page: b.page().and_then(|p| u32::try_from(p).ok()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_textract::types::{BlockType, EntityType, Relationship, RelationshipType};

    #[test]
    fn convert_block_keeps_structure() {
        let sdk_block = Block::builder()
            .block_type(BlockType::KeyValueSet)
            .id("k1")
            .entity_types(EntityType::Key)
            .relationships(
                Relationship::builder()
                    .r#type(RelationshipType::Value)
                    .ids("v1")
                    .build(),
            )
            .row_index(-1)
            .page(2)
            .build();

        let raw = convert_block(&sdk_block);
        assert_eq!(raw.block_type, "KEY_VALUE_SET");
        assert_eq!(raw.id, "k1");
        assert_eq!(raw.entity_types, vec!["KEY"]);
        assert_eq!(raw.relationships[0].kind, "VALUE");
        assert_eq!(raw.relationships[0].ids, vec!["v1"]);
        assert_eq!(raw.row_index, None);
        assert_eq!(raw.page, Some(2));
    }
}
