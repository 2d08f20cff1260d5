//! Upload entry point: argument checks, one helper per call, result classification.

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::client::BlobUploadClient;
use crate::error::{Result, UploadError};
use crate::types::{BlobStorageInfo, UploadConfig, UploadReport};

/// Performs the upload of a file list into a container
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload_files_to_container(
        &self,
        file_names: &[String],
        directory_path: &Path,
        virtual_directory_path: &str,
        cancel_token: &CancellationToken,
    ) -> Result<UploadReport>;
}

/// Builds the uploader used for a single call
pub trait UploaderFactory {
    type Uploader: FileUploader;

    fn create(&self, blob_info: &BlobStorageInfo, max_concurrency: usize)
    -> Result<Self::Uploader>;
}

#[async_trait]
impl FileUploader for BlobUploadClient {
    async fn upload_files_to_container(
        &self,
        file_names: &[String],
        directory_path: &Path,
        virtual_directory_path: &str,
        cancel_token: &CancellationToken,
    ) -> Result<UploadReport> {
        Ok(BlobUploadClient::upload_files_to_container(
            self,
            file_names,
            directory_path,
            virtual_directory_path,
            cancel_token,
        )
        .await)
    }
}

/// Factory producing `BlobUploadClient`s that talk to Azure Blob Storage
#[derive(Debug, Clone, Default)]
pub struct AzureBlobUploaderFactory {
    pub config: UploadConfig,
}

impl AzureBlobUploaderFactory {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }
}

impl UploaderFactory for AzureBlobUploaderFactory {
    type Uploader = BlobUploadClient;

    fn create(&self, blob_info: &BlobStorageInfo, max_concurrency: usize) -> Result<BlobUploadClient> {
        BlobUploadClient::new(blob_info, max_concurrency, self.config.clone())
    }
}

/// Uploads `file_names` from `directory_path` using the default Azure uploader
///
/// See [`upload_files_to_container_with`].
pub async fn upload_files_to_container(
    blob_info: Option<&BlobStorageInfo>,
    max_concurrency: usize,
    file_names: Option<&[String]>,
    directory_path: Option<&Path>,
    cancel_token: &CancellationToken,
) -> Result<UploadReport> {
    upload_files_to_container_with(
        &AzureBlobUploaderFactory::default(),
        blob_info,
        max_concurrency,
        file_names,
        directory_path,
        cancel_token,
    )
    .await
}

/// Uploads `file_names` from `directory_path` into the container described by `blob_info`
///
/// The blob info, concurrency and file list are checked before anything else
/// happens; on a violation no uploader is created. Exactly one uploader is
/// created per call and dropped when the call returns.
///
/// # Errors
///
/// - `InvalidArgument` if an argument is missing or `max_concurrency` is zero
/// - Any error raised while creating the uploader or uploading
/// - `Authentication` if every failed file was rejected by storage
/// - `PartialFailure` if any other file did not upload
pub async fn upload_files_to_container_with<F: UploaderFactory>(
    factory: &F,
    blob_info: Option<&BlobStorageInfo>,
    max_concurrency: usize,
    file_names: Option<&[String]>,
    directory_path: Option<&Path>,
    cancel_token: &CancellationToken,
) -> Result<UploadReport> {
    let (blob_info, file_names, directory_path) = match (blob_info, file_names, directory_path) {
        (Some(blob_info), Some(file_names), Some(directory_path)) if max_concurrency != 0 => {
            (blob_info, file_names, directory_path)
        }
        _ => {
            warn!("Upload rejected: missing blob info, file list, directory or concurrency");
            return Err(UploadError::InvalidArgument(
                "blob info, file names and directory path are required and max_concurrency must be non-zero"
                    .to_string(),
            ));
        }
    };

    let uploader = factory.create(blob_info, max_concurrency)?;
    let report = uploader
        .upload_files_to_container(
            file_names,
            directory_path,
            &blob_info.virtual_directory_path,
            cancel_token,
        )
        .await?;

    classify(report)
}

/// Boolean view of [`upload_files_to_container`]: true only if every file uploaded
pub async fn upload_files_to_container_succeeded(
    blob_info: Option<&BlobStorageInfo>,
    max_concurrency: usize,
    file_names: Option<&[String]>,
    directory_path: Option<&Path>,
) -> bool {
    match upload_files_to_container(
        blob_info,
        max_concurrency,
        file_names,
        directory_path,
        &CancellationToken::new(),
    )
    .await
    {
        Ok(_) => true,
        Err(e) => {
            error!("Upload failed: {}", e);
            false
        }
    }
}

fn classify(report: UploadReport) -> Result<UploadReport> {
    if report.is_complete() {
        debug!("All {} files uploaded", report.total);
        return Ok(report);
    }

    if report.failed.is_empty() && !report.cancelled.is_empty() {
        return Err(UploadError::Cancelled);
    }

    let rejected = !report.failed.is_empty()
        && report.failed.iter().all(|f| f.error.is_authentication());
    if rejected {
        let status = match &report.failed[0].error {
            UploadError::Authentication { status, .. } => *status,
            _ => 403,
        };
        return Err(UploadError::Authentication {
            status,
            message: format!("storage rejected the credential for {} files", report.failed.len()),
        });
    }

    // An uploader's report may disagree with its own `total`
    let unfinished = report.failed.len() + report.cancelled.len();
    let failed = unfinished.max(report.total.saturating_sub(report.completed.len()));
    Err(UploadError::PartialFailure {
        failed,
        total: report.total.max(report.completed.len() + unfinished),
    })
}
