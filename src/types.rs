use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::error::UploadError;
use crate::retry::RetryPolicy;

/// Connection information for uploading a set of blobs to Azure Blob Storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStorageInfo {
    /// Virtual hierarchy for the blobs
    pub virtual_directory_path: String,
    /// Combined SAS URI and SAS token for connecting to storage
    pub storage_sas_credential: String,
}

impl BlobStorageInfo {
    pub fn new(
        virtual_directory_path: impl Into<String>,
        storage_sas_credential: impl Into<String>,
    ) -> Self {
        Self {
            virtual_directory_path: virtual_directory_path.into(),
            storage_sas_credential: storage_sas_credential.into(),
        }
    }
}

/// Configuration for blob upload operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Size of each staged block in bytes
    pub block_size: usize,
    /// Files up to this size are sent with a single Put Blob request
    pub single_upload_threshold: u64,
    /// Timeout applied to every HTTP request
    pub request_timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for UploadConfig {
    /// - block_size: 4 MiB
    /// - single_upload_threshold: 32 MiB
    /// - request_timeout_secs: 300
    fn default() -> Self {
        Self {
            block_size: 4 * 1024 * 1024,
            single_upload_threshold: 32 * 1024 * 1024,
            request_timeout_secs: 300,
            retry: RetryPolicy::default(),
        }
    }
}

impl UploadConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        let config: UploadConfig =
            serde_json::from_str(json).context("failed to parse upload config")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read upload config {}", path.display()))?;
        Self::from_json(&json)
    }

    pub(crate) fn validate(&self) -> Result<(), UploadError> {
        if self.block_size == 0 {
            return Err(UploadError::InvalidArgument(
                "block_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a single file transfer
#[derive(Debug, Clone, PartialEq)]
pub enum FileTransferOperationResult {
    /// Transfer completed successfully
    Completed(FileTransferProgress),
    /// Transfer was cancelled before the blob was committed
    Cancelled { src_file: String, dest_file: String },
}

/// Progress information for a completed file transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileTransferProgress {
    /// Local source file path
    pub src_file: String,
    /// Destination blob URL, without the SAS token
    pub dest_file: String,
    /// Total size of the file in bytes
    pub file_size: u64,
    /// Percentage of transfer completed (0.0 to 100.0)
    pub percentage_progress: f64,
}

/// A file that could not be uploaded
#[derive(Debug)]
pub struct FailedUpload {
    pub file_name: String,
    pub error: UploadError,
}

/// Outcome of one upload call across all requested files
#[derive(Debug, Default)]
pub struct UploadReport {
    pub completed: Vec<FileTransferProgress>,
    pub failed: Vec<FailedUpload>,
    pub cancelled: Vec<String>,
    /// Number of files the caller asked to upload
    pub total: usize,
}

impl UploadReport {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub(crate) fn record(
        &mut self,
        file_name: &str,
        result: Result<FileTransferOperationResult, UploadError>,
    ) {
        match result {
            Ok(FileTransferOperationResult::Completed(progress)) => self.completed.push(progress),
            Ok(FileTransferOperationResult::Cancelled { .. }) | Err(UploadError::Cancelled) => {
                self.cancelled.push(file_name.to_string())
            }
            Err(error) => self.failed.push(FailedUpload {
                file_name: file_name.to_string(),
                error,
            }),
        }
    }

    /// True only when every requested file was uploaded
    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.total && self.failed.is_empty() && self.cancelled.is_empty()
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.completed.iter().map(|p| p.file_size).sum()
    }
}

/// Internal configuration wrapper with Arc for shared ownership
#[derive(Debug, Clone)]
pub(crate) struct UploadConfigArc {
    pub(crate) inner: Arc<UploadConfig>,
}

impl From<UploadConfig> for UploadConfigArc {
    fn from(config: UploadConfig) -> Self {
        Self {
            inner: Arc::new(config),
        }
    }
}

impl std::ops::Deref for UploadConfigArc {
    type Target = UploadConfig;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
