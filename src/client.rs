use std::path::Path;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::credential::{SasCredential, blob_name};
use crate::error::{Result, UploadError};
use crate::operations::upload;
use crate::types::{
    BlobStorageInfo, FileTransferOperationResult, UploadConfig, UploadConfigArc, UploadReport,
};

/// Client for uploading local files into one blob storage container
///
/// One client is built per upload call. It owns its HTTP client, so dropping
/// it releases every connection it opened.
#[derive(Debug)]
pub struct BlobUploadClient {
    pub(crate) http: reqwest::Client,
    pub(crate) credential: SasCredential,
    pub(crate) config: UploadConfigArc,
    pub(crate) max_concurrency: usize,
}

impl BlobUploadClient {
    /// Creates a client for the container named by the SAS credential
    ///
    /// # Arguments
    ///
    /// * `blob_info` - Virtual directory and combined SAS URI + token
    /// * `max_concurrency` - Maximum number of block requests in flight per file
    /// * `config` - Transfer tuning (block size, thresholds, retry)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if:
    /// - `max_concurrency` is zero
    /// - The SAS credential is malformed
    /// - The configuration is invalid
    ///
    /// # Example
    ///
    /// ```ignore
    /// let info = BlobStorageInfo::new("logs/2021", sas_uri);
    /// let client = BlobUploadClient::new(&info, 4, UploadConfig::default())?;
    /// ```
    pub fn new(
        blob_info: &BlobStorageInfo,
        max_concurrency: usize,
        config: UploadConfig,
    ) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(UploadError::InvalidArgument(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        config.validate()?;
        let credential = SasCredential::parse(&blob_info.storage_sas_credential)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| UploadError::Transfer {
                status: None,
                message: format!("failed to create HTTP client: {e}"),
            })?;

        debug!(
            "Blob upload client created for {} with concurrency {}",
            credential.display_url(),
            max_concurrency
        );
        Ok(Self {
            http,
            credential,
            config: config.into(),
            max_concurrency,
        })
    }

    /// Uploads every listed file from `directory_path` into the container
    ///
    /// Files are uploaded in order, one at a time, each using up to
    /// `max_concurrency` concurrent block requests. A failed file does not
    /// stop the remaining ones; once cancelled, the remaining files are
    /// recorded as cancelled without being opened.
    ///
    /// # Arguments
    ///
    /// * `file_names` - Names of the files inside `directory_path`
    /// * `directory_path` - Local directory holding the files
    /// * `virtual_directory_path` - Blob name prefix inside the container
    /// * `cancel_token` - Token for cancelling the upload
    ///
    /// # Returns
    ///
    /// Returns an `UploadReport` with the outcome of every file
    ///
    /// # Example
    ///
    /// ```ignore
    /// let report = client
    ///     .upload_files_to_container(&files, Path::new("/var/data"), "logs/2021", &cancel_token)
    ///     .await;
    /// assert!(report.is_complete());
    /// ```
    pub async fn upload_files_to_container(
        &self,
        file_names: &[String],
        directory_path: &Path,
        virtual_directory_path: &str,
        cancel_token: &CancellationToken,
    ) -> UploadReport {
        let upload_time = Instant::now();
        let mut report = UploadReport::new(file_names.len());
        info!(
            "Uploading {} files from {:?} to {} under {:?}",
            file_names.len(),
            directory_path,
            self.credential.display_url(),
            virtual_directory_path
        );

        for file_name in file_names {
            if cancel_token.is_cancelled() {
                report.record(file_name, Err(UploadError::Cancelled));
                continue;
            }

            let local_path = directory_path.join(file_name);
            let blob_name = blob_name(virtual_directory_path, file_name);
            let result = upload::put(self, &local_path, &blob_name, cancel_token).await;
            match &result {
                Ok(FileTransferOperationResult::Completed(_)) => {}
                Ok(FileTransferOperationResult::Cancelled { .. }) => {
                    warn!("Upload of {} cancelled", file_name)
                }
                Err(e) => error!("Failed to upload {}: {}", file_name, e),
            }
            report.record(file_name, result);
        }

        info!(
            "Uploaded {}/{} files ({} bytes) in {:?}",
            report.completed.len(),
            report.total,
            report.bytes_uploaded(),
            upload_time.elapsed()
        );
        report
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }
}
