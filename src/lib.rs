// Module declarations
mod client;
mod credential;
mod error;
pub mod ffi;
mod logging;
mod operations;
mod retry;
mod types;
mod utility;

// Public API exports
pub use client::BlobUploadClient;
pub use credential::{SasCredential, blob_name};
pub use error::{Result, UploadError, UploadResultCode};
pub use logging::init_tracing;
pub use retry::{RetryPolicy, with_retry};
pub use types::{
    BlobStorageInfo, FailedUpload, FileTransferOperationResult, FileTransferProgress,
    UploadConfig, UploadReport,
};
pub use utility::{
    AzureBlobUploaderFactory, FileUploader, UploaderFactory, upload_files_to_container,
    upload_files_to_container_succeeded, upload_files_to_container_with,
};

// Re-export commonly used external types for convenience
pub use tokio_util::sync::CancellationToken;
