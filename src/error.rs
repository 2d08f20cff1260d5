use std::path::PathBuf;

use thiserror::Error;

/// Result type for blob upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;

/// Errors that can occur while uploading files to blob storage.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A required argument was missing or malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Storage rejected the SAS credential
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    /// Request failed on the network or with an unexpected HTTP status
    #[error("Transfer failed{}: {message}", http_suffix(.status))]
    Transfer { status: Option<u16>, message: String },

    /// Local file could not be opened or read
    #[error("Local file error for {}: {source}", .path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Some of the requested files were not uploaded
    #[error("{failed} of {total} files failed to upload")]
    PartialFailure { failed: usize, total: usize },

    /// Upload was cancelled
    #[error("Upload cancelled")]
    Cancelled,
}

fn http_suffix(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" (HTTP {status})"),
        None => String::new(),
    }
}

impl UploadError {
    /// Classifies a non-success HTTP status returned by storage
    pub(crate) fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => UploadError::Authentication { status, message },
            _ => UploadError::Transfer {
                status: Some(status),
                message,
            },
        }
    }

    pub(crate) fn local_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UploadError::LocalFile {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same request could succeed
    ///
    /// Network failures (no status), timeouts, throttling and 5xx responses
    /// are transient. Authentication and other client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Transfer { status: None, .. } => true,
            UploadError::Transfer {
                status: Some(status),
                ..
            } => matches!(*status, 408 | 429 | 500..=599),
            _ => false,
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, UploadError::Authentication { .. })
    }

    /// Result code reported across the C boundary
    pub fn code(&self) -> UploadResultCode {
        match self {
            UploadError::InvalidArgument(_) => UploadResultCode::InvalidArgument,
            UploadError::Authentication { .. } => UploadResultCode::AuthenticationFailure,
            UploadError::Transfer { .. } | UploadError::LocalFile { .. } => {
                UploadResultCode::TransferFailure
            }
            UploadError::PartialFailure { .. } => UploadResultCode::PartialFailure,
            UploadError::Cancelled => UploadResultCode::Cancelled,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::Transfer {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// Classification of an upload call for C callers
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadResultCode {
    Success = 0,
    InvalidArgument = 1,
    AuthenticationFailure = 2,
    TransferFailure = 3,
    PartialFailure = 4,
    Cancelled = 5,
    /// A panic or runtime failure inside the library
    InternalError = 6,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(UploadError::from_status(403, "denied").is_authentication());
        assert!(UploadError::from_status(401, "denied").is_authentication());
        assert!(!UploadError::from_status(404, "missing").is_authentication());
    }

    #[test]
    fn transient_errors_are_retryable() {
        for status in [408, 429, 500, 503] {
            assert!(UploadError::from_status(status, "").is_retryable(), "{status}");
        }
        let network = UploadError::Transfer {
            status: None,
            message: "connection reset".to_string(),
        };
        assert!(network.is_retryable());
    }

    #[test]
    fn permanent_errors_are_not_retryable() {
        for status in [400, 401, 403, 404, 409] {
            assert!(!UploadError::from_status(status, "").is_retryable(), "{status}");
        }
        let io = UploadError::local_file(
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(!io.is_retryable());
        assert!(!UploadError::Cancelled.is_retryable());
    }

    #[test]
    fn codes_map_by_classification() {
        assert_eq!(
            UploadError::InvalidArgument("x".into()).code(),
            UploadResultCode::InvalidArgument
        );
        assert_eq!(
            UploadError::from_status(403, "").code(),
            UploadResultCode::AuthenticationFailure
        );
        assert_eq!(
            UploadError::from_status(500, "").code(),
            UploadResultCode::TransferFailure
        );
        assert_eq!(
            UploadError::PartialFailure { failed: 1, total: 2 }.code(),
            UploadResultCode::PartialFailure
        );
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            UploadError::from_status(500, "server busy").to_string(),
            "Transfer failed (HTTP 500): server busy"
        );
        let network = UploadError::Transfer {
            status: None,
            message: "timed out".to_string(),
        };
        assert_eq!(network.to_string(), "Transfer failed: timed out");
        assert_eq!(
            UploadError::PartialFailure { failed: 1, total: 3 }.to_string(),
            "1 of 3 files failed to upload"
        );
    }
}
