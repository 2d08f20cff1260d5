use url::Url;

use crate::error::{Result, UploadError};

/// Container endpoint and SAS token parsed from a combined SAS URI
///
/// The token itself is opaque: it is never decoded, only carried as the
/// query string of every request.
#[derive(Debug, Clone)]
pub struct SasCredential {
    container_url: Url,
}

impl SasCredential {
    /// Parses `https://<account>.blob.core.windows.net/<container>?<token>`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if:
    /// - The text is not an absolute http(s) URL with a host
    /// - The path does not name a container
    /// - The SAS token query is missing
    pub fn parse(combined: &str) -> Result<Self> {
        let combined = combined.trim();
        let container_url = Url::parse(combined)
            .map_err(|e| invalid(format!("storage SAS credential is not a valid URL: {e}")))?;

        if !matches!(container_url.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "unsupported storage URL scheme {:?}",
                container_url.scheme()
            )));
        }
        if container_url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("storage SAS credential has no host"));
        }
        if container_url
            .path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()))
            .is_none()
        {
            return Err(invalid("storage SAS credential does not name a container"));
        }
        if container_url.query().is_none_or(str::is_empty) {
            return Err(invalid("storage SAS credential has no SAS token"));
        }

        Ok(Self { container_url })
    }

    /// URL of `blob_name` inside the container, carrying the SAS token
    pub fn blob_url(&self, blob_name: &str) -> Url {
        let mut url = self.container_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(blob_name.split('/').filter(|s| !s.is_empty()));
        }
        url
    }

    /// Container URL without the SAS token, safe for logging
    pub fn display_url(&self) -> String {
        without_query(&self.container_url)
    }
}

/// Blob name for `file_name` under `virtual_directory_path`
///
/// Leading and trailing slashes on the virtual path are ignored; an empty
/// virtual path places the blob at the container root.
pub fn blob_name(virtual_directory_path: &str, file_name: &str) -> String {
    let prefix = virtual_directory_path.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{prefix}/{file_name}")
    }
}

pub(crate) fn without_query(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

fn invalid(message: impl Into<String>) -> UploadError {
    UploadError::InvalidArgument(message.into())
}
