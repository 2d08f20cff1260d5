use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info};
use url::Url;

use crate::client::BlobUploadClient;
use crate::credential::without_query;
use crate::error::{Result, UploadError};
use crate::retry::{RetryPolicy, with_retry};
use crate::types::{FileTransferOperationResult, FileTransferProgress};

/// Blob service REST API version sent with every request
pub(crate) const AZURE_API_VERSION: &str = "2023-11-03";

/// Maximum number of committed blocks in a block blob
const MAX_BLOCKS: u64 = 50_000;

/// Uploads a local file to a block blob
///
/// Files up to `single_upload_threshold` bytes are sent with one Put Blob
/// request. Larger files are staged block by block:
/// 1. Reads `block_size` chunks from the local file in order
/// 2. Sends each chunk as a Put Block request on its own task, keeping at
///    most `max_concurrency` requests in flight
/// 3. Commits the block list in file order once every block is staged
/// 4. Supports graceful cancellation between chunks; a cancelled upload is
///    never committed
///
/// # Arguments
///
/// * `client` - The blob upload client
/// * `local_path` - Path to the local file to upload
/// * `blob_name` - Destination blob name inside the container
/// * `cancel_token` - Token for cancelling the upload operation
///
/// # Returns
///
/// Returns a `FileTransferOperationResult`:
/// - `Completed` with transfer progress if successful
/// - `Cancelled` if the operation was cancelled
///
/// # Errors
///
/// Returns an error if:
/// - The local file cannot be opened or read
/// - The file needs more blocks than a block blob allows
/// - Storage rejects the credential or a request fails after retries
pub async fn put(
    client: &BlobUploadClient,
    local_path: &Path,
    blob_name: &str,
    cancel_token: &CancellationToken,
) -> Result<FileTransferOperationResult> {
    let upload_time = Instant::now();
    let mut local_file = fs::File::open(local_path)
        .await
        .map_err(|e| UploadError::local_file(local_path, e))?;
    let local_file_size = local_file
        .metadata()
        .await
        .map_err(|e| UploadError::local_file(local_path, e))?
        .len();
    info!("Local file opened: {:?} ({} bytes)", local_path, local_file_size);

    let blob_url = client.credential.blob_url(blob_name);
    let src_file = local_path.display().to_string();
    let dest_file = without_query(&blob_url);

    let is_cancelled = if local_file_size <= client.config.single_upload_threshold {
        let mut buffer = Vec::with_capacity(local_file_size as usize);
        local_file
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| UploadError::local_file(local_path, e))?;
        if cancel_token.is_cancelled() {
            true
        } else {
            put_blob(client, &blob_url, Bytes::from(buffer), cancel_token).await?;
            false
        }
    } else {
        put_blocks(client, local_path, &mut local_file, local_file_size, &blob_url, cancel_token)
            .await?
    };

    if is_cancelled {
        info!("Upload of {:?} cancelled", local_path);
        return Ok(FileTransferOperationResult::Cancelled {
            src_file,
            dest_file,
        });
    }

    info!(
        "File {:?} uploaded to {}. Time taken {:?}",
        local_path,
        dest_file,
        upload_time.elapsed(),
    );
    Ok(FileTransferOperationResult::Completed(FileTransferProgress {
        src_file,
        dest_file,
        file_size: local_file_size,
        percentage_progress: 100.0_f64,
    }))
}

/// Stages the file as blocks and commits them. Returns true if cancelled.
async fn put_blocks(
    client: &BlobUploadClient,
    local_path: &Path,
    local_file: &mut fs::File,
    local_file_size: u64,
    blob_url: &Url,
    cancel_token: &CancellationToken,
) -> Result<bool> {
    let block_size = client.config.block_size;
    let block_count = local_file_size.div_ceil(block_size as u64);
    if block_count > MAX_BLOCKS {
        return Err(UploadError::InvalidArgument(format!(
            "{:?} needs {} blocks of {} bytes, more than the {} a blob allows",
            local_path, block_count, block_size, MAX_BLOCKS
        )));
    }
    debug!(
        "Staging {:?} as {} blocks with concurrency {}",
        local_path, block_count, client.max_concurrency
    );

    let mut is_cancelled = false;
    let mut block_ids = Vec::with_capacity(block_count as usize);
    let mut tasks = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Upload operation cancelled by user");
                is_cancelled = true;
                break;
            }
            read_result = read_block(&mut *local_file, block_size) => {
                let buffer = match read_result {
                    Ok(buffer) if buffer.is_empty() => {
                        debug!("Upload: End of file reached");
                        break;
                    }
                    Ok(buffer) => buffer,
                    Err(e) => {
                        error!("Error reading local file: {:?}", e);
                        return Err(UploadError::local_file(local_path, e));
                    }
                };
                let block_id = block_id(block_ids.len());
                block_ids.push(block_id.clone());
                tasks.push(AbortOnDropHandle::new(tokio::spawn(put_block(
                    client.http.clone(),
                    blob_url.clone(),
                    block_id,
                    Bytes::from(buffer),
                    client.config.retry.clone(),
                    cancel_token.clone(),
                ))));

                if tasks.len() >= client.max_concurrency {
                    join_block(tasks.select_next_some().await)?;
                }
            }
        }
    }

    if is_cancelled {
        // Dropping the handles aborts the in-flight block requests
        return Ok(true);
    }

    while let Some(task) = tasks.next().await {
        join_block(task)?;
    }

    put_block_list(client, blob_url, &block_ids, cancel_token).await?;
    Ok(false)
}

/// Reads up to `block_size` bytes; an empty buffer means end of file
async fn read_block(local_file: &mut fs::File, block_size: usize) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(block_size);
    local_file
        .take(block_size as u64)
        .read_to_end(&mut buffer)
        .await?;
    Ok(buffer)
}

fn join_block(joined: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.map_err(|e| UploadError::Transfer {
        status: None,
        message: format!("block upload task failed: {e}"),
    })?
}

/// Block ids must have the same length within a blob
fn block_id(index: usize) -> String {
    BASE64_STANDARD.encode(format!("block-{:08}", index))
}

async fn put_blob(
    client: &BlobUploadClient,
    blob_url: &Url,
    body: Bytes,
    cancel_token: &CancellationToken,
) -> Result<()> {
    with_retry(&client.config.retry, cancel_token, "Put Blob", || {
        let request = client
            .http
            .put(blob_url.clone())
            .header("x-ms-version", AZURE_API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body.clone());
        send(request)
    })
    .await
}

async fn put_block(
    http: reqwest::Client,
    blob_url: Url,
    block_id: String,
    body: Bytes,
    retry: RetryPolicy,
    cancel_token: CancellationToken,
) -> Result<()> {
    let mut url = blob_url;
    url.query_pairs_mut()
        .append_pair("comp", "block")
        .append_pair("blockid", &block_id);

    with_retry(&retry, &cancel_token, "Put Block", || {
        let request = http
            .put(url.clone())
            .header("x-ms-version", AZURE_API_VERSION)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body.clone());
        send(request)
    })
    .await
}

async fn put_block_list(
    client: &BlobUploadClient,
    blob_url: &Url,
    block_ids: &[String],
    cancel_token: &CancellationToken,
) -> Result<()> {
    let mut url = blob_url.clone();
    url.query_pairs_mut().append_pair("comp", "blocklist");
    let body = Bytes::from(block_list_xml(block_ids));

    with_retry(&client.config.retry, cancel_token, "Put Block List", || {
        let request = client
            .http
            .put(url.clone())
            .header("x-ms-version", AZURE_API_VERSION)
            .header(CONTENT_TYPE, "application/xml")
            .body(body.clone());
        send(request)
    })
    .await
}

fn block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in block_ids {
        xml.push_str("<Latest>");
        xml.push_str(id);
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

async fn send(request: reqwest::RequestBuilder) -> Result<()> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(UploadError::from_status(status.as_u16(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ids_have_equal_length() {
        let first = block_id(0);
        let last = block_id(49_999);
        assert_eq!(first.len(), last.len());
        assert_ne!(first, last);

        let decoded = BASE64_STANDARD.decode(&last).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "block-00049999");
    }

    #[test]
    fn block_list_keeps_order() {
        let xml = block_list_xml(&["b".to_string(), "a".to_string()]);
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="utf-8"?><BlockList><Latest>b</Latest><Latest>a</Latest></BlockList>"#
        );
    }
}
