// demos/basic_usage.rs
// Run with: cargo run --example basic_usage

use azure_blob_upload::{
    BlobStorageInfo, CancellationToken, UploadError, init_tracing, upload_files_to_container,
};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // 1. Describe the destination container
    let blob_info = BlobStorageInfo::new(
        "logs/2021",
        "https://myaccount.blob.core.windows.net/mycontainer?sv=2021-08-06&sr=c&sp=cw&sig=REDACTED",
    );

    // 2. Files to upload, relative to the local directory
    let file_names = vec!["agent.log".to_string(), "agent.log.1".to_string()];
    let directory = Path::new("/var/log/myagent");

    // 3. Cancel the upload on Ctrl-C
    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    println!("⬆️  Uploading {} files...", file_names.len());
    let result = upload_files_to_container(
        Some(&blob_info),
        4, // up to 4 block requests in flight per file
        Some(file_names.as_slice()),
        Some(directory),
        &cancel_token,
    )
    .await;

    match result {
        Ok(report) => {
            for progress in &report.completed {
                println!("✅ {} -> {} ({} bytes)", progress.src_file, progress.dest_file, progress.file_size);
            }
            println!("✅ Uploaded {} bytes in total", report.bytes_uploaded());
        }
        Err(UploadError::Cancelled) => println!("❌ Upload cancelled"),
        Err(UploadError::PartialFailure { failed, total }) => {
            println!("❌ {} of {} files failed to upload", failed, total);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
