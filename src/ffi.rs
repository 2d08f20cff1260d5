//! C ABI for the upload entry point.
//!
//! Every call builds its own runtime and helper, and nothing (error or panic)
//! unwinds across the boundary.

#![allow(non_snake_case)]

use std::ffi::{CStr, c_char, c_int};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::{UploadError, UploadResultCode};
use crate::logging::init_tracing;
use crate::types::BlobStorageInfo as OwnedBlobStorageInfo;
use crate::utility::{AzureBlobUploaderFactory, UploaderFactory, upload_files_to_container_with};

/// Connection information for uploading a set of blobs, as seen from C
#[repr(C)]
#[derive(Debug)]
pub struct BlobStorageInfo {
    /// Virtual hierarchy for the blobs
    pub virtual_directory_path: *const c_char,
    /// Combined SAS URI and SAS token for connecting to storage
    pub storage_sas_credential: *const c_char,
}

/// Uploads the files listed in `file_names` using the storage information in `blob_info`
///
/// Returns true only if every file was uploaded. Any missing argument or
/// failure returns false.
///
/// # Safety
///
/// - `blob_info` must be null or point to a valid `BlobStorageInfo` whose
///   strings are null or NUL-terminated
/// - `file_names` must be null or point to `file_name_count` pointers, each
///   null or NUL-terminated
/// - `directory_path` must be null or NUL-terminated
/// - All of them must stay valid for the duration of the call
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AzureBlobStorageFileUploadUtility_UploadFilesToContainer(
    blob_info: *const BlobStorageInfo,
    max_concurrency: c_int,
    file_names: *const *const c_char,
    file_name_count: usize,
    directory_path: *const c_char,
) -> bool {
    // SAFETY: the caller upholds the pointer contract documented above
    unsafe {
        upload_succeeded_with(
            &AzureBlobUploaderFactory::default(),
            blob_info,
            max_concurrency,
            file_names,
            file_name_count,
            directory_path,
        )
    }
}

/// Same as `AzureBlobStorageFileUploadUtility_UploadFilesToContainer`, returning
/// the failure classification instead of a boolean
///
/// # Safety
///
/// See `AzureBlobStorageFileUploadUtility_UploadFilesToContainer`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn AzureBlobStorageFileUploadUtility_UploadFilesToContainerEx(
    blob_info: *const BlobStorageInfo,
    max_concurrency: c_int,
    file_names: *const *const c_char,
    file_name_count: usize,
    directory_path: *const c_char,
) -> UploadResultCode {
    // SAFETY: the caller upholds the pointer contract documented above
    unsafe {
        upload_with(
            &AzureBlobUploaderFactory::default(),
            blob_info,
            max_concurrency,
            file_names,
            file_name_count,
            directory_path,
        )
    }
}

/// Boolean view of [`upload_with`]
///
/// # Safety
///
/// See `AzureBlobStorageFileUploadUtility_UploadFilesToContainer`.
unsafe fn upload_succeeded_with<F: UploaderFactory>(
    factory: &F,
    blob_info: *const BlobStorageInfo,
    max_concurrency: c_int,
    file_names: *const *const c_char,
    file_name_count: usize,
    directory_path: *const c_char,
) -> bool {
    // SAFETY: forwarded from the caller
    let code = unsafe {
        upload_with(
            factory,
            blob_info,
            max_concurrency,
            file_names,
            file_name_count,
            directory_path,
        )
    };
    code == UploadResultCode::Success
}

/// Checks the raw arguments and runs the upload with uploaders from `factory`.
/// A panic anywhere in the upload becomes `InternalError`.
///
/// # Safety
///
/// See `AzureBlobStorageFileUploadUtility_UploadFilesToContainer`.
unsafe fn upload_with<F: UploaderFactory>(
    factory: &F,
    blob_info: *const BlobStorageInfo,
    max_concurrency: c_int,
    file_names: *const *const c_char,
    file_name_count: usize,
    directory_path: *const c_char,
) -> UploadResultCode {
    if blob_info.is_null()
        || max_concurrency == 0
        || file_names.is_null()
        || directory_path.is_null()
    {
        return UploadResultCode::InvalidArgument;
    }

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: non-null pointers are valid per the caller contract
        let request = unsafe {
            UploadRequest::from_raw(
                blob_info,
                max_concurrency,
                file_names,
                file_name_count,
                directory_path,
            )
        }?;
        request.run(factory)
    }));

    match outcome {
        Ok(Ok(())) => UploadResultCode::Success,
        Ok(Err(e)) => e.code(),
        Err(_) => {
            error!("Upload panicked");
            UploadResultCode::InternalError
        }
    }
}

/// Installs the `tracing` subscriber; safe to call more than once
#[unsafe(no_mangle)]
pub extern "C" fn AzureBlobStorageFileUploadUtility_InitLogging() {
    let _ = catch_unwind(init_tracing);
}

/// Owned copy of the C arguments
#[derive(Debug)]
struct UploadRequest {
    blob_info: OwnedBlobStorageInfo,
    max_concurrency: usize,
    file_names: Vec<String>,
    directory_path: PathBuf,
}

impl UploadRequest {
    /// # Safety
    ///
    /// `blob_info`, `file_names` and `directory_path` must be non-null and
    /// valid as documented on the exported functions.
    unsafe fn from_raw(
        blob_info: *const BlobStorageInfo,
        max_concurrency: c_int,
        file_names: *const *const c_char,
        file_name_count: usize,
        directory_path: *const c_char,
    ) -> Result<Self, UploadError> {
        let max_concurrency = usize::try_from(max_concurrency).map_err(|_| {
            UploadError::InvalidArgument(format!("max_concurrency {max_concurrency} is negative"))
        })?;

        // SAFETY: non-null and valid per the contract
        let blob_info = unsafe { &*blob_info };
        let blob_info = OwnedBlobStorageInfo {
            virtual_directory_path: unsafe {
                owned_str(blob_info.virtual_directory_path, "virtual_directory_path")
            }?,
            storage_sas_credential: unsafe {
                owned_str(blob_info.storage_sas_credential, "storage_sas_credential")
            }?,
        };

        // SAFETY: `file_names` points to `file_name_count` entries
        let raw_names: &[*const c_char] = if file_name_count == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(file_names, file_name_count) }
        };
        let file_names = raw_names
            .iter()
            .map(|name| unsafe { owned_str(*name, "file name") })
            .collect::<Result<Vec<_>, _>>()?;

        let directory_path = PathBuf::from(unsafe { owned_str(directory_path, "directory_path") }?);

        Ok(Self {
            blob_info,
            max_concurrency,
            file_names,
            directory_path,
        })
    }

    /// Runs the upload on a runtime that lives only for this call
    fn run<F: UploaderFactory>(self, factory: &F) -> Result<(), UploadError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| UploadError::Transfer {
                status: None,
                message: format!("failed to start runtime: {e}"),
            })?;

        runtime.block_on(async {
            upload_files_to_container_with(
                factory,
                Some(&self.blob_info),
                self.max_concurrency,
                Some(self.file_names.as_slice()),
                Some(self.directory_path.as_path()),
                &CancellationToken::new(),
            )
            .await
            .map(|_| ())
        })
    }
}

/// Copies a NUL-terminated UTF-8 string
///
/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn owned_str(ptr: *const c_char, what: &str) -> Result<String, UploadError> {
    if ptr.is_null() {
        return Err(UploadError::InvalidArgument(format!("{what} is null")));
    }
    // SAFETY: non-null and NUL-terminated per the contract
    let text = unsafe { CStr::from_ptr(ptr) };
    text.to_str()
        .map(str::to_owned)
        .map_err(|_| UploadError::InvalidArgument(format!("{what} is not valid UTF-8")))
}
