use std::ffi::{CString, c_char};

use azure_blob_upload::UploadResultCode;
use azure_blob_upload::ffi::{
    AzureBlobStorageFileUploadUtility_UploadFilesToContainer,
    AzureBlobStorageFileUploadUtility_UploadFilesToContainerEx, BlobStorageInfo,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock server running on its own runtime so the C entry point can block
/// the test thread with a runtime of its own.
fn start_server(status: u16) -> (tokio::runtime::Runtime, MockServer) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/container/logs/2021/a.log"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    });
    (runtime, server)
}

fn call(server: &MockServer, dir: &std::path::Path) -> (bool, UploadResultCode) {
    let virtual_directory_path = CString::new("logs/2021").unwrap();
    let credential =
        CString::new(format!("{}/container?sv=2021-08-06&sig=abc", server.uri())).unwrap();
    let info = BlobStorageInfo {
        virtual_directory_path: virtual_directory_path.as_ptr(),
        storage_sas_credential: credential.as_ptr(),
    };
    let name = CString::new("a.log").unwrap();
    let names: [*const c_char; 1] = [name.as_ptr()];
    let directory = CString::new(dir.to_str().unwrap()).unwrap();

    unsafe {
        let succeeded = AzureBlobStorageFileUploadUtility_UploadFilesToContainer(
            &info,
            4,
            names.as_ptr(),
            names.len(),
            directory.as_ptr(),
        );
        let code = AzureBlobStorageFileUploadUtility_UploadFilesToContainerEx(
            &info,
            4,
            names.as_ptr(),
            names.len(),
            directory.as_ptr(),
        );
        (succeeded, code)
    }
}

#[test]
fn c_entry_point_uploads_files() {
    let (_runtime, server) = start_server(201);
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.log"), "alpha").unwrap();

    assert_eq!(call(&server, dir.path()), (true, UploadResultCode::Success));
}

#[test]
fn c_entry_point_reports_authentication_failure() {
    let (_runtime, server) = start_server(403);
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.log"), "alpha").unwrap();

    assert_eq!(
        call(&server, dir.path()),
        (false, UploadResultCode::AuthenticationFailure)
    );
}
