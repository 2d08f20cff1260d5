/// Module for uploading files to blob storage
pub(crate) mod upload;
