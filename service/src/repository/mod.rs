use thiserror::Error;

pub(crate) mod bucket_repository;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("access to {bucket}/{key} denied")]
    AccessDenied { bucket: String, key: String },

    #[error("transfer of {bucket}/{key} failed: {message}")]
    Transfer {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Object storage as seen by the handler: one read from the source bucket
/// and one write to the destination bucket per invocation.
pub trait ObjectRepository {
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;
}
