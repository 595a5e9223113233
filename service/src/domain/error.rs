use crate::repository::StorageError;
use thiserror::Error;

/// Every way a single invocation can fail. All of them are fatal and are
/// reported back to the runtime as is.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Notification rejected: {reason}")]
    InputError { reason: String },

    #[error("Image could not be fetched: {source}")]
    FetchError {
        #[source]
        source: StorageError,
    },

    #[error("Image {key} could not be decoded: {message}")]
    DecodeError { key: String, message: String },

    #[error("Image {key} could not be resized: {message}")]
    ResizeError { key: String, message: String },

    #[error("Image {key} could not be encoded: {message}")]
    EncodeError { key: String, message: String },

    #[error("Image could not be stored: {source}")]
    StoreError {
        #[source]
        source: StorageError,
    },

    #[error("Workspace error at {path}: {source}")]
    WorkspaceError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl HandlerError {
    pub fn input(reason: impl Into<String>) -> HandlerError {
        HandlerError::InputError {
            reason: reason.into(),
        }
    }

    /// Short name of the failure kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::InputError { .. } => "InputError",
            HandlerError::FetchError { .. } => "FetchError",
            HandlerError::DecodeError { .. } => "DecodeError",
            HandlerError::ResizeError { .. } => "ResizeError",
            HandlerError::EncodeError { .. } => "EncodeError",
            HandlerError::StoreError { .. } => "StoreError",
            HandlerError::WorkspaceError { .. } => "WorkspaceError",
        }
    }
}
