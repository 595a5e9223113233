use serde::Serialize;

pub mod dimension;
pub mod error;
pub mod notification;
pub mod object_key;
pub mod timing;

/// Result of a successful invocation, handed back to the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedObject {
    pub bucket: String,
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub content_type: String,
    pub content_length: usize,
}
