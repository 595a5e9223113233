use crate::domain::error::HandlerError;
use percent_encoding::percent_decode_str;
use std::fmt::{Display, Formatter};

const PROCESSED_PREFIX: &str = "processed-";

/// Key of an object in the source bucket, decoded from its notification
/// form and guaranteed to end in a usable file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    key: String,
}

impl ObjectKey {
    /// S3 notifications carry keys form-encoded: `+` for a space and `%XX`
    /// escapes for everything else.
    pub fn from_notification(raw: &str) -> Result<ObjectKey, HandlerError> {
        let spaced = raw.replace('+', " ");
        let decoded = percent_decode_str(&spaced)
            .decode_utf8()
            .map_err(|_| HandlerError::input(format!("key {raw} is not valid UTF-8 once decoded")))?;
        ObjectKey::new(decoded.into_owned())
    }

    pub fn new(key: String) -> Result<ObjectKey, HandlerError> {
        if key.is_empty() {
            return Err(HandlerError::input("object key is empty"));
        }
        let object_key = ObjectKey { key };
        match object_key.basename() {
            "" => Err(HandlerError::input(format!(
                "key {} does not name a file",
                object_key.key
            ))),
            "." | ".." => Err(HandlerError::input(format!(
                "key {} ends in a relative path segment",
                object_key.key
            ))),
            _ => Ok(object_key),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    /// Last `/`-separated segment of the key.
    pub fn basename(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or_default()
    }

    /// Key the resized image is stored under in the destination bucket.
    pub fn processed_name(&self) -> String {
        format!("{PROCESSED_PREFIX}{}", self.basename())
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}
