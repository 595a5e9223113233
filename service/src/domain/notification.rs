use crate::domain::error::HandlerError;
use crate::domain::object_key::ObjectKey;
use aws_lambda_events::event::s3::S3Event;
use tracing::warn;

/// The object named by a creation notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    /// Bucket reported by the notification, if any.
    pub bucket: Option<String>,
    pub key: ObjectKey,
}

/// Only the first record is handled; batches are not split up.
pub fn first_object(event: &S3Event) -> Result<SourceObject, HandlerError> {
    let record = event
        .records
        .first()
        .ok_or_else(|| HandlerError::input("notification contains no records"))?;
    if event.records.len() > 1 {
        warn!(
            "Notification carries {} records, ignoring all but the first",
            event.records.len()
        );
    }

    let raw_key = record
        .s3
        .object
        .key
        .as_deref()
        .ok_or_else(|| HandlerError::input("first record has no object key"))?;

    Ok(SourceObject {
        bucket: record.s3.bucket.name.clone(),
        key: ObjectKey::from_notification(raw_key)?,
    })
}
