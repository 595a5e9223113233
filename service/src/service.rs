use crate::config::HandlerConfig;
use crate::domain::error::HandlerError;
use crate::domain::error::HandlerError::{FetchError, StoreError};
use crate::domain::notification::{first_object, SourceObject};
use crate::domain::timing::StageTimings;
use crate::domain::ProcessedObject;
use crate::image_service::{decode_image, encode_image, output_format, resize_image};
use crate::repository::ObjectRepository;
use crate::workspace::Workspace;
use aws_lambda_events::event::s3::S3Event;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub type InternalResponse = Result<ProcessedObject, HandlerError>;

/// Fetch the object named by the notification, resize it and store the
/// result in the destination bucket. Nothing is written to the destination
/// unless every earlier step succeeded, and the workspace is gone by the
/// time this returns.
#[instrument(skip_all, fields(source_bucket = %config.source_bucket))]
pub async fn process_notification<R>(
    repository: &R,
    config: &HandlerConfig,
    event: &S3Event,
) -> InternalResponse
where
    R: ObjectRepository,
{
    let process_timer: Instant = Instant::now();
    let mut timings = StageTimings::new();

    let SourceObject { bucket, key } = first_object(event).inspect_err(|err| {
        error!(kind = err.kind(), "Could not read notification: {err}");
    })?;
    let source_bucket = config.source_bucket.as_str();
    if let Some(notified) = bucket.as_deref().filter(|name| *name != source_bucket) {
        warn!("Notification names bucket {notified}, fetching from {source_bucket}");
    }
    let destination_bucket = config.destination_bucket.as_str();
    let destination_key = key.processed_name();
    let local_failure = |err: &HandlerError| {
        error!(
            bucket = source_bucket,
            key = %key,
            kind = err.kind(),
            "Processing failed: {err}"
        );
    };

    let workspace = Workspace::acquire(&config.workspace_root).inspect_err(local_failure)?;
    let download_path = workspace.download_path(&key);
    let upload_path = workspace.upload_path(&key);

    let fetch_timer = Instant::now();
    let bytes = repository
        .read_object(source_bucket, key.as_str())
        .await
        .map_err(|source| {
            error!(bucket = source_bucket, key = %key, "Fetch failed: {source}");
            FetchError { source }
        })?;
    workspace
        .write_file(&download_path, &bytes)
        .await
        .inspect_err(local_failure)?;
    timings.record("fetch", fetch_timer);
    info!(bucket = source_bucket, key = %key, size = bytes.len(), "Downloaded {key} from {source_bucket}");
    drop(bytes);

    let decoding_timer = Instant::now();
    let (image, source_format) = decode_image(&download_path, &key).inspect_err(local_failure)?;
    timings.record("dec", decoding_timer);
    debug!("Decoded {}x{} {source_format:?}", image.width(), image.height());

    let resizing_timer = Instant::now();
    let resized = resize_image(&image, config.target, &key).inspect_err(local_failure)?;
    drop(image);
    timings.record("res", resizing_timer);
    debug!("Image resized to {}, writing image to buffer", config.target);

    let encoding_timer = Instant::now();
    let format = output_format(config.output_format, source_format, config.target);
    if config.output_format.is_none() && format != source_format {
        warn!("{source_format:?} cannot be written at {}, storing as {format:?}", config.target);
    }
    let encoded =
        encode_image(&resized, format, config.jpeg_quality, &key).inspect_err(local_failure)?;
    let (width, height) = (resized.width(), resized.height());
    drop(resized);
    workspace
        .write_file(&upload_path, &encoded)
        .await
        .inspect_err(local_failure)?;
    drop(encoded);
    timings.record("enc", encoding_timer);

    let storing_timer = Instant::now();
    let body = workspace
        .read_file(&upload_path)
        .await
        .inspect_err(local_failure)?;
    let content_length = body.len();
    let content_type = format.to_mime_type();
    repository
        .write_object(destination_bucket, &destination_key, body, content_type)
        .await
        .map_err(|source| {
            error!(bucket = destination_bucket, key = %destination_key, "Store failed: {source}");
            StoreError { source }
        })?;
    timings.record("store", storing_timer);
    info!(
        bucket = destination_bucket,
        key = %destination_key,
        "Uploaded {destination_key} to {destination_bucket}"
    );

    workspace.release();

    info!(
        "Success {} ms: {key} ({timings})",
        process_timer.elapsed().as_millis()
    );
    Ok(ProcessedObject {
        bucket: destination_bucket.to_string(),
        key: destination_key,
        width,
        height,
        content_type: content_type.to_string(),
        content_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dimension::Dimension;
    use crate::domain::notification::tests::{event, record};
    use crate::image_service::tests::{empty_farbfeld_bytes, ico_bytes, jpeg_bytes, png_bytes};
    use crate::repository::StorageError;
    use image::ImageFormat;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    type Location = (String, String);

    #[derive(Default)]
    struct InMemoryRepository {
        objects: Mutex<HashMap<Location, Vec<u8>>>,
        content_types: Mutex<HashMap<Location, String>>,
        reads: Mutex<Vec<Location>>,
        writes: Mutex<Vec<Location>>,
        deny_writes: bool,
    }

    impl InMemoryRepository {
        fn with_object(bucket: &str, key: &str, body: Vec<u8>) -> InMemoryRepository {
            let repository = InMemoryRepository::default();
            repository
                .objects
                .lock()
                .unwrap()
                .insert((bucket.to_string(), key.to_string()), body);
            repository
        }

        fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
            self.objects
                .lock()
                .unwrap()
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
        }

        fn objects_in(&self, bucket: &str) -> usize {
            self.objects
                .lock()
                .unwrap()
                .keys()
                .filter(|(b, _)| b == bucket)
                .count()
        }
    }

    impl ObjectRepository for InMemoryRepository {
        async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
            self.reads
                .lock()
                .unwrap()
                .push((bucket.to_string(), key.to_string()));
            self.object(bucket, key).ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        }

        async fn write_object(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            content_type: &str,
        ) -> Result<(), StorageError> {
            if self.deny_writes {
                return Err(StorageError::AccessDenied {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            let location = (bucket.to_string(), key.to_string());
            self.writes.lock().unwrap().push(location.clone());
            self.content_types
                .lock()
                .unwrap()
                .insert(location.clone(), content_type.to_string());
            self.objects.lock().unwrap().insert(location, body);
            Ok(())
        }
    }

    const SOURCE: &str = "source-image-bucket";
    const DESTINATION: &str = "processed-image-bucket";

    fn config_in(root: &Path) -> HandlerConfig {
        HandlerConfig {
            workspace_root: root.to_path_buf(),
            ..HandlerConfig::default()
        }
    }

    fn assert_workspace_clean(root: &TempDir) {
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn resizes_photo_into_destination_bucket() {
        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::with_object(SOURCE, "photo.jpg", jpeg_bytes(1200, 800));
        let event = event(vec![record(SOURCE, "photo.jpg")]);

        let processed = process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap();

        assert_eq!(processed.bucket, DESTINATION);
        assert_eq!(processed.key, "processed-photo.jpg");
        assert_eq!((processed.width, processed.height), (300, 300));
        assert_eq!(processed.content_type, "image/jpeg");

        let stored = repository.object(DESTINATION, "processed-photo.jpg").unwrap();
        assert_eq!(stored.len(), processed.content_length);
        let decoded = image::load_from_memory(&stored).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (300, 300));
        assert_eq!(*repository.writes.lock().unwrap(), vec![(DESTINATION.to_string(), "processed-photo.jpg".to_string())]);
        assert_workspace_clean(&root);
    }

    #[tokio::test]
    async fn corrupt_image_is_decode_error_and_nothing_is_stored() {
        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::with_object(SOURCE, "broken.png", b"not an image".to_vec());
        let event = event(vec![record(SOURCE, "broken.png")]);

        let err = process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::DecodeError { .. }));
        assert!(repository.writes.lock().unwrap().is_empty());
        assert_eq!(repository.objects_in(DESTINATION), 0);
        assert_workspace_clean(&root);
    }

    #[tokio::test]
    async fn empty_notification_is_input_error_before_fetch() {
        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::default();

        let err = process_notification(&repository, &config_in(root.path()), &event(vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::InputError { .. }));
        assert!(repository.reads.lock().unwrap().is_empty());
        assert_workspace_clean(&root);
    }

    #[tokio::test]
    async fn denied_store_is_store_error_and_workspace_is_cleaned() {
        let root = tempfile::tempdir().unwrap();
        let original = jpeg_bytes(640, 480);
        let mut repository = InMemoryRepository::with_object(SOURCE, "photo.jpg", original.clone());
        repository.deny_writes = true;
        let event = event(vec![record(SOURCE, "photo.jpg")]);

        let err = process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HandlerError::StoreError {
                source: StorageError::AccessDenied { .. }
            }
        ));
        assert_eq!(repository.object(SOURCE, "photo.jpg"), Some(original));
        assert_eq!(repository.objects_in(DESTINATION), 0);
        assert_workspace_clean(&root);
    }

    #[tokio::test]
    async fn missing_source_is_fetch_error() {
        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::default();
        let event = event(vec![record(SOURCE, "gone.jpg")]);

        let err = process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HandlerError::FetchError {
                source: StorageError::NotFound { .. }
            }
        ));
        assert!(repository.writes.lock().unwrap().is_empty());
        assert_workspace_clean(&root);
    }

    #[tokio::test]
    async fn encoded_nested_key_keeps_only_basename() {
        let root = tempfile::tempdir().unwrap();
        let repository =
            InMemoryRepository::with_object(SOURCE, "albums/summer trip/beach 1.png", png_bytes(90, 40));
        let event = event(vec![record(SOURCE, "albums/summer+trip/beach%201.png")]);

        let processed = process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap();

        assert_eq!(processed.key, "processed-beach 1.png");
        assert_eq!(processed.content_type, "image/png");
        assert!(repository.object(DESTINATION, "processed-beach 1.png").is_some());
        assert_workspace_clean(&root);
    }

    #[tokio::test]
    async fn configured_output_format_and_size_are_used() {
        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::with_object(SOURCE, "photo.jpg", jpeg_bytes(200, 100));
        let config = HandlerConfig {
            target: Dimension::new(64, 32).unwrap(),
            output_format: Some(ImageFormat::Png),
            ..config_in(root.path())
        };
        let event = event(vec![record(SOURCE, "photo.jpg")]);

        let processed = process_notification(&repository, &config, &event).await.unwrap();

        assert_eq!(processed.key, "processed-photo.jpg");
        assert_eq!((processed.width, processed.height), (64, 32));
        let content_types = repository.content_types.lock().unwrap();
        assert_eq!(
            content_types
                .get(&(DESTINATION.to_string(), "processed-photo.jpg".to_string()))
                .map(String::as_str),
            Some("image/png")
        );
        let stored = repository.object(DESTINATION, "processed-photo.jpg").unwrap();
        assert_eq!(image::guess_format(&stored).unwrap(), ImageFormat::Png);
    }

    #[tokio::test]
    async fn configured_source_bucket_wins_over_notification() {
        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::with_object(SOURCE, "photo.jpg", jpeg_bytes(50, 50));
        let event = event(vec![record("some-other-bucket", "photo.jpg")]);

        process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap();

        assert_eq!(
            *repository.reads.lock().unwrap(),
            vec![(SOURCE.to_string(), "photo.jpg".to_string())]
        );
    }

    #[tokio::test]
    async fn icon_too_large_for_ico_is_stored_as_png() {
        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::with_object(SOURCE, "favicon.ico", ico_bytes(64));
        let event = event(vec![record(SOURCE, "favicon.ico")]);

        let processed = process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap();

        assert_eq!(processed.key, "processed-favicon.ico");
        assert_eq!((processed.width, processed.height), (300, 300));
        assert_eq!(processed.content_type, "image/png");
        let stored = repository.object(DESTINATION, "processed-favicon.ico").unwrap();
        assert_eq!(image::guess_format(&stored).unwrap(), ImageFormat::Png);
        assert_workspace_clean(&root);
    }

    #[tokio::test]
    async fn resize_failure_stores_nothing() {
        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::with_object(SOURCE, "empty.ff", empty_farbfeld_bytes());
        let event = event(vec![record(SOURCE, "empty.ff")]);

        let err = process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::ResizeError { .. }));
        assert!(repository.writes.lock().unwrap().is_empty());
        assert_eq!(repository.objects_in(DESTINATION), 0);
        assert_workspace_clean(&root);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn decode_failure_is_logged_with_bucket_and_key() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let root = tempfile::tempdir().unwrap();
        let repository = InMemoryRepository::with_object(SOURCE, "broken.png", b"not an image".to_vec());
        let event = event(vec![record(SOURCE, "broken.png")]);
        process_notification(&repository, &config_in(root.path()), &event)
            .await
            .unwrap_err();

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let failure = output
            .lines()
            .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
            .find(|line| line["fields"]["kind"] == "DecodeError")
            .expect("no DecodeError line was logged");
        assert_eq!(failure["level"], "ERROR");
        assert_eq!(failure["fields"]["bucket"], SOURCE);
        assert_eq!(failure["fields"]["key"], "broken.png");
    }
}
