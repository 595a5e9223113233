use crate::repository::{ObjectRepository, StorageError};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use futures_util::TryFutureExt;
use std::time::Instant;
use tracing::{error, info, instrument};

/// S3 backed repository. Owns the one client built at startup.
#[derive(Debug, Clone)]
pub struct BucketRepository {
    client: Client,
}

impl BucketRepository {
    pub fn new(client: Client) -> BucketRepository {
        info!("Initializing bucket repository.");
        BucketRepository { client }
    }
}

impl ObjectRepository for BucketRepository {
    #[instrument(skip(self))]
    async fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let timer = Instant::now();
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .map_err(|err| {
                error!("Could not read {key} from {bucket}: {}", DisplayErrorContext(&err));
                classify(err, bucket, key)
            })
            .await?;

        let body = output.body.collect().await.map_err(|err| {
            error!("Could not stream {key} from {bucket}: {err}");
            StorageError::Transfer {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: err.to_string(),
            }
        })?;
        let bytes = body.into_bytes().to_vec();
        info!(
            "Bucket read took {} ms for {} bytes",
            timer.elapsed().as_millis(),
            bytes.len()
        );
        Ok(bytes)
    }

    #[instrument(skip(self, body))]
    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let timer = Instant::now();
        let content_length = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .map_err(|err| {
                error!("Could not write {key} to {bucket}: {}", DisplayErrorContext(&err));
                classify(err, bucket, key)
            })
            .await?;
        info!(
            "Bucket write took {} ms for {} bytes",
            timer.elapsed().as_millis(),
            content_length
        );
        Ok(())
    }
}

/// Maps an SDK failure onto the storage taxonomy, keeping not-found and
/// denied apart from every other failure.
fn classify<E>(err: SdkError<E>, bucket: &str, key: &str) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let status = err.raw_response().map(|response| response.status().as_u16());
    let bucket = bucket.to_string();
    let key = key.to_string();
    match (err.code(), status) {
        (Some("NoSuchKey" | "NoSuchBucket" | "NotFound"), _) | (_, Some(404)) => {
            StorageError::NotFound { bucket, key }
        }
        (Some("AccessDenied" | "AllAccessDisabled"), _) | (_, Some(403)) => {
            StorageError::AccessDenied { bucket, key }
        }
        _ => StorageError::Transfer {
            bucket,
            key,
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}
