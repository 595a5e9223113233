use crate::config::HandlerConfig;
use crate::domain::ProcessedObject;
use crate::logging::logger_setup;
use crate::repository::bucket_repository::BucketRepository;
use crate::service::process_notification;
use anyhow::{anyhow, Context};
use aws_config::BehaviorVersion;
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::{info, info_span, Instrument};

mod config;
mod domain;
mod image_service;
mod logging;
mod repository;
mod service;
mod workspace;

async fn function_handler(
    event: LambdaEvent<S3Event>,
    repository: &BucketRepository,
    config: &HandlerConfig,
) -> Result<ProcessedObject, Error> {
    let span = info_span!("invocation", request_id = %event.context.request_id);
    process_notification(repository, config, &event.payload)
        .instrument(span)
        .await
        .map_err(Error::from)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logger_setup().map_err(|err| anyhow!(err))?;

    let config = HandlerConfig::from_env().context("Invalid handler configuration")?;
    info!(
        "Resizing {} into {} at {}",
        config.source_bucket, config.destination_bucket, config.target
    );

    let shared_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let repository = BucketRepository::new(aws_sdk_s3::Client::new(&shared_config));

    run(service_fn(|event| function_handler(event, &repository, &config)))
        .await
        .map_err(|err| anyhow!(err))
}
