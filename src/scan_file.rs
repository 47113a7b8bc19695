use aws_config::BehaviorVersion;
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, Error as LambdaError, LambdaEvent};
use tracing::{error, info};

mod blob_store;
mod common;
mod dispatcher;
mod notifier;
mod scan_service;

use crate::blob_store::S3BlobStore;
use crate::common::config::Config;
use crate::dispatcher::ScanDispatcher;
use crate::notifier::SnsNotifier;
use crate::scan_service::VirusTotalClient;

const LOG_LEVEL_DEFAULT: tracing::Level = tracing::Level::INFO;

#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let log_level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LOG_LEVEL_DEFAULT);

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_ansi(false)
        .without_time() // CloudWatch will add the ingestion time
        .with_target(false)
        .init();

    let Config {
        vt_api_key,
        vt_base_url,
        vt_timeout,
        destinations,
        topic_arn,
        poll,
        tmp_dir,
    } = Config::from_env()?;
    info!(
        "Routing scanned files to safe={} malicious={}",
        destinations.safe, destinations.malicious
    );

    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let s3_client = aws_sdk_s3::Client::new(&aws_config);
    let sns_client = aws_sdk_sns::Client::new(&aws_config);

    let scanner = VirusTotalClient::new(vt_base_url, vt_api_key, vt_timeout)?;

    let dispatcher = ScanDispatcher::new(
        S3BlobStore::new(s3_client),
        scanner,
        SnsNotifier::new(sns_client, topic_arn),
        destinations,
        poll,
        tmp_dir,
    );
    let dispatcher = &dispatcher;

    run(service_fn(move |event: LambdaEvent<S3Event>| async move {
        match dispatcher.handle(event.payload).await {
            Ok(outcomes) => {
                info!("Processed {} file(s)", outcomes.len());
                Ok(())
            }
            Err(err) => {
                error!("Invocation failed: {}", err);
                Err(LambdaError::from(err))
            }
        }
    }))
    .await
}
