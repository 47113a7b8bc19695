use std::fmt::Display;

use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use tracing::info;

use crate::common::errors::NotifyError;
use crate::common::Disposition;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, message: &str) -> Result<(), NotifyError>;
}

pub fn success_message(key: &str, bucket: &str, disposition: Disposition) -> String {
    let malicious = if disposition.is_malicious() {
        "True"
    } else {
        "False"
    };

    format!(
        "File '{}' scanned and stored in '{}'. Malicious: {}",
        key, bucket, malicious
    )
}

pub fn failure_message(key: &str, error: &impl Display) -> String {
    format!("Error processing file '{}': {}", key, error)
}

/// Publishes plain-text messages to a single SNS topic.
#[derive(Debug, Clone)]
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsNotifier {
    pub fn new(client: aws_sdk_sns::Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, message: &str) -> Result<(), NotifyError> {
        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|err| NotifyError::Publish {
                topic: self.topic_arn.clone(),
                message: DisplayErrorContext(&err).to_string(),
            })?;

        info!(
            "Notification published: {}",
            output.message_id.unwrap_or("empty_id".into())
        );

        Ok(())
    }
}
