use thiserror::Error;

/// Failure talking to the scanning service.
#[derive(Debug, Error)]
pub enum ScanApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response, kept with its body for the failure notification.
    #[error("scan API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("unexpected scan API response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("failed to download s3://{bucket}/{key}: {message}")]
    Download {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to copy s3://{src_bucket}/{key} to s3://{dst_bucket}/{key}: {message}")]
    Copy {
        src_bucket: String,
        dst_bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to delete s3://{bucket}/{key}: {message}")]
    Delete {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to publish notification to {topic}: {message}")]
    Publish { topic: String, message: String },
}

/// Everything that can end a single record in `Notified(Failure)`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("event record is missing {0}")]
    MalformedRecord(&'static str),

    #[error("failed to prepare local file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error(transparent)]
    Download(BlobStoreError),

    #[error("scan submission failed: {0}")]
    Submission(#[source] ScanApiError),

    #[error("status check {attempt} failed: {source}")]
    TransientPoll {
        attempt: u32,
        #[source]
        source: ScanApiError,
    },

    #[error("analysis still pending after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    #[error(transparent)]
    Relocation(BlobStoreError),

    #[error(transparent)]
    Notification(NotifyError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_keeps_status_and_body() {
        let err = ScanApiError::Api {
            status: 401,
            body: "WrongCredentialsError".into(),
        };
        assert_eq!(err.to_string(), "scan API error (401): WrongCredentialsError");
    }

    #[test]
    fn submission_error_mentions_upstream_cause() {
        let err = DispatchError::Submission(ScanApiError::Api {
            status: 429,
            body: "QuotaExceededError".into(),
        });
        let text = err.to_string();
        assert!(text.starts_with("scan submission failed"));
        assert!(text.contains("QuotaExceededError"));
    }

    #[test]
    fn relocation_error_is_transparent() {
        let err = DispatchError::Relocation(BlobStoreError::Delete {
            bucket: "staging".into(),
            key: "a.zip".into(),
            message: "AccessDenied".into(),
        });
        assert_eq!(
            err.to_string(),
            "failed to delete s3://staging/a.zip: AccessDenied"
        );
    }
}
