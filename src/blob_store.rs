use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::common::errors::BlobStoreError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes the object's contents to `destination`.
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<(), BlobStoreError>;

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), BlobStoreError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError>;
}

#[derive(Debug, Clone)]
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
}

impl S3BlobStore {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

/// `CopySource` wants `bucket/key` with the key URL-encoded.
fn copy_source(bucket: &str, key: &str) -> String {
    format!("{}/{}", bucket, urlencoding::encode(key))
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        destination: &Path,
    ) -> Result<(), BlobStoreError> {
        let download_error = |message: String| BlobStoreError::Download {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let mut object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| download_error(DisplayErrorContext(&err).to_string()))?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written = 0usize;
        while let Some(chunk) = object
            .body
            .try_next()
            .await
            .map_err(|err| download_error(err.to_string()))?
        {
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        info!("Downloaded {} bytes to {}", written, destination.display());
        Ok(())
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), BlobStoreError> {
        self.client
            .copy_object()
            .copy_source(copy_source(src_bucket, src_key))
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await
            .map_err(|err| BlobStoreError::Copy {
                src_bucket: src_bucket.to_string(),
                dst_bucket: dst_bucket.to_string(),
                key: src_key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;

        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), BlobStoreError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| BlobStoreError::Delete {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_source_encodes_key() {
        assert_eq!(copy_source("staging", "evil.zip"), "staging/evil.zip");
        assert_eq!(
            copy_source("staging", "in box/a+b.zip"),
            "staging/in%20box%2Fa%2Bb.zip"
        );
    }
}
