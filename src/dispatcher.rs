//! Per-record scan lifecycle.
//!
//! Each record of an S3 event goes through
//! `Received -> Downloaded -> Submitted -> Polling -> Classified -> Relocated -> Notified`.
//! Any error publishes one failure notification and is returned to the runtime,
//! which stops processing the rest of the batch.

use std::path::PathBuf;

use aws_lambda_events::event::s3::S3Event;
use tracing::{debug, error, info, warn};

use crate::blob_store::BlobStore;
use crate::common::config::{DestinationBuckets, PollExhaustion, PollPolicy};
use crate::common::errors::DispatchError;
use crate::common::utils::ScratchFile;
use crate::common::{AnalysisHandle, Disposition, ScanRequest, ScanVerdict};
use crate::notifier::{failure_message, success_message, Notifier};
use crate::scan_service::ScanService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub disposition: Disposition,
    pub destination_bucket: String,
}

pub struct ScanDispatcher<B, S, N> {
    blob_store: B,
    scan_service: S,
    notifier: N,
    destinations: DestinationBuckets,
    poll_policy: PollPolicy,
    tmp_dir: PathBuf,
}

impl<B, S, N> ScanDispatcher<B, S, N>
where
    B: BlobStore,
    S: ScanService,
    N: Notifier,
{
    pub fn new(
        blob_store: B,
        scan_service: S,
        notifier: N,
        destinations: DestinationBuckets,
        poll_policy: PollPolicy,
        tmp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            blob_store,
            scan_service,
            notifier,
            destinations,
            poll_policy,
            tmp_dir: tmp_dir.into(),
        }
    }

    /// Processes every record of the event in order, stopping at the first failure.
    pub async fn handle(&self, event: S3Event) -> Result<Vec<ScanOutcome>, DispatchError> {
        info!("Received {} record(s)", event.records.len());

        let mut outcomes = Vec::with_capacity(event.records.len());
        for record in &event.records {
            let request = ScanRequest::from_record(record)?;

            match self.process_record(&request).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    error!("Failed to process {}: {}", request.source_key, err);

                    let message = failure_message(&request.source_key, &err);
                    if let Err(notify_err) = self.notifier.publish(&message).await {
                        error!("Failure notification was not delivered: {}", notify_err);
                    }

                    return Err(err);
                }
            }
        }

        Ok(outcomes)
    }

    #[tracing::instrument(
        skip(self, request),
        fields(bucket = %request.source_bucket, key = %request.source_key)
    )]
    async fn process_record(&self, request: &ScanRequest) -> Result<ScanOutcome, DispatchError> {
        let scratch = ScratchFile::create(&self.tmp_dir, &request.source_key)
            .map_err(DispatchError::TempFile)?;
        debug!("Staging local copy in {}", scratch.dir().display());

        self.blob_store
            .download(&request.source_bucket, &request.source_key, scratch.path())
            .await
            .map_err(DispatchError::Download)?;

        let contents = tokio::fs::read(scratch.path())
            .await
            .map_err(DispatchError::TempFile)?;

        let handle = self
            .scan_service
            .submit(&request.source_key, contents)
            .await
            .map_err(DispatchError::Submission)?;
        info!("Submitted for analysis: {}", handle);

        let verdict = self.poll(&handle).await?;
        let disposition = Disposition::from(&verdict);
        let destination = self.destinations.for_disposition(disposition);
        info!(
            "Classified as {:?} ({} malicious detections)",
            disposition, verdict.malicious_count
        );

        self.blob_store
            .copy(
                &request.source_bucket,
                &request.source_key,
                destination,
                &request.source_key,
            )
            .await
            .map_err(DispatchError::Relocation)?;
        self.blob_store
            .delete(&request.source_bucket, &request.source_key)
            .await
            .map_err(DispatchError::Relocation)?;
        info!("Moved to {}", destination);

        let message = success_message(&request.source_key, destination, disposition);
        self.notifier
            .publish(&message)
            .await
            .map_err(DispatchError::Notification)?;

        Ok(ScanOutcome {
            disposition,
            destination_bucket: destination.to_string(),
        })
    }

    /// Queries the analysis until it completes or the attempt budget runs out.
    async fn poll(&self, handle: &AnalysisHandle) -> Result<ScanVerdict, DispatchError> {
        let mut last_seen = None;

        for attempt in 1..=self.poll_policy.max_attempts {
            if attempt > 1 && !self.poll_policy.interval.is_zero() {
                tokio::time::sleep(self.poll_policy.interval).await;
            }

            let verdict = self
                .scan_service
                .status(handle)
                .await
                .map_err(|source| DispatchError::TransientPoll { attempt, source })?;

            if verdict.is_completed() {
                debug!("Analysis completed after {} status check(s)", attempt);
                return Ok(verdict);
            }
            last_seen = Some(verdict);
        }

        warn!(
            "Analysis {} still pending after {} status checks",
            handle, self.poll_policy.max_attempts
        );
        match (self.poll_policy.on_exhaustion, last_seen) {
            (PollExhaustion::UseLastResult, Some(verdict)) => Ok(verdict),
            _ => Err(DispatchError::PollTimeout {
                attempts: self.poll_policy.max_attempts,
            }),
        }
    }
}
