use std::fmt;
use std::time::Duration;

use aws_lambda_events::event::s3::S3EventRecord;

use crate::common::errors::DispatchError;
use crate::common::utils::decode_object_key;

pub mod config;
pub mod errors;
pub mod utils;

pub const VT_BASE_URL_DEFAULT: &str = "https://www.virustotal.com/api/v3";
pub const VT_TIMEOUT_DEFAULT: Duration = Duration::from_secs(60);
pub const SCAN_TMP_DIR_DEFAULT: &str = "/tmp";

/// Upper bound on status queries for a single analysis.
pub const MAX_POLL_ATTEMPTS: u32 = 10;

/// Opaque scan-job identifier returned by the scanning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisHandle(String);

impl AnalysisHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Pending,
    Completed,
}

impl AnalysisStatus {
    /// Anything other than `completed` (queued, in-progress, ...) keeps the poll loop going.
    pub fn from_api(status: &str) -> Self {
        match status {
            "completed" => AnalysisStatus::Completed,
            _ => AnalysisStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanVerdict {
    pub status: AnalysisStatus,
    pub malicious_count: u64,
}

impl ScanVerdict {
    pub fn is_completed(&self) -> bool {
        self.status == AnalysisStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Safe,
    Malicious,
}

impl Disposition {
    pub fn is_malicious(self) -> bool {
        self == Disposition::Malicious
    }
}

impl From<&ScanVerdict> for Disposition {
    fn from(verdict: &ScanVerdict) -> Self {
        if verdict.malicious_count > 0 {
            Disposition::Malicious
        } else {
            Disposition::Safe
        }
    }
}

/// Source object named by one record of the inbound storage event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub source_bucket: String,
    pub source_key: String,
}

impl ScanRequest {
    pub fn from_record(record: &S3EventRecord) -> Result<Self, DispatchError> {
        let source_bucket = record
            .s3
            .bucket
            .name
            .clone()
            .ok_or(DispatchError::MalformedRecord("s3.bucket.name"))?;
        let raw_key = record
            .s3
            .object
            .key
            .as_deref()
            .ok_or(DispatchError::MalformedRecord("s3.object.key"))?;

        Ok(Self {
            source_bucket,
            source_key: decode_object_key(raw_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(malicious_count: u64) -> ScanVerdict {
        ScanVerdict {
            status: AnalysisStatus::Completed,
            malicious_count,
        }
    }

    #[test]
    fn any_positive_malicious_count_is_malicious() {
        for count in [1, 2, 7, 70, u64::MAX] {
            assert_eq!(Disposition::from(&completed(count)), Disposition::Malicious);
        }
    }

    #[test]
    fn zero_malicious_count_is_safe() {
        assert_eq!(Disposition::from(&completed(0)), Disposition::Safe);
        assert!(!Disposition::Safe.is_malicious());
    }

    fn record(bucket: Option<&str>, key: Option<&str>) -> S3EventRecord {
        let mut record: S3EventRecord = serde_json::from_value(serde_json::json!({
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "awsRegion": "eu-west-1",
            "eventTime": "2024-08-14T10:21:03.512Z",
            "eventName": "ObjectCreated:Put",
            "userIdentity": {"principalId": "AWS:AIDAEXAMPLE"},
            "requestParameters": {"sourceIPAddress": "203.0.113.7"},
            "responseElements": {},
            "s3": {
                "s3SchemaVersion": "1.0",
                "bucket": {"name": "placeholder", "ownerIdentity": {"principalId": "A3NL1KOZZKExample"}},
                "object": {"key": "placeholder", "size": 7}
            }
        }))
        .unwrap();
        record.s3.bucket.name = bucket.map(str::to_string);
        record.s3.object.key = key.map(str::to_string);
        record
    }

    #[test]
    fn request_uses_decoded_key() {
        let request =
            ScanRequest::from_record(&record(Some("staging"), Some("in+box%2Fevil%2Ezip"))).unwrap();
        assert_eq!(request.source_bucket, "staging");
        assert_eq!(request.source_key, "in box/evil.zip");
    }

    #[test]
    fn request_needs_bucket_and_key() {
        let err = ScanRequest::from_record(&record(None, Some("a.bin"))).unwrap_err();
        assert!(matches!(err, DispatchError::MalformedRecord("s3.bucket.name")));

        let err = ScanRequest::from_record(&record(Some("staging"), None)).unwrap_err();
        assert!(matches!(err, DispatchError::MalformedRecord("s3.object.key")));
    }

    #[test]
    fn only_completed_status_is_terminal() {
        assert_eq!(AnalysisStatus::from_api("completed"), AnalysisStatus::Completed);
        assert_eq!(AnalysisStatus::from_api("queued"), AnalysisStatus::Pending);
        assert_eq!(AnalysisStatus::from_api("in-progress"), AnalysisStatus::Pending);
        assert_eq!(AnalysisStatus::from_api(""), AnalysisStatus::Pending);
    }
}
