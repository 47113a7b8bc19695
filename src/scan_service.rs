//! VirusTotal v3 client.
//!
//! Uploads a file with `POST /files` and reads its analysis back with
//! `GET /analyses/{id}`. Non-2xx responses become [`ScanApiError::Api`]
//! carrying the status code and body.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::common::errors::ScanApiError;
use crate::common::{AnalysisHandle, AnalysisStatus, ScanVerdict};

const API_KEY_HEADER: &str = "x-apikey";

#[async_trait]
pub trait ScanService: Send + Sync {
    /// Uploads `contents` for analysis.
    async fn submit(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<AnalysisHandle, ScanApiError>;

    /// Fetches the current state of an analysis.
    async fn status(&self, handle: &AnalysisHandle) -> Result<ScanVerdict, ScanApiError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    data: AnalysisData,
}

#[derive(Debug, Deserialize)]
struct AnalysisData {
    attributes: AnalysisAttributes,
}

#[derive(Debug, Deserialize)]
struct AnalysisAttributes {
    status: String,
    #[serde(default)]
    stats: AnalysisStats,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisStats {
    #[serde(default)]
    malicious: u64,
}

impl From<AnalysisResponse> for ScanVerdict {
    fn from(response: AnalysisResponse) -> Self {
        let attributes = response.data.attributes;
        ScanVerdict {
            status: AnalysisStatus::from_api(&attributes.status),
            malicious_count: attributes.stats.malicious,
        }
    }
}

#[derive(Debug)]
pub struct VirusTotalClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl VirusTotalClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, ScanApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self::with_client(client, base_url, api_key))
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: SecretString,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ScanApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|err| format!("<unreadable body: {err}>"));

            return Err(ScanApiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ScanService for VirusTotalClient {
    async fn submit(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<AnalysisHandle, ScanApiError> {
        info!("Uploading {} ({} bytes) for analysis", file_name, contents.len());
        let part = Part::bytes(contents).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let upload: UploadResponse = Self::parse_response(response).await?;
        Ok(AnalysisHandle::new(upload.data.id))
    }

    async fn status(&self, handle: &AnalysisHandle) -> Result<ScanVerdict, ScanApiError> {
        let response = self
            .client
            .get(format!("{}/analyses/{}", self.base_url, handle.id()))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .send()
            .await?;

        let analysis: AnalysisResponse = Self::parse_response(response).await?;
        let verdict = ScanVerdict::from(analysis);
        debug!("Analysis {}: {:?}", handle, verdict);

        Ok(verdict)
    }
}
