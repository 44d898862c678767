//! HTTP state store backed by the `/sdk` routes.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::{SaveReceipt, StateStore};
use crate::error::{Error, Result};

/// Remote state store over HTTP.
///
/// Blobs travel as `application/octet-stream` bodies with the raw credential
/// in the `Authorization` header. Non-success responses surface as errors
/// carrying the status and body text.
#[derive(Debug, Clone)]
pub struct HttpStateStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStateStore {
    /// Create a store client for the given backend.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, credential: &str, url: String) -> Result<Vec<u8>> {
        tracing::debug!(url = %url, "fetching experiment state");
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, credential)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteStore { status, body });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

impl StateStore for HttpStateStore {
    async fn save(&self, credential: &str, blob: &[u8]) -> Result<SaveReceipt> {
        let url = format!("{}/sdk/save", self.base_url);
        tracing::debug!(url = %url, bytes = blob.len(), "posting experiment state");
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, credential)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(blob.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteStore { status, body });
        }
        Ok(response.json::<SaveReceipt>().await?)
    }

    async fn fetch_experiment(&self, credential: &str, experiment_id: &str) -> Result<Vec<u8>> {
        self.fetch(
            credential,
            format!("{}/sdk/get/experiment/{experiment_id}", self.base_url),
        )
        .await
    }

    async fn fetch_revision(&self, credential: &str, revision_id: &str) -> Result<Vec<u8>> {
        self.fetch(
            credential,
            format!("{}/sdk/get/revision/{revision_id}", self.base_url),
        )
        .await
    }
}
