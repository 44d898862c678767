//! HTTP client for OpenAI-compatible chat completions APIs.
//!
//! Works against any server exposing `/v1/chat/completions`: Ollama, vLLM,
//! or OpenAI itself. The request body is passed through as-is, so every
//! parameter the experiment sweeps over reaches the endpoint untouched.

use serde::Deserialize;

use super::{ChatCompletionClient, ChatResponse, RequestPayload};
use crate::error::{Error, Result};

/// Default endpoint: a local Ollama server speaking the OpenAI dialect.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// HTTP chat-completion client.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

impl OpenAiCompatClient {
    /// Create a client for the given server.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the server without the `/v1` suffix
    ///   (e.g. `"http://localhost:11434"`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Attach a bearer API key (required by hosted providers, ignored by
    /// local servers).
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List the model ids the server advertises.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/models", self.base_url);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ChatCompletion { status, body });
        }
        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Check whether the server answers its health endpoint.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait::async_trait]
impl ChatCompletionClient for OpenAiCompatClient {
    async fn complete(&self, request: &RequestPayload) -> Result<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(url = %url, "sending chat completion request");

        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ChatCompletion { status, body });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let client = OpenAiCompatClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");

        let client = OpenAiCompatClient::new("http://localhost:8000");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_default_base_url_is_local_ollama() {
        assert!(DEFAULT_BASE_URL.contains("11434"));
        let client = OpenAiCompatClient::new(DEFAULT_BASE_URL);
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_api_key_is_optional() {
        let client = OpenAiCompatClient::new(DEFAULT_BASE_URL);
        assert!(client.api_key.is_none());
        let client = client.with_api_key("sk-test");
        assert_eq!(client.api_key.as_deref(), Some("sk-test"));
    }
}
