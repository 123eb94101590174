//! Completion backend abstraction.
//!
//! The [`CompletionClient`] trait decouples the loop from the HTTP backend
//! (a llama.cpp-style `/completion` endpoint). Tests use scripted clients that
//! return predetermined text without any network access.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::io::config::CompletionSettings;

/// Wire payload for one completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(rename = "stop")]
    pub stop_sequences: Vec<String>,
}

impl CompletionRequest {
    pub fn new(prompt: String, settings: &CompletionSettings) -> Self {
        Self {
            prompt,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stop_sequences: settings.stop_sequences.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    content: String,
}

/// Stateless text-in, text-out generation.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate text for `request`.
    ///
    /// Any failure (transport, timeout, malformed body) yields an empty string.
    /// Implementations never retry.
    async fn complete(&self, request: &CompletionRequest) -> String;
}

/// HTTP client for a llama.cpp-compatible server.
pub struct LlamaClient {
    endpoint: String,
    health_timeout: std::time::Duration,
    client: reqwest::Client,
}

impl LlamaClient {
    pub fn new(settings: &CompletionSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            endpoint: settings.endpoint.clone(),
            health_timeout: settings.health_timeout,
            client,
        })
    }

    /// Probe the server origin; errors if it does not answer within the health timeout.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn health(&self) -> Result<()> {
        let url = origin_of(&self.endpoint)?;
        self.client
            .get(url.clone())
            .timeout(self.health_timeout)
            .send()
            .await
            .with_context(|| format!("completion server not reachable at {url}"))?;
        debug!("completion server reachable");
        Ok(())
    }

    async fn try_complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .context("send completion request")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("completion server returned {status}"));
        }
        let body: CompletionResponse = response
            .json()
            .await
            .context("parse completion response")?;
        Ok(body.content.trim().to_string())
    }
}

#[async_trait]
impl CompletionClient for LlamaClient {
    #[instrument(skip_all, fields(prompt_len = request.prompt.len()))]
    async fn complete(&self, request: &CompletionRequest) -> String {
        match self.try_complete(request).await {
            Ok(text) => {
                debug!(text_len = text.len(), "completion received");
                text
            }
            Err(err) => {
                warn!(err = %format!("{err:#}"), "completion failed");
                String::new()
            }
        }
    }
}

/// Scheme + host + port of `endpoint`, with an empty path.
fn origin_of(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).with_context(|| format!("parse endpoint {endpoint}"))?;
    url.set_path("");
    url.set_query(None);
    Ok(url)
}
