
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::OpenAiConfig;
use crate::embeddings::Embedder;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

/// Blocking client for an OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    endpoint: Url,
    api_key: String,
    model: String,
    dimension: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

impl OpenAiClient {
    /// Build a client from configuration, reading the API key from the
    /// environment. A missing credential is a fatal configuration error.
    #[inline]
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key()
            .context("OpenAI API key is not available")?;

        Self::with_api_key(config, api_key)
    }

    /// Build a client with an explicitly supplied credential.
    #[inline]
    pub fn with_api_key(config: &OpenAiConfig, api_key: String) -> Result<Self> {
        let endpoint = config
            .embeddings_url()
            .context("Failed to generate embeddings URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            endpoint,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension as usize,
            agent,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Model identifier sent with every request.
    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate an embedding for a single text input.
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for text (length: {})", text.len());

        let request = EmbedRequest {
            model: &self.model,
            input: text,
            dimensions: Some(self.dimension),
        };

        let request_json =
            serde_json::to_string(&request).context("Failed to serialize embedding request")?;
        let authorization = format!("Bearer {}", self.api_key);

        let response_text = self
            .make_request_with_retry(|| {
                self.agent
                    .post(self.endpoint.as_str())
                    .header("Content-Type", "application/json")
                    .header("Authorization", authorization.as_str())
                    .send(&request_json)
                    .and_then(|mut resp| resp.body_mut().read_to_string())
            })
            .context("Failed to generate embedding")?;

        let mut embed_response: EmbedResponse =
            serde_json::from_str(&response_text).context("Failed to parse embedding response")?;

        embed_response.data.sort_by_key(|entry| entry.index);
        let embedding = embed_response
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .context("Embedding response contained no vectors")?;

        if embedding.len() != self.dimension {
            return Err(anyhow::anyhow!(
                "Embedding has {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            ));
        }

        debug!("Generated embedding with {} dimensions", embedding.len());
        Ok(embedding)
    }

    fn make_request_with_retry<F>(&self, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(response_text) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response_text);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Retryable error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(anyhow::anyhow!("Client error: HTTP {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => {
                            warn!("Non-retryable error: {}", error);
                            false
                        }
                    };

                    if !should_retry {
                        return Err(anyhow::anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow::anyhow!("Request error: {}", error));

                    if attempt < self.retry_attempts {
                        let delay_ms = EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) * 1000;
                        let delay = Duration::from_millis(delay_ms);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", self.endpoint);

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Request failed after retries")))
    }
}

impl Embedder for OpenAiClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.generate_embedding(text)
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }
}
