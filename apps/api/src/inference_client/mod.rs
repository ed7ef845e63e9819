/// Inference Client — the single point of entry for calls to the model server.
///
/// Speaks the text-embeddings-inference HTTP API:
/// - `POST /embed`  → one embedding vector per input
/// - `POST /rerank` → relevance probability of each text for a query
///
/// No other module talks to the model server directly.
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Inference server returned an empty response")]
    EmptyResponse,

    #[error("Unexpected response shape: {0}")]
    Shape(String),
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
    normalize: bool,
    truncate: bool,
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [&'a str],
    raw_scores: bool,
    truncate: bool,
}

/// One entry of a `/rerank` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RerankScore {
    pub index: usize,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    error: String,
}

/// HTTP client for the model server, with retry on 429/5xx.
#[derive(Clone)]
pub struct InferenceClient {
    client: Client,
    base_url: String,
}

impl InferenceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InferenceError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Embeds every input. Vectors come back L2-normalized.
    pub async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, InferenceError> {
        let body = EmbedRequest {
            inputs,
            normalize: true,
            truncate: true,
        };
        let vectors: Vec<Vec<f32>> = self.post_json("embed", &body).await?;
        if vectors.is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        if vectors.len() != inputs.len() {
            return Err(InferenceError::Shape(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }

    /// Scores each of `texts` against `query` as a probability in [0, 1].
    pub async fn rerank(
        &self,
        query: &str,
        texts: &[&str],
    ) -> Result<Vec<RerankScore>, InferenceError> {
        let body = RerankRequest {
            query,
            texts,
            raw_scores: false,
            truncate: true,
        };
        let scores: Vec<RerankScore> = self.post_json("rerank", &body).await?;
        if scores.is_empty() {
            return Err(InferenceError::EmptyResponse);
        }
        Ok(scores)
    }

    /// POSTs `body` as JSON and decodes the JSON reply.
    /// Retries on 429 and 5xx with exponential backoff.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, InferenceError>
    where
        B: Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_error: Option<InferenceError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 250ms, 500ms
                let delay = Duration::from_millis(250 * (1 << (attempt - 1)));
                warn!(
                    "Inference call to {} failed (attempt {}), retrying after {}ms...",
                    path,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.client.post(&url).json(body).send().await {
                Ok(r) => r,
                Err(e) => {
                    // Connection refused and timeouts do not get better by retrying.
                    if e.is_connect() || e.is_timeout() {
                        return Err(InferenceError::Http(e));
                    }
                    last_error = Some(InferenceError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("Inference server returned {}: {}", status, body);
                last_error = Some(InferenceError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ServerError>(&body)
                    .map(|e| e.error)
                    .unwrap_or(body);
                return Err(InferenceError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let text = response.text().await?;
            debug!("Inference call to {} succeeded ({} bytes)", path, text.len());
            return serde_json::from_str(&text).map_err(InferenceError::Parse);
        }

        Err(last_error.unwrap_or(InferenceError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

/// Cosine similarity of two vectors; 0.0 for mismatched or zero-length input.
pub fn cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
