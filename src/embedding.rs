//! Embedding provider abstraction and the Cohere implementation.
//!
//! Defines the [`Embedder`] trait and the [`CohereEmbedder`], which calls
//! Cohere's `/v1/embed` endpoint with batching, bounded concurrency,
//! retry, and backoff. The trait is the seam the lifecycle manager is
//! constructed with, so tests inject a stub instead of the network.
//!
//! # Retry Strategy
//!
//! - HTTP 429 and 5xx → retry with exponential backoff (250 ms, 500 ms,
//!   1 s, 2 s by default, up to 4 retries), then `EmbeddingUnavailable`
//! - Network errors → retry the same way
//! - HTTP 401/403 → fail immediately with `EmbeddingAuth`
//! - Any other 4xx, or a malformed/mixed-dimension response →
//!   `EmbeddingProtocol`
//!
//! # Batching
//!
//! Callers may pass arbitrarily large text lists; the client splits them
//! into provider-sized batches (≤96 by default), runs up to 4 requests
//! concurrently, and stitches the vectors back together in input order.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// What the text is used for; Cohere embeds queries and documents into
/// the same space but with different preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    Document,
    Query,
}

impl EmbedRole {
    /// The provider's `input_type` value.
    pub fn as_input_type(&self) -> &'static str {
        match self {
            EmbedRole::Document => "search_document",
            EmbedRole::Query => "search_query",
        }
    }
}

/// Trait for embedding providers. Stateless with respect to the store.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per input in input
    /// order, all of the same dimension.
    async fn embed_batch(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>>;
}

/// Embedding provider backed by the Cohere embed API.
pub struct CohereEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
    concurrency: usize,
    max_retries: u32,
    base_delay: Duration,
}

impl CohereEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.api_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        })
    }

    /// One provider call with retry/backoff, for a single batch.
    async fn call_batch(
        &self,
        api_key: &str,
        texts: &[String],
        role: EmbedRole,
    ) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "texts": texts,
            "model": self.model,
            "truncate": "END",
            "input_type": role.as_input_type(),
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.url)
                .header("Authorization", format!("Bearer {api_key}"))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            Error::EmbeddingProtocol(format!("invalid JSON response: {e}"))
                        })?;
                        return parse_embed_response(&json, texts.len());
                    }

                    let status_code = status.as_u16();
                    if status_code == 401 || status_code == 403 {
                        let body_text = response.text().await.unwrap_or_default();
                        return Err(Error::EmbeddingAuth(format!(
                            "provider returned {status}: {body_text}"
                        )));
                    }

                    if status_code == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(format!("provider returned {status}: {body_text}"));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::EmbeddingProtocol(format!(
                        "provider returned {status}: {body_text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(e.to_string());
                    continue;
                }
            }
        }

        Err(Error::EmbeddingUnavailable(
            last_err.unwrap_or_else(|| "retries exhausted".to_string()),
        ))
    }
}

#[async_trait]
impl Embedder for CohereEmbedder {
    async fn embed_batch(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::EmbeddingAuth("COHERE_API_KEY is not set".into()))?;

        let mut futs: Vec<
            std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<Vec<f32>>>> + Send + '_>>,
        > = Vec::new();
        for batch in texts.chunks(self.batch_size) {
            futs.push(Box::pin(self.call_batch(api_key, batch, role)));
        }
        let results: Vec<Vec<Vec<f32>>> = stream::iter(futs)
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let vectors: Vec<Vec<f32>> = results.into_iter().flatten().collect();
        check_uniform(&vectors, texts.len())?;
        Ok(vectors)
    }
}

/// Parse Cohere's `{"embeddings": [[...], ...]}` response.
fn parse_embed_response(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::EmbeddingProtocol("missing embeddings array".into()))?;

    if embeddings.len() != expected {
        return Err(Error::EmbeddingProtocol(format!(
            "expected {expected} embeddings, got {}",
            embeddings.len()
        )));
    }

    let mut out = Vec::with_capacity(embeddings.len());
    for embedding in embeddings {
        let values = embedding
            .as_array()
            .ok_or_else(|| Error::EmbeddingProtocol("embedding is not an array".into()))?;
        let mut vec = Vec::with_capacity(values.len());
        for v in values {
            let f = v
                .as_f64()
                .ok_or_else(|| Error::EmbeddingProtocol("non-numeric embedding value".into()))?;
            vec.push(f as f32);
        }
        out.push(vec);
    }
    Ok(out)
}

/// Every vector in a response set must share one dimension and the count
/// must match the input.
fn check_uniform(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::EmbeddingProtocol(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }
    if let Some(first) = vectors.first() {
        let dim = first.len();
        if dim == 0 {
            return Err(Error::EmbeddingProtocol("zero-dimension embedding".into()));
        }
        for v in vectors {
            if v.len() != dim {
                return Err(Error::EmbeddingProtocol(format!(
                    "mixed embedding dimensions: {dim} and {}",
                    v.len()
                )));
            }
        }
    }
    Ok(())
}
