
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::EmbeddingGateway;
use crate::config::{EmbeddingConfig, api_key_from_env};
use crate::http::HttpClient;
use crate::{PressError, Result};

/// Client for an OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    endpoint: String,
    model: String,
    dimension: usize,
    batch_size: usize,
    api_key: String,
    http: HttpClient,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    #[inline]
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            dimension: config.dimension as usize,
            batch_size: (config.batch_size as usize).max(1),
            api_key: api_key.into(),
            http: HttpClient::new(Duration::from_secs(config.timeout_seconds)),
        }
    }

    /// Build a client whose key comes from the configured environment variable
    #[inline]
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = api_key_from_env(&config.api_key_env)?;
        Ok(Self::new(config, api_key))
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.with_timeout(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.http = self.http.with_retry_attempts(attempts);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn embed_batch_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // Only the text-embedding-3 family accepts a requested output size
        let dimensions = self
            .model
            .starts_with("text-embedding-3")
            .then_some(self.dimension);
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
            dimensions,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| PressError::Embedding(format!("Failed to serialize request: {e}")))?;

        let authorization = format!("Bearer {}", self.api_key);
        let response_text = self.http.post_json(
            &self.endpoint,
            &[("Authorization", authorization.as_str())],
            &body,
            PressError::Embedding,
        )?;

        let response: EmbeddingsResponse = serde_json::from_str(&response_text)
            .map_err(|e| PressError::Embedding(format!("Failed to parse response: {e}")))?;

        self.order_embeddings(response.data, texts.len())
    }

    /// Place each returned vector at its input position
    fn order_embeddings(&self, items: Vec<EmbeddingItem>, expected: usize) -> Result<Vec<Vec<f32>>> {
        if items.len() != expected {
            return Err(PressError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                expected,
                items.len()
            )));
        }

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
        for item in items {
            if item.embedding.len() != self.dimension {
                return Err(PressError::Embedding(format!(
                    "Provider returned {} components, expected {}",
                    item.embedding.len(),
                    self.dimension
                )));
            }
            match slots.get_mut(item.index) {
                Some(slot @ None) => *slot = Some(item.embedding),
                Some(Some(_)) => {
                    return Err(PressError::Embedding(format!(
                        "Duplicate embedding index {}",
                        item.index
                    )));
                }
                None => {
                    return Err(PressError::Embedding(format!(
                        "Embedding index {} out of range",
                        item.index
                    )));
                }
            }
        }

        // Counts match and indices are unique and in range, so every slot is filled
        Ok(slots.into_iter().flatten().collect())
    }
}

#[async_trait]
impl EmbeddingGateway for OpenAiEmbedder {
    #[inline]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());
        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let client = self.clone();
            let batch = batch.to_vec();
            let vectors = tokio::task::spawn_blocking(move || client.embed_batch_blocking(&batch))
                .await
                .map_err(|e| PressError::Embedding(format!("Embedding task failed: {e}")))??;
            debug!("Embedded batch of {} texts", vectors.len());
            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }
}
