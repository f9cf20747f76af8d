use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use casegraph_core::{CaseGraphError, EmbeddingService};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/v1";
const DEFAULT_MODEL: &str = "Octen/Octen-Embedding-0.6B";

/// Configuration for the embeddings client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingClientConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint.
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("CASEGRAPH_EMBEDDINGS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            model: std::env::var("CASEGRAPH_EMBEDDINGS_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout_secs: 60,
        }
    }
}

/// Client for the OpenAI-compatible embeddings server.
///
/// The vector dimension is fixed by the served model, so it is cached
/// after the first successful call for the life of this client.
pub struct HttpEmbeddingService {
    config: EmbeddingClientConfig,
    client: Client,
    dimension: OnceCell<usize>,
}

impl HttpEmbeddingService {
    pub fn new(config: EmbeddingClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            client,
            dimension: OnceCell::new(),
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(EmbeddingClientConfig::default())
    }

    /// The embedding dimension, probing the service on first use.
    pub async fn dimension(&self) -> casegraph_core::Result<usize> {
        if let Some(dim) = self.dimension.get() {
            return Ok(*dim);
        }
        self.embed("dimension probe").await.map(|v| v.len())
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            input: text.to_string(),
            model: self.config.model.clone(),
        };

        let response = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .json(&request)
            .send()
            .await
            .context("Failed to send embeddings request")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("embeddings endpoint error ({}): {}", status, error_text));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embeddings response")?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| anyhow!("embeddings response contained no vectors"))
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingService {
    async fn embed(&self, text: &str) -> casegraph_core::Result<Vec<f32>> {
        let vector = self
            .request_embedding(text)
            .await
            .map_err(|e| CaseGraphError::Embedding(format!("{e:#}")))?;

        let dim = *self.dimension.get_or_init(|| async { vector.len() }).await;
        if vector.len() != dim {
            debug!(
                expected = dim,
                got = vector.len(),
                "embedding dimension changed between calls"
            );
        }

        Ok(vector)
    }
}

// Embeddings wire types (OpenAI-compatible)

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}
