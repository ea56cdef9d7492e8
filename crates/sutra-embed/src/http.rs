use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sutra_core::config::EmbeddingConfig;
use sutra_core::error::{Error, Result};
use sutra_core::traits::EmbeddingService;

use crate::pool::l2_normalize;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible `/embeddings` endpoint (OpenAI, Ollama,
/// vLLM, llama.cpp server).
pub struct HttpEmbedder {
    client: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dim: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: &str, model: impl Into<String>, dim: usize, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| Error::backend("embedding", e))?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", endpoint.trim_end_matches('/')),
            api_key,
            model: model.into(),
            dim,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key_env.as_deref().and_then(|name| std::env::var(name).ok());
        Self::new(&config.endpoint, config.model.clone(), config.dimension, api_key, Duration::from_millis(config.timeout_ms))
    }

    async fn request(&self, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut req = self.client.post(&self.url).json(&EmbeddingRequest { model: &self.model, input });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| Error::backend("embedding", format!("request failed: {e}")))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| Error::backend("embedding", format!("read body: {e}")))?;
        if !status.is_success() {
            return Err(Error::backend("embedding", format!("status {status}: {body}")));
        }
        let parsed: EmbeddingResponse =
            serde_json::from_str(&body).map_err(|e| Error::backend("embedding", format!("parse response: {e}")))?;

        let mut data = parsed.data;
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));
        if data.len() != input.len() {
            return Err(Error::backend("embedding", format!("expected {} vectors, got {}", input.len(), data.len())));
        }
        let mut out = Vec::with_capacity(data.len());
        for d in data {
            if d.embedding.len() != self.dim {
                return Err(Error::backend(
                    "embedding",
                    format!("model returned dimension {}, configured {}", d.embedding.len(), self.dim),
                ));
            }
            let mut v = d.embedding;
            l2_normalize(&mut v);
            out.push(v);
        }
        debug!(count = out.len(), model = %self.model, "embedded texts");
        Ok(out)
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::backend("embedding", "empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}
