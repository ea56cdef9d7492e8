//! sutra-embed
//!
//! Embedding services behind `sutra_core::traits::EmbeddingService`: an HTTP
//! client for OpenAI-compatible servers and a deterministic hash embedder.
//! Respects `APP_USE_FAKE_EMBEDDINGS=1` to force the hash embedder.

use std::sync::Arc;

use tracing::info;

use sutra_core::config::{EmbeddingConfig, EmbeddingProvider};
use sutra_core::error::Result;
use sutra_core::traits::EmbeddingService;

pub mod hash;
pub mod http;
pub mod pool;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;
pub use pool::{cosine_similarity, l2_normalize};

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingService>> {
    if use_fake_embeddings() || config.provider == EmbeddingProvider::Hash {
        info!(dim = config.dimension, "using hash embedder");
        return Ok(Arc::new(HashEmbedder::new(config.dimension)));
    }
    info!(endpoint = %config.endpoint, model = %config.model, "using http embedder");
    Ok(Arc::new(HttpEmbedder::from_config(config)?))
}
