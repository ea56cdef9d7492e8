//! Seams to the external collaborators and the retriever strategy interface.
//!
//! Every backend is async and object safe so the engine can hold
//! `Arc<dyn ...>` handles chosen at construction time.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::Result;
use crate::types::{
    GlossaryMatch, Passage, PassageId, Prompt, RetrievalHit, RetrievalQuery, ScoredPassage, SourceTag, TextId,
    VectorMatch,
};

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Nearest passages to `vector`, closest first. `text_ids` restricts the
    /// search to the given texts when present.
    async fn nearest(&self, vector: &[f32], top_k: usize, text_ids: Option<&BTreeSet<TextId>>) -> Result<Vec<VectorMatch>>;
}

#[async_trait]
pub trait LexicalBackend: Send + Sync {
    /// Terms are passed as data, never spliced into a query string.
    async fn search(&self, terms: &[String], top_k: usize) -> Result<Vec<ScoredPassage>>;
}

#[async_trait]
pub trait GlossaryStore: Send + Sync {
    async fn lookup(&self, candidates: &[String], top_k: usize) -> Result<Vec<GlossaryMatch>>;
}

#[async_trait]
pub trait PassageStore: Send + Sync {
    /// Passages of the same text and juan whose chunk index lies within
    /// `window` of `id`, the passage itself included, ordered by chunk index.
    async fn neighbors(&self, id: &PassageId, window: u32) -> Result<Vec<Passage>>;
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Returns the raw model payload. Callers must treat it as untrusted.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// How the engine treats a retriever that errors or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The request fails.
    Fatal,
    /// The source contributes an empty list.
    Degrade,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    fn source(&self) -> SourceTag;
    fn failure_policy(&self) -> FailurePolicy;
    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalHit>>;
}
