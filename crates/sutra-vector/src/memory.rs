use std::collections::BTreeSet;

use async_trait::async_trait;

use sutra_core::error::{Error, Result};
use sutra_core::traits::{EmbeddingService, VectorBackend};
use sutra_core::types::{Passage, TextId, VectorMatch};
use sutra_embed::cosine_similarity;

use crate::search::sort_matches;

/// Brute-force cosine index held in memory. For development and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryVectorIndex {
    rows: Vec<(Passage, Vec<f32>)>,
}

impl MemoryVectorIndex {
    /// Keeps passages that carry an embedding; the stored copy drops it.
    pub fn new(passages: Vec<Passage>) -> Self {
        let rows = passages
            .into_iter()
            .filter_map(|mut p| {
                let v = p.embedding.take()?;
                Some((p, v))
            })
            .collect();
        Self { rows }
    }

    pub async fn from_embedder(passages: Vec<Passage>, embedder: &dyn EmbeddingService) -> Result<Self> {
        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        let rows = passages
            .into_iter()
            .zip(vectors)
            .map(|(mut p, v)| {
                p.embedding = None;
                (p, v)
            })
            .collect();
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl VectorBackend for MemoryVectorIndex {
    async fn nearest(&self, vector: &[f32], top_k: usize, text_ids: Option<&BTreeSet<TextId>>) -> Result<Vec<VectorMatch>> {
        if let Some((_, v)) = self.rows.first() {
            if v.len() != vector.len() {
                return Err(Error::backend("memory", format!("query dimension {} does not match index dimension {}", vector.len(), v.len())));
            }
        }
        let mut matches: Vec<VectorMatch> = self
            .rows
            .iter()
            .filter(|(p, _)| text_ids.map_or(true, |ids| ids.contains(&p.id.text_id)))
            .map(|(p, v)| VectorMatch { passage: p.clone(), distance: 1.0 - cosine_similarity(vector, v) })
            .collect();
        sort_matches(&mut matches);
        matches.truncate(top_k);
        Ok(matches)
    }
}
