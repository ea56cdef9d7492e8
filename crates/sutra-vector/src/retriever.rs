use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use sutra_core::error::Result;
use sutra_core::traits::{EmbeddingService, FailurePolicy, Retriever, VectorBackend};
use sutra_core::types::{rank_hits, HitItem, RetrievalHit, RetrievalQuery, SourceTag};

use crate::search::sort_matches;

/// Embedding plus nearest-neighbour search. The primary signal: any error is
/// returned to the caller.
pub struct SemanticRetriever {
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorBackend>,
    top_k: usize,
    policy: FailurePolicy,
}

impl SemanticRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingService>, index: Arc<dyn VectorBackend>, top_k: usize) -> Self {
        Self { embedder, index, top_k, policy: FailurePolicy::Fatal }
    }

    /// Lets a semantic failure degrade like the other sources.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl Retriever for SemanticRetriever {
    fn source(&self) -> SourceTag {
        SourceTag::Semantic
    }

    fn failure_policy(&self) -> FailurePolicy {
        self.policy
    }

    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalHit>> {
        if self.top_k == 0 || query.question.trim().is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(&query.question).await?;
        let mut matches = self.index.nearest(&vector, self.top_k, query.text_scope.as_ref()).await?;
        sort_matches(&mut matches);
        let hits = rank_hits(
            SourceTag::Semantic,
            matches.into_iter().take(self.top_k).map(|m| (HitItem::Passage(m.passage), Some(1.0 - m.distance))),
        );
        debug!(hits = hits.len(), scoped = query.text_scope.is_some(), "semantic retrieval done");
        Ok(hits)
    }
}
