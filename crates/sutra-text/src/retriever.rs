use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use sutra_core::error::Result;
use sutra_core::traits::{FailurePolicy, LexicalBackend, Retriever};
use sutra_core::types::{rank_hits, HitItem, RetrievalHit, RetrievalQuery, SourceTag};

/// Best-effort keyword signal. Backend errors yield an empty list.
pub struct LexicalRetriever {
	backend: Arc<dyn LexicalBackend>,
	top_k: usize,
}

impl LexicalRetriever {
	pub fn new(backend: Arc<dyn LexicalBackend>, top_k: usize) -> Self {
		Self { backend, top_k }
	}
}

#[async_trait]
impl Retriever for LexicalRetriever {
	fn source(&self) -> SourceTag {
		SourceTag::Lexical
	}

	fn failure_policy(&self) -> FailurePolicy {
		FailurePolicy::Degrade
	}

	async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalHit>> {
		if query.lexical_terms.is_empty() || self.top_k == 0 {
			return Ok(Vec::new());
		}
		let mut scored = match self.backend.search(&query.lexical_terms, self.top_k).await {
			Ok(scored) => scored,
			Err(e) => {
				warn!(error = %e, "lexical backend failed; continuing without lexical hits");
				return Ok(Vec::new());
			}
		};
		// stable order for equal scores
		scored.sort_by(|a, b| {
			b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal).then_with(|| a.passage.id.cmp(&b.passage.id))
		});
		let hits = rank_hits(
			SourceTag::Lexical,
			scored.into_iter().take(self.top_k).map(|s| (HitItem::Passage(s.passage), Some(s.score))),
		);
		debug!(hits = hits.len(), terms = ?query.lexical_terms, "lexical retrieval done");
		Ok(hits)
	}
}
