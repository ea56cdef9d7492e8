use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use sutra_core::error::Result;
use sutra_core::traits::{FailurePolicy, GlossaryStore, Retriever};
use sutra_core::types::{rank_hits, HitItem, RetrievalHit, RetrievalQuery, SourceTag};

use crate::glossary::sort_matches;

/// Glossary lookups for the question's candidate terms. Store errors yield
/// an empty list.
pub struct DictionaryRetriever {
    store: Arc<dyn GlossaryStore>,
    top_k: usize,
}

impl DictionaryRetriever {
    pub fn new(store: Arc<dyn GlossaryStore>, top_k: usize) -> Self {
        Self { store, top_k }
    }
}

#[async_trait]
impl Retriever for DictionaryRetriever {
    fn source(&self) -> SourceTag {
        SourceTag::Dictionary
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Degrade
    }

    async fn retrieve(&self, query: &RetrievalQuery) -> Result<Vec<RetrievalHit>> {
        if query.dictionary_candidates.is_empty() || self.top_k == 0 {
            return Ok(Vec::new());
        }
        let mut matches = match self.store.lookup(&query.dictionary_candidates, self.top_k).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "glossary lookup failed; continuing without dictionary hits");
                return Ok(Vec::new());
            }
        };
        sort_matches(&mut matches);
        let hits = rank_hits(
            SourceTag::Dictionary,
            matches.into_iter().take(self.top_k).map(|m| (HitItem::Entry(m.entry), Some(m.similarity))),
        );
        debug!(hits = hits.len(), "dictionary retrieval done");
        Ok(hits)
    }
}
