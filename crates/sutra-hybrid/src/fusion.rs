//! Weighted reciprocal rank fusion: `score = Σ w_s / (k + r_s)`.
//!
//! Combines the per-source ranked lists without normalizing their native
//! scores; only ranks enter the math.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use sutra_core::config::{FusionConfig, SourceWeights};
use sutra_core::types::{HitItem, ItemKey, RetrievalHit, SourceTag};

/// One item after fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub item: HitItem,
    pub score: f64,
    pub sources: BTreeSet<SourceTag>,
    pub ranks: BTreeMap<SourceTag, usize>,
    /// Semantic similarity when the semantic source returned the item.
    pub similarity: Option<f32>,
}

impl FusedResult {
    pub fn key(&self) -> ItemKey {
        self.item.key()
    }

    pub fn multi_hit(&self) -> bool {
        self.sources.len() >= 2
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionStats {
    /// Distinct items across all lists, before truncation.
    pub distinct_items: usize,
    pub returned: usize,
    pub multi_hit_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    pub results: Vec<FusedResult>,
    pub stats: FusionStats,
}

impl FusionOutcome {
    /// True when no source produced anything.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FusionEngine {
    weights: SourceWeights,
    rrf_k: u32,
    final_top_k: usize,
}

struct Accumulator {
    item: HitItem,
    ranks: BTreeMap<SourceTag, usize>,
    similarity: Option<f32>,
}

impl FusionEngine {
    pub fn new(config: &FusionConfig) -> Self {
        Self { weights: config.weights, rrf_k: config.rrf_k, final_top_k: config.final_top_k }
    }

    /// Contribution of one appearance at 1-based `rank` in `source`'s list.
    pub fn contribution(&self, source: SourceTag, rank: usize) -> f64 {
        self.weights.weight(source) / (f64::from(self.rrf_k) + rank as f64)
    }

    /// Fuses any number of lists. A repeated identity inside one source keeps
    /// its best rank; failed sources are simply absent or empty.
    pub fn fuse(&self, lists: &[Vec<RetrievalHit>]) -> FusionOutcome {
        let mut acc: BTreeMap<ItemKey, Accumulator> = BTreeMap::new();
        for hit in lists.iter().flatten() {
            let entry = acc.entry(hit.key()).or_insert_with(|| Accumulator {
                item: hit.item.clone(),
                ranks: BTreeMap::new(),
                similarity: None,
            });
            let best = entry.ranks.entry(hit.source).or_insert(hit.rank);
            if hit.rank <= *best {
                *best = hit.rank;
                if hit.source == SourceTag::Semantic {
                    entry.similarity = hit.raw_score;
                }
            }
        }

        let distinct_items = acc.len();
        let mut results: Vec<FusedResult> = acc
            .into_values()
            .map(|a| {
                let score = a.ranks.iter().map(|(source, rank)| self.contribution(*source, *rank)).sum();
                FusedResult { sources: a.ranks.keys().copied().collect(), item: a.item, score, ranks: a.ranks, similarity: a.similarity }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.sources.len().cmp(&a.sources.len()))
                .then_with(|| a.key().cmp(&b.key()))
        });
        results.truncate(self.final_top_k);

        let stats = FusionStats {
            distinct_items,
            returned: results.len(),
            multi_hit_count: results.iter().filter(|r| r.multi_hit()).count(),
        };
        debug!(distinct = stats.distinct_items, returned = stats.returned, multi_hit = stats.multi_hit_count, "fused");
        FusionOutcome { results, stats }
    }
}
