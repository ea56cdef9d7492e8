//! Context assembly: neighbor expansion, merge-dedup, per-item truncation
//! and the total character budget.
//!
//! All lengths are in chars (Unicode scalar values).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use sutra_core::config::ContextConfig;
use sutra_core::traits::PassageStore;
use sutra_core::types::{HitItem, Passage, PassageId, PassageKind, SourceTag};

use crate::fusion::FusedResult;

/// Separator between rendered blocks; counted against the total budget.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Marks skipped chunks inside a passage block. Never part of any passage.
pub const GAP_MARKER: &str = "…";

const SENTENCE_ENDS: &[char] = &['。', '！', '？', '；', '.', '!', '?', ';', '\n'];

#[derive(Debug, Clone, PartialEq)]
pub enum BlockOrigin {
    Passage {
        anchor: PassageId,
        title: String,
        kind: Option<PassageKind>,
        /// Every passage whose text is in the block, in chunk order.
        covered: Vec<PassageId>,
        /// Text of each run of consecutive chunks. `content` is these joined
        /// by [`GAP_MARKER`].
        runs: Vec<String>,
    },
    Glossary {
        term: String,
        provenance: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextBlock {
    /// 1-based label shown to the model as `[n]`.
    pub label: usize,
    pub origin: BlockOrigin,
    pub sources: BTreeSet<SourceTag>,
    pub content: String,
    pub truncated: bool,
    pub score: f64,
    pub similarity: Option<f32>,
}

impl ContextBlock {
    pub fn is_passage(&self) -> bool {
        matches!(self.origin, BlockOrigin::Passage { .. })
    }

    /// Text id and juan of a passage block.
    pub fn section(&self) -> Option<(&str, u32)> {
        match &self.origin {
            BlockOrigin::Passage { anchor, .. } => Some((anchor.text_id.as_str(), anchor.juan)),
            BlockOrigin::Glossary { .. } => None,
        }
    }

    /// Source text a citation may quote from; empty for glossary blocks.
    pub fn runs(&self) -> &[String] {
        match &self.origin {
            BlockOrigin::Passage { runs, .. } => runs,
            BlockOrigin::Glossary { .. } => &[],
        }
    }

    pub fn title(&self) -> &str {
        match &self.origin {
            BlockOrigin::Passage { title, .. } => title,
            BlockOrigin::Glossary { term, .. } => term,
        }
    }

    fn header(&self) -> String {
        let sources: Vec<&str> = self.sources.iter().map(SourceTag::as_str).collect();
        let mark = if self.truncated { " (truncated)" } else { "" };
        match &self.origin {
            BlockOrigin::Passage { anchor, title, .. } => format!(
                "[{}] {} | textId={} juan={} | via {}{}",
                self.label,
                title,
                anchor.text_id,
                anchor.juan,
                sources.join(","),
                mark
            ),
            BlockOrigin::Glossary { term, .. } => format!("[{}] {}{}", self.label, term, mark),
        }
    }

    /// Header line plus content; the unit the total budget is charged in.
    pub fn render(&self) -> String {
        format!("{}\n{}", self.header(), self.content)
    }

    pub fn rendered_chars(&self) -> usize {
        self.header().chars().count() + 1 + self.content.chars().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyMetrics {
    pub candidates: usize,
    pub included: usize,
    pub dropped: usize,
    pub merged: usize,
    pub truncated: usize,
    pub avg_block_chars: f64,
    pub max_block_chars: usize,
    pub total_chars: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub blocks: Vec<ContextBlock>,
    pub metrics: AssemblyMetrics,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn passage_blocks(&self) -> impl Iterator<Item = &ContextBlock> {
        self.blocks.iter().filter(|b| b.is_passage())
    }

    pub fn glossary_blocks(&self) -> impl Iterator<Item = &ContextBlock> {
        self.blocks.iter().filter(|b| !b.is_passage())
    }

    pub fn render_passages(&self) -> String {
        self.passage_blocks().map(ContextBlock::render).collect::<Vec<_>>().join(BLOCK_SEPARATOR)
    }

    pub fn render_glossary(&self) -> String {
        self.glossary_blocks().map(ContextBlock::render).collect::<Vec<_>>().join(BLOCK_SEPARATOR)
    }
}

/// Cuts `text` to at most `max_chars`, preferring to end on a sentence
/// boundary inside the final quarter. Returns the text and whether it was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    let total = text.chars().count();
    if total <= max_chars {
        return (text.to_string(), false);
    }
    let head: Vec<char> = text.chars().take(max_chars).collect();
    let floor = max_chars - max_chars / 4;
    let cut = head
        .iter()
        .enumerate()
        .rev()
        .take_while(|(i, _)| *i + 1 >= floor.max(1))
        .find(|(_, c)| SENTENCE_ENDS.contains(c))
        .map_or(max_chars, |(i, _)| i + 1);
    (head[..cut].iter().collect(), true)
}

pub struct ContextAssembler {
    config: ContextConfig,
    passages: Option<Arc<dyn PassageStore>>,
}

struct Expanded {
    anchor: Passage,
    around: Vec<Passage>,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig, passages: Option<Arc<dyn PassageStore>>) -> Self {
        Self { config, passages }
    }

    async fn expand(&self, anchor: &Passage) -> Vec<Passage> {
        let window = self.config.neighbor_window;
        let mut around = match (&self.passages, window) {
            (Some(store), w) if w > 0 => match store.neighbors(&anchor.id, w).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(passage = %anchor.id, error = %e, "neighbor lookup failed; using the hit alone");
                    Vec::new()
                }
            },
            _ => Vec::new(),
        };
        around.retain(|p| p.id.same_section(&anchor.id));
        if !around.iter().any(|p| p.id == anchor.id) {
            around.push(anchor.clone());
        }
        around.sort_by_key(|p| p.id.chunk_index);
        around.dedup_by(|a, b| a.id == b.id);
        around
    }

    /// Anchor first, then neighbors nearest-first while they fit the item
    /// budget. Returns the kept passages in chunk order.
    fn fit_window(&self, expanded: &Expanded, covered: &HashMap<PassageId, usize>) -> (Vec<Passage>, bool) {
        let budget = self.config.max_item_chars;
        let (anchor_text, cut) = truncate_chars(&expanded.anchor.content, budget);
        let mut anchor = expanded.anchor.clone();
        anchor.content = anchor_text;
        let mut kept = vec![anchor];
        if cut {
            return (kept, true);
        }

        let anchor_chunk = expanded.anchor.id.chunk_index;
        let mut neighbors: Vec<&Passage> = expanded
            .around
            .iter()
            .filter(|p| p.id != expanded.anchor.id && !covered.contains_key(&p.id))
            .collect();
        neighbors.sort_by_key(|p| (p.id.chunk_index.abs_diff(anchor_chunk), p.id.chunk_index));
        for p in neighbors {
            // gap markers count against the budget too
            let mut trial = kept.clone();
            trial.push(p.clone());
            trial.sort_by_key(|t| t.id.chunk_index);
            let len = joined_chars(&trial);
            if len <= budget {
                kept = trial;
            }
        }
        (kept, false)
    }

    pub async fn assemble(&self, fused: &[FusedResult]) -> AssembledContext {
        let anchors: Vec<Option<&Passage>> = fused
            .iter()
            .map(|r| match &r.item {
                HitItem::Passage(p) => Some(p),
                HitItem::Entry(_) => None,
            })
            .collect();
        let expansions = join_all(anchors.iter().map(|a| async move {
            match a {
                Some(p) => Some(Expanded { anchor: (*p).clone(), around: self.expand(p).await }),
                None => None,
            }
        }))
        .await;

        let mut metrics = AssemblyMetrics { candidates: fused.len(), ..Default::default() };
        let mut blocks: Vec<ContextBlock> = Vec::new();
        let mut covered: HashMap<PassageId, usize> = HashMap::new();
        let mut total = 0usize;

        for (result, expanded) in fused.iter().zip(expansions) {
            if let HitItem::Passage(p) = &result.item {
                if let Some(&idx) = covered.get(&p.id) {
                    blocks[idx].sources.extend(result.sources.iter().copied());
                    metrics.merged += 1;
                    metrics.included += 1;
                    continue;
                }
            }

            let label = blocks.len() + 1;
            let block = match (&result.item, expanded) {
                (HitItem::Passage(p), Some(expanded)) => {
                    let (kept, truncated) = self.fit_window(&expanded, &covered);
                    let runs = contiguous_runs(&kept);
                    let content = runs.join(GAP_MARKER);
                    ContextBlock {
                        label,
                        origin: BlockOrigin::Passage {
                            anchor: p.id.clone(),
                            title: p.title.clone(),
                            kind: p.kind,
                            covered: kept.iter().map(|k| k.id.clone()).collect(),
                            runs,
                        },
                        sources: result.sources.clone(),
                        content,
                        truncated,
                        score: result.score,
                        similarity: result.similarity,
                    }
                }
                (HitItem::Entry(e), _) => {
                    let (content, truncated) = truncate_chars(&e.definition, self.config.max_item_chars);
                    ContextBlock {
                        label,
                        origin: BlockOrigin::Glossary { term: e.term.clone(), provenance: e.provenance.clone() },
                        sources: result.sources.clone(),
                        content,
                        truncated,
                        score: result.score,
                        similarity: None,
                    }
                }
                (HitItem::Passage(_), None) => continue,
            };

            let separator = if blocks.is_empty() { 0 } else { BLOCK_SEPARATOR.chars().count() };
            let cost = separator + block.rendered_chars();
            if total + cost > self.config.max_total_chars {
                debug!(label, cost, total, "total budget reached");
                break;
            }
            total += cost;
            if block.truncated {
                metrics.truncated += 1;
            }
            if let BlockOrigin::Passage { covered: ids, .. } = &block.origin {
                for id in ids {
                    covered.insert(id.clone(), blocks.len());
                }
            }
            metrics.included += 1;
            blocks.push(block);
        }

        metrics.dropped = metrics.candidates - metrics.included;
        metrics.total_chars = total;
        let lengths: Vec<usize> = blocks.iter().map(|b| b.content.chars().count()).collect();
        metrics.max_block_chars = lengths.iter().copied().max().unwrap_or(0);
        metrics.avg_block_chars =
            if lengths.is_empty() { 0.0 } else { lengths.iter().sum::<usize>() as f64 / lengths.len() as f64 };
        debug!(
            included = metrics.included,
            dropped = metrics.dropped,
            merged = metrics.merged,
            total_chars = metrics.total_chars,
            "assembled context"
        );
        AssembledContext { blocks, metrics }
    }
}

/// Concatenated text of each run of consecutive chunks. Input is in chunk order.
fn contiguous_runs(passages: &[Passage]) -> Vec<String> {
    let mut runs: Vec<String> = Vec::new();
    let mut prev: Option<u32> = None;
    for p in passages {
        let follows = prev.is_some_and(|c| p.id.chunk_index == c + 1);
        prev = Some(p.id.chunk_index);
        if follows {
            if let Some(run) = runs.last_mut() {
                run.push_str(&p.content);
                continue;
            }
        }
        runs.push(p.content.clone());
    }
    runs
}

/// Length of the block content the passages render to, markers included.
fn joined_chars(passages: &[Passage]) -> usize {
    let runs = contiguous_runs(passages);
    let gaps = runs.len().saturating_sub(1);
    runs.iter().map(|r| r.chars().count()).sum::<usize>() + gaps * GAP_MARKER.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_chars("色即是空", 10), ("色即是空".to_string(), false));
    }

    #[test]
    fn cut_prefers_sentence_end_in_last_quarter() {
        let text = "一二三四五六七。九十一二三四五六";
        let (cut, truncated) = truncate_chars(text, 10);
        assert!(truncated);
        assert_eq!(cut, "一二三四五六七。");
    }

    #[test]
    fn cut_falls_back_to_hard_limit() {
        let text = "一。三四五六七八九十一二三";
        let (cut, truncated) = truncate_chars(text, 10);
        assert!(truncated);
        assert_eq!(cut.chars().count(), 10);
    }

    #[test]
    fn runs_split_at_gaps() {
        let p = |c: u32, s: &str| Passage {
            id: PassageId::new("T1", 1, c),
            title: String::new(),
            char_start: 0,
            char_end: 0,
            content: s.into(),
            kind: None,
            embedding: None,
        };
        assert_eq!(contiguous_runs(&[p(1, "甲"), p(2, "乙"), p(4, "丁")]), vec!["甲乙", "丁"]);
        assert_eq!(joined_chars(&[p(1, "甲"), p(2, "乙"), p(4, "丁")]), 4);
    }
}
