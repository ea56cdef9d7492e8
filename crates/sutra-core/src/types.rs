//! Domain types shared by the retrievers, the fusion engine and the assembler.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

pub type TextId = String;

/// Stable identity of a stored passage: `(text, juan, chunk)`.
///
/// Ordering is lexicographic over the tuple, which is what the fusion
/// tie-break relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PassageId {
    pub text_id: TextId,
    pub juan: u32,
    pub chunk_index: u32,
}

impl PassageId {
    pub fn new(text_id: impl Into<TextId>, juan: u32, chunk_index: u32) -> Self {
        Self { text_id: text_id.into(), juan, chunk_index }
    }

    /// True when `other` lives in the same text and juan.
    pub fn same_section(&self, other: &PassageId) -> bool {
        self.text_id == other.text_id && self.juan == other.juan
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.text_id, self.juan, self.chunk_index)
    }
}

/// Genre of the text a passage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassageKind {
    Sutra,
    Vinaya,
    Treatise,
    Commentary,
    Ritual,
    Other,
}

impl PassageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassageKind::Sutra => "sutra",
            PassageKind::Vinaya => "vinaya",
            PassageKind::Treatise => "treatise",
            PassageKind::Commentary => "commentary",
            PassageKind::Ritual => "ritual",
            PassageKind::Other => "other",
        }
    }

    /// Accepts the stored English label or the customary CJK genre names.
    /// Anything unrecognised maps to `Other`.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "sutra" | "經" | "经" => PassageKind::Sutra,
            "vinaya" | "律" => PassageKind::Vinaya,
            "treatise" | "論" | "论" => PassageKind::Treatise,
            "commentary" | "疏" | "注疏" => PassageKind::Commentary,
            "ritual" | "儀軌" | "仪轨" => PassageKind::Ritual,
            _ => PassageKind::Other,
        }
    }
}

/// An addressable unit of source text. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub title: String,
    pub char_start: u32,
    pub char_end: u32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PassageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A glossary term and its definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub term: String,
    pub definition: String,
    #[serde(default)]
    pub provenance: String,
}

/// Which retrieval strategy produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Semantic,
    Lexical,
    Dictionary,
}

impl SourceTag {
    pub const ALL: [SourceTag; 3] = [SourceTag::Semantic, SourceTag::Lexical, SourceTag::Dictionary];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Semantic => "semantic",
            SourceTag::Lexical => "lexical",
            SourceTag::Dictionary => "dictionary",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of anything a retriever can return.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKey {
    Passage(PassageId),
    Term(String),
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Passage(id) => write!(f, "passage:{id}"),
            ItemKey::Term(term) => write!(f, "term:{term}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HitItem {
    Passage(Passage),
    Entry(DictionaryEntry),
}

impl HitItem {
    pub fn key(&self) -> ItemKey {
        match self {
            HitItem::Passage(p) => ItemKey::Passage(p.id.clone()),
            HitItem::Entry(e) => ItemKey::Term(e.term.clone()),
        }
    }
}

/// One entry of a single source's ranked list.
///
/// `rank` is 1-based. `raw_score` is kept for diagnostics only; fusion never
/// reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub item: HitItem,
    pub source: SourceTag,
    pub rank: usize,
    pub raw_score: Option<f32>,
}

impl RetrievalHit {
    pub fn key(&self) -> ItemKey {
        self.item.key()
    }
}

/// Assigns 1-based ranks in iteration order, skipping repeated identities.
pub fn rank_hits<I>(source: SourceTag, items: I) -> Vec<RetrievalHit>
where
    I: IntoIterator<Item = (HitItem, Option<f32>)>,
{
    let mut seen = HashSet::new();
    let mut hits = Vec::new();
    for (item, raw_score) in items {
        if !seen.insert(item.key()) {
            continue;
        }
        let rank = hits.len() + 1;
        hits.push(RetrievalHit { item, source, rank, raw_score });
    }
    hits
}

/// Passage returned by a vector backend with its distance (lower is closer).
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub passage: Passage,
    pub distance: f32,
}

/// Passage returned by a lexical backend with its relevance (higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPassage {
    pub passage: Passage,
    pub score: f32,
}

/// Relevance tier of a glossary match. Declaration order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Exact,
    Prefix,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlossaryMatch {
    pub entry: DictionaryEntry,
    pub tier: MatchTier,
    pub similarity: f32,
}

/// Everything the retrievers need to know about one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalQuery {
    pub question: String,
    pub lexical_terms: Vec<String>,
    pub dictionary_candidates: Vec<String>,
    /// When set, semantic search is restricted to these texts.
    pub text_scope: Option<BTreeSet<TextId>>,
}

/// A prompt for the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(term: &str) -> HitItem {
        HitItem::Entry(DictionaryEntry { term: term.into(), definition: String::new(), provenance: String::new() })
    }

    #[test]
    fn rank_hits_is_one_based_and_skips_duplicates() {
        let hits = rank_hits(SourceTag::Dictionary, vec![(entry("空"), None), (entry("空"), None), (entry("緣起"), Some(0.5))]);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
        assert_eq!(hits[1].key(), ItemKey::Term("緣起".into()));
    }

    #[test]
    fn passage_ids_order_lexicographically() {
        let a = PassageId::new("T0251", 1, 9);
        let b = PassageId::new("T0251", 2, 0);
        let c = PassageId::new("T0262", 1, 0);
        assert!(a < b && b < c);
        assert!(ItemKey::Passage(c) < ItemKey::Term("a".into()));
    }

    #[test]
    fn kind_labels() {
        assert_eq!(PassageKind::from_label("論"), PassageKind::Treatise);
        assert_eq!(PassageKind::from_label("vinaya"), PassageKind::Vinaya);
        assert_eq!(PassageKind::from_label("??"), PassageKind::Other);
    }
}
