use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use sutra_core::error::{Error, Result};
use sutra_core::traits::GlossaryStore;
use sutra_core::types::{DictionaryEntry, GlossaryMatch, MatchTier};

use crate::levenshtein::similarity;

pub const DEFAULT_FUZZY_THRESHOLD: f32 = 0.5;

/// Accepted on-disk shapes: a list of entries, or a `term -> definition` map.
#[derive(Deserialize)]
#[serde(untagged)]
enum GlossaryFile {
    Entries(Vec<DictionaryEntry>),
    Map(BTreeMap<String, String>),
}

/// In-memory glossary with tiered lookup: exact, then prefix, then fuzzy.
#[derive(Debug, Clone)]
pub struct MemoryGlossary {
    entries: BTreeMap<String, DictionaryEntry>,
    fuzzy_threshold: f32,
}

impl MemoryGlossary {
    /// First entry wins when a term repeats.
    pub fn new(entries: impl IntoIterator<Item = DictionaryEntry>) -> Self {
        let mut map = BTreeMap::new();
        for entry in entries {
            let term = entry.term.trim().to_string();
            if term.is_empty() {
                continue;
            }
            if map.contains_key(&term) {
                warn!(term = %term, "duplicate glossary term; keeping the first definition");
                continue;
            }
            map.insert(term.clone(), DictionaryEntry { term, ..entry });
        }
        Self { entries: map, fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD }
    }

    pub fn with_fuzzy_threshold(mut self, threshold: f32) -> Self {
        self.fuzzy_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(format!("glossary {}", path.display())),
            _ => Error::Operation(format!("read {}: {e}", path.display())),
        })?;
        let parsed: GlossaryFile = serde_json::from_str(&raw)
            .map_err(|e| Error::Operation(format!("parse glossary {}: {e}", path.display())))?;
        let glossary = match parsed {
            GlossaryFile::Entries(entries) => Self::new(entries),
            GlossaryFile::Map(map) => Self::new(map.into_iter().map(|(term, definition)| DictionaryEntry {
                term,
                definition,
                provenance: String::new(),
            })),
        };
        info!(path = %path.display(), terms = glossary.len(), "loaded glossary");
        Ok(glossary)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Best tier and similarity of `term` against any candidate.
    fn best_match(&self, term: &str, candidates: &[&str]) -> Option<(MatchTier, f32)> {
        let term_len = term.chars().count();
        let mut best: Option<(MatchTier, f32)> = None;
        for candidate in candidates {
            let cand_len = candidate.chars().count();
            let found = if *candidate == term {
                Some((MatchTier::Exact, 1.0))
            } else if cand_len >= 2 && term.starts_with(candidate) {
                Some((MatchTier::Prefix, cand_len as f32 / term_len as f32))
            } else {
                // distance is at least the length difference
                let bound = 1.0 - cand_len.abs_diff(term_len) as f32 / cand_len.max(term_len) as f32;
                if bound < self.fuzzy_threshold {
                    None
                } else {
                    let sim = similarity(candidate, term);
                    (sim >= self.fuzzy_threshold && sim > 0.0).then_some((MatchTier::Fuzzy, sim))
                }
            };
            if let Some((tier, sim)) = found {
                let better = match best {
                    None => true,
                    Some((bt, bs)) => tier < bt || (tier == bt && sim > bs),
                };
                if better {
                    best = Some((tier, sim));
                }
            }
        }
        best
    }
}

/// Tier first, then similarity descending, then term.
pub fn sort_matches(matches: &mut [GlossaryMatch]) {
    matches.sort_by(|a, b| {
        a.tier
            .cmp(&b.tier)
            .then_with(|| b.similarity.total_cmp(&a.similarity))
            .then_with(|| a.entry.term.cmp(&b.entry.term))
    });
}

#[async_trait]
impl GlossaryStore for MemoryGlossary {
    async fn lookup(&self, candidates: &[String], top_k: usize) -> Result<Vec<GlossaryMatch>> {
        let candidates: Vec<&str> = candidates.iter().map(|c| c.trim()).filter(|c| !c.is_empty()).collect();
        if candidates.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let mut matches: Vec<GlossaryMatch> = self
            .entries
            .values()
            .filter_map(|entry| {
                self.best_match(&entry.term, &candidates)
                    .map(|(tier, similarity)| GlossaryMatch { entry: entry.clone(), tier, similarity })
            })
            .collect();
        sort_matches(&mut matches);
        matches.truncate(top_k);
        Ok(matches)
    }
}
