use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use sutra_core::config::QueryConfig;
use sutra_core::types::{RetrievalQuery, TextId};

use crate::tables::{
    is_ascii_stop_word, is_cjk_ideograph, strip_punctuation, CJK_STOP_WORDS, DOMAIN_PHRASES, TEXT_ALIASES,
};

const MIN_CANDIDATE_CHARS: usize = 2;
const MAX_CANDIDATE_CHARS: usize = 4;

/// Turns a raw question into the inputs of the three retrievers.
///
/// All tables are fixed at construction; the expander holds no per-query
/// state and can be shared freely.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    phrases: Vec<String>,
    stop_words: Vec<String>,
    aliases: BTreeMap<String, BTreeSet<TextId>>,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new(&QueryConfig::default())
    }
}

impl QueryExpander {
    pub fn new(config: &QueryConfig) -> Self {
        let mut phrases: Vec<String> = DOMAIN_PHRASES.iter().map(|p| p.to_string()).collect();
        for extra in &config.extra_phrases {
            let extra = extra.trim();
            if !extra.is_empty() && !phrases.iter().any(|p| p == extra) {
                phrases.push(extra.to_string());
            }
        }

        // longest first so "什麼" is removed before "是"
        let mut stop_words: Vec<String> = CJK_STOP_WORDS.iter().map(|s| s.to_string()).collect();
        stop_words.sort_by_key(|s| Reverse(s.chars().count()));

        let mut aliases: BTreeMap<String, BTreeSet<TextId>> = BTreeMap::new();
        for (alias, ids) in TEXT_ALIASES {
            aliases.entry(alias.to_string()).or_default().extend(ids.iter().map(|id| id.to_string()));
        }
        for (alias, ids) in &config.extra_aliases {
            aliases.entry(alias.clone()).or_default().extend(ids.iter().cloned());
        }

        Self { phrases, stop_words, aliases }
    }

    /// Builds the retrieval inputs for one question.
    pub fn expand(&self, question: &str) -> RetrievalQuery {
        let normalized = question.split_whitespace().collect::<Vec<_>>().join(" ");
        let query = RetrievalQuery {
            lexical_terms: self.extract_lexical_terms(&normalized),
            dictionary_candidates: self.extract_dictionary_candidates(&normalized),
            text_scope: self.resolve_text_alias(&normalized),
            question: normalized,
        };
        debug!(
            terms = ?query.lexical_terms,
            candidates = query.dictionary_candidates.len(),
            scope = ?query.text_scope,
            "expanded query"
        );
        query
    }

    /// Known domain phrases win outright; otherwise stop words and punctuation
    /// are stripped and the remaining tokens returned.
    pub fn extract_lexical_terms(&self, question: &str) -> Vec<String> {
        let phrases = self.match_phrases(question);
        if !phrases.is_empty() {
            return phrases;
        }

        let stripped = strip_punctuation(question);
        let mut terms: Vec<String> = Vec::new();
        for token in stripped.split_whitespace() {
            if token.is_ascii() {
                if !is_ascii_stop_word(token) {
                    terms.push(token.to_string());
                }
                continue;
            }
            let mut rest = token.to_string();
            for stop in &self.stop_words {
                if rest.contains(stop.as_str()) {
                    rest = rest.replace(stop.as_str(), " ");
                }
            }
            terms.extend(rest.split_whitespace().map(str::to_string));
        }
        dedup_in_order(&mut terms);

        if terms.is_empty() && !stripped.is_empty() {
            return vec![stripped];
        }
        terms
    }

    /// Every 4-, 3- and 2-character window over runs of CJK ideographs.
    /// Over-generates on purpose; the glossary store's tiers do the filtering.
    pub fn extract_dictionary_candidates(&self, question: &str) -> Vec<String> {
        let stripped = strip_punctuation(question);
        let mut runs: Vec<Vec<char>> = Vec::new();
        let mut current: Vec<char> = Vec::new();
        for c in stripped.chars() {
            if is_cjk_ideograph(c) {
                current.push(c);
            } else if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for len in (MIN_CANDIDATE_CHARS..=MAX_CANDIDATE_CHARS).rev() {
            for run in &runs {
                for window in run.windows(len) {
                    let candidate: String = window.iter().collect();
                    if seen.insert(candidate.clone()) {
                        candidates.push(candidate);
                    }
                }
            }
        }
        candidates
    }

    /// Text ids of every known work named in the question.
    pub fn resolve_text_alias(&self, question: &str) -> Option<BTreeSet<TextId>> {
        let ids: BTreeSet<TextId> = self
            .aliases
            .iter()
            .filter(|(alias, _)| question.contains(alias.as_str()))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect();
        if ids.is_empty() { None } else { Some(ids) }
    }

    /// Matched phrases ordered by first occurrence. A phrase whose every
    /// occurrence sits inside a longer matched phrase is dropped.
    fn match_phrases(&self, question: &str) -> Vec<String> {
        let mut spans: Vec<(&str, Vec<(usize, usize)>)> = Vec::new();
        for phrase in &self.phrases {
            let occurrences: Vec<(usize, usize)> =
                question.match_indices(phrase.as_str()).map(|(start, m)| (start, start + m.len())).collect();
            if !occurrences.is_empty() {
                spans.push((phrase.as_str(), occurrences));
            }
        }

        let mut kept: Vec<(usize, String)> = Vec::new();
        for (phrase, occurrences) in &spans {
            let first_free = occurrences.iter().find(|(start, end)| {
                !spans.iter().any(|(other, other_occ)| {
                    other.len() > phrase.len() && other_occ.iter().any(|(os, oe)| os <= start && end <= oe)
                })
            });
            if let Some((start, _)) = first_free {
                kept.push((*start, phrase.to_string()));
            }
        }
        kept.sort();
        kept.into_iter().map(|(_, phrase)| phrase).collect()
    }
}

fn dedup_in_order(terms: &mut Vec<String>) {
    let mut seen = HashSet::new();
    terms.retain(|t| seen.insert(t.clone()));
}
