use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;
use sutra_core::error::{Error, Result};
use sutra_core::traits::{FailurePolicy, GlossaryStore, Retriever};
use sutra_core::types::{DictionaryEntry, GlossaryMatch, HitItem, MatchTier, RetrievalQuery};
use sutra_dict::{DictionaryRetriever, MemoryGlossary};

fn entry(term: &str, definition: &str) -> DictionaryEntry {
    DictionaryEntry { term: term.into(), definition: definition.into(), provenance: "test".into() }
}

fn glossary() -> MemoryGlossary {
    MemoryGlossary::new(vec![
        entry("緣起", "諸法依因緣而生起"),
        entry("緣起性空", "緣起故無自性"),
        entry("緣生", "因緣所生"),
        entry("空性", "一切法無自性"),
        entry("涅槃", "煩惱寂滅"),
    ])
}

fn candidates(cs: &[&str]) -> Vec<String> {
    cs.iter().map(|c| c.to_string()).collect()
}

fn terms(matches: &[GlossaryMatch]) -> Vec<&str> {
    matches.iter().map(|m| m.entry.term.as_str()).collect()
}

#[tokio::test]
async fn tiers_rank_exact_then_prefix_then_fuzzy() {
    let matches = glossary().lookup(&candidates(&["緣起"]), 10).await.expect("lookup");
    assert_eq!(terms(&matches), vec!["緣起", "緣起性空", "緣生"]);
    assert_eq!(matches[0].tier, MatchTier::Exact);
    assert_eq!(matches[1].tier, MatchTier::Prefix);
    assert_eq!(matches[2].tier, MatchTier::Fuzzy);
    assert!((matches[2].similarity - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn each_entry_appears_once_at_its_best_tier() {
    let matches = glossary().lookup(&candidates(&["緣起性空", "緣起", "性空"]), 10).await.expect("lookup");
    let hits: Vec<_> = matches.iter().filter(|m| m.entry.term == "緣起性空").collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].tier, MatchTier::Exact);
    let tiers: Vec<MatchTier> = matches.iter().map(|m| m.tier).collect();
    assert!(tiers.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn unrelated_candidates_find_nothing() {
    let matches = glossary().lookup(&candidates(&["金剛"]), 10).await.expect("lookup");
    assert!(matches.is_empty());
    assert!(glossary().lookup(&[], 10).await.expect("lookup").is_empty());
}

#[tokio::test]
async fn top_k_truncates() {
    let matches = glossary().lookup(&candidates(&["緣起"]), 2).await.expect("lookup");
    assert_eq!(terms(&matches), vec!["緣起", "緣起性空"]);
}

#[test]
fn loads_list_and_map_files() {
    let mut list = tempfile::NamedTempFile::new().expect("tmp");
    write!(list, r#"[{{"term":"空性","definition":"無自性","provenance":"佛光大辭典"}}, {{"term":"空性","definition":"dup"}}]"#)
        .expect("write");
    let g = MemoryGlossary::load(list.path()).expect("load list");
    assert_eq!(g.len(), 1);

    let mut map = tempfile::NamedTempFile::new().expect("tmp");
    write!(map, r#"{{"涅槃":"寂滅","菩提":"覺"}}"#).expect("write");
    assert_eq!(MemoryGlossary::load(map.path()).expect("load map").len(), 2);

    let missing = MemoryGlossary::load(std::path::Path::new("/nonexistent/glossary.json"));
    assert!(matches!(missing, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn retriever_ranks_entries() {
    let retriever = DictionaryRetriever::new(Arc::new(glossary()), 5);
    assert_eq!(retriever.failure_policy(), FailurePolicy::Degrade);
    let query = RetrievalQuery { dictionary_candidates: candidates(&["空性", "涅槃"]), ..Default::default() };
    let hits = retriever.retrieve(&query).await.expect("retrieve");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].rank, 1);
    // both exact; term order breaks the tie
    match (&hits[0].item, &hits[1].item) {
        (HitItem::Entry(a), HitItem::Entry(b)) => {
            assert_eq!(a.term, "涅槃");
            assert_eq!(b.term, "空性");
        }
        _ => panic!("dictionary hits are entries"),
    }
}

struct Offline;

#[async_trait]
impl GlossaryStore for Offline {
    async fn lookup(&self, _candidates: &[String], _top_k: usize) -> Result<Vec<GlossaryMatch>> {
        Err(Error::backend("glossary", "offline"))
    }
}

#[tokio::test]
async fn retriever_degrades_on_store_error() {
    let retriever = DictionaryRetriever::new(Arc::new(Offline), 5);
    let query = RetrievalQuery { dictionary_candidates: candidates(&["空性"]), ..Default::default() };
    assert!(retriever.retrieve(&query).await.expect("degrades").is_empty());
}

proptest! {
    #[test]
    fn similarity_stays_in_unit_range(a in "\\PC{0,8}", b in "\\PC{0,8}") {
        let s = sutra_dict::levenshtein::similarity(&a, &b);
        prop_assert!((0.0..=1.0).contains(&s));
        prop_assert_eq!(s, sutra_dict::levenshtein::similarity(&b, &a));
    }
}
