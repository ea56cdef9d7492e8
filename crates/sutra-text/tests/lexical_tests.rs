use std::sync::Arc;

use async_trait::async_trait;
use sutra_core::error::{Error, Result};
use sutra_core::traits::{FailurePolicy, LexicalBackend, PassageStore, Retriever};
use sutra_core::types::{HitItem, Passage, PassageId, PassageKind, RetrievalQuery, ScoredPassage, SourceTag};
use sutra_text::{LexicalRetriever, TantivyPassageIndex};

fn passage(text_id: &str, chunk: u32, content: &str) -> Passage {
	Passage {
		id: PassageId::new(text_id, 1, chunk),
		title: format!("title of {text_id}"),
		char_start: chunk * 100,
		char_end: chunk * 100 + content.chars().count() as u32,
		content: content.to_string(),
		kind: Some(PassageKind::Sutra),
		embedding: None,
	}
}

fn corpus() -> Vec<Passage> {
	vec![
		passage("T0251", 0, "觀自在菩薩行深般若波羅蜜多時照見五蘊皆空"),
		passage("T0251", 1, "色不異空空不異色色即是空空即是色"),
		passage("T0251", 2, "受想行識亦復如是"),
		passage("T0251", 3, "舍利子是諸法空相"),
		passage("T0235", 0, "一切有為法如夢幻泡影"),
	]
}

fn seeded() -> TantivyPassageIndex {
	let index = TantivyPassageIndex::in_memory().expect("index");
	index.index_passages(&corpus()).expect("write");
	index
}

fn terms(ts: &[&str]) -> Vec<String> {
	ts.iter().map(|t| t.to_string()).collect()
}

#[tokio::test]
async fn phrase_matches_only_passages_containing_every_gram() {
	let index = seeded();
	let hits = index.search(&terms(&["色即是空"]), 10).await.expect("search");
	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].passage.id, PassageId::new("T0251", 1, 1));
	assert_eq!(hits[0].passage.kind, Some(PassageKind::Sutra));
	assert_eq!(hits[0].passage.title, "title of T0251");
}

#[tokio::test]
async fn terms_are_alternatives() {
	let index = seeded();
	let hits = index.search(&terms(&["五蘊", "夢幻"]), 10).await.expect("search");
	let mut ids: Vec<PassageId> = hits.into_iter().map(|h| h.passage.id).collect();
	ids.sort();
	assert_eq!(ids, vec![PassageId::new("T0235", 1, 0), PassageId::new("T0251", 1, 0)]);
}

#[tokio::test]
async fn query_syntax_is_treated_as_text() {
	let index = seeded();
	let hits = index.search(&terms(&["text_id:T0251 OR *"]), 10).await.expect("search");
	assert!(hits.is_empty());
	assert!(index.search(&terms(&["，。"]), 10).await.expect("search").is_empty());
	assert!(index.search(&[], 10).await.expect("search").is_empty());
}

#[tokio::test]
async fn neighbors_stay_inside_the_section() {
	let index = seeded();
	let around = index.neighbors(&PassageId::new("T0251", 1, 1), 1).await.expect("neighbors");
	let chunks: Vec<u32> = around.iter().map(|p| p.id.chunk_index).collect();
	assert_eq!(chunks, vec![0, 1, 2]);

	let wide = index.neighbors(&PassageId::new("T0251", 1, 0), 5).await.expect("neighbors");
	assert_eq!(wide.len(), 4);
	assert!(wide.iter().all(|p| p.id.text_id == "T0251"));
	assert_eq!(wide[3].content, "舍利子是諸法空相");
}

#[test]
fn reindexing_replaces_by_identity() {
	let index = seeded();
	assert_eq!(index.num_passages(), 5);
	index.index_passages(&corpus()).expect("rewrite");
	assert_eq!(index.num_passages(), 5);
}

#[tokio::test]
async fn on_disk_index_survives_reopen() {
	let dir = tempfile::tempdir().expect("tempdir");
	{
		let index = TantivyPassageIndex::open_or_create(dir.path()).expect("create");
		index.index_passages(&corpus()).expect("write");
	}
	let reopened = TantivyPassageIndex::open(dir.path()).expect("open");
	assert_eq!(reopened.num_passages(), 5);
	let hits = reopened.search(&terms(&["泡影"]), 3).await.expect("search");
	assert_eq!(hits[0].passage.id.text_id, "T0235");
}

#[tokio::test]
async fn retriever_ranks_from_one() {
	let retriever = LexicalRetriever::new(Arc::new(seeded()), 10);
	assert_eq!(retriever.source(), SourceTag::Lexical);
	assert_eq!(retriever.failure_policy(), FailurePolicy::Degrade);
	let query = RetrievalQuery { lexical_terms: terms(&["空"]), ..Default::default() };
	let hits = retriever.retrieve(&query).await.expect("retrieve");
	assert!(hits.len() >= 2);
	for (i, hit) in hits.iter().enumerate() {
		assert_eq!(hit.rank, i + 1);
		assert_eq!(hit.source, SourceTag::Lexical);
		assert!(matches!(hit.item, HitItem::Passage(_)));
	}
	let scores: Vec<f32> = hits.iter().filter_map(|h| h.raw_score).collect();
	assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

struct Broken;

#[async_trait]
impl LexicalBackend for Broken {
	async fn search(&self, _terms: &[String], _top_k: usize) -> Result<Vec<ScoredPassage>> {
		Err(Error::backend("tantivy", "index unavailable"))
	}
}

#[tokio::test]
async fn retriever_degrades_to_empty_on_backend_error() {
	let retriever = LexicalRetriever::new(Arc::new(Broken), 10);
	let query = RetrievalQuery { lexical_terms: terms(&["空"]), ..Default::default() };
	let hits = retriever.retrieve(&query).await.expect("degrades");
	assert!(hits.is_empty());
}
