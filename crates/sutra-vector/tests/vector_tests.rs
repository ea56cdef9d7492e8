use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use sutra_core::error::{Error, Result};
use sutra_core::traits::{EmbeddingService, FailurePolicy, Retriever, VectorBackend};
use sutra_core::types::{HitItem, Passage, PassageId, PassageKind, RetrievalQuery, SourceTag};
use sutra_embed::HashEmbedder;
use sutra_vector::search::{is_safe_text_id, text_filter};
use sutra_vector::{LanceVectorIndex, MemoryVectorIndex, SemanticRetriever};

const DIM: usize = 64;

fn passage(text_id: &str, chunk: u32, content: &str) -> Passage {
    Passage {
        id: PassageId::new(text_id, 1, chunk),
        title: format!("{text_id} title"),
        char_start: 0,
        char_end: content.chars().count() as u32,
        content: content.to_string(),
        kind: if chunk == 0 { Some(PassageKind::Sutra) } else { None },
        embedding: None,
    }
}

fn corpus() -> Vec<Passage> {
    vec![
        passage("T0251", 0, "觀自在菩薩行深般若波羅蜜多時照見五蘊皆空"),
        passage("T0251", 1, "色不異空空不異色色即是空空即是色"),
        passage("T0235", 0, "一切有為法如夢幻泡影如露亦如電"),
        passage("T0235", 1, "凡所有相皆是虛妄若見諸相非相則見如來"),
    ]
}

fn scope(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn filter_admits_only_plain_ids() {
    assert!(is_safe_text_id("T0251"));
    assert!(is_safe_text_id("X01n0001_a.b-c"));
    assert!(!is_safe_text_id("T0251' OR '1'='1"));
    assert!(!is_safe_text_id(""));
    assert_eq!(text_filter(&scope(&["T0251", "T0235"])).as_deref(), Some("text_id IN ('T0235', 'T0251')"));
    assert_eq!(text_filter(&scope(&["a b"])), None);
}

#[tokio::test]
async fn lance_round_trip_with_scope() -> Result<()> {
    let tmp = tempfile::tempdir().map_err(|e| Error::Operation(e.to_string()))?;
    let uri = tmp.path().to_string_lossy().to_string();
    let embedder = HashEmbedder::new(DIM);
    let index = LanceVectorIndex::open(&uri, "passages", DIM).await?;

    assert_eq!(index.add_passages(&corpus(), &embedder, false).await?, 4);
    assert_eq!(index.num_passages().await?, 4);
    // upsert by identity
    index.add_passages(&corpus(), &embedder, false).await?;
    assert_eq!(index.num_passages().await?, 4);

    let q = embedder.embed_sync("色不異空空不異色色即是空空即是色");
    let hits = index.nearest(&q, 3, None).await?;
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].passage.id, PassageId::new("T0251", 1, 1));
    assert!(hits[0].distance < 1e-3);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(hits[0].passage.kind, None);

    let scoped = index.nearest(&q, 10, Some(&scope(&["T0235"]))).await?;
    assert_eq!(scoped.len(), 2);
    assert!(scoped.iter().all(|m| m.passage.id.text_id == "T0235"));

    let nothing = index.nearest(&q, 10, Some(&scope(&["'; drop"]))).await?;
    assert!(nothing.is_empty());

    assert!(index.nearest(&[0.0; 3], 3, None).await.is_err());
    Ok(())
}

#[tokio::test]
async fn memory_index_orders_by_distance() -> Result<()> {
    let embedder = HashEmbedder::new(DIM);
    let index = MemoryVectorIndex::from_embedder(corpus(), &embedder).await?;
    assert_eq!(index.len(), 4);
    let q = embedder.embed_sync("凡所有相皆是虛妄若見諸相非相則見如來");
    let hits = index.nearest(&q, 2, None).await?;
    assert_eq!(hits[0].passage.id, PassageId::new("T0235", 1, 1));
    assert_eq!(hits.len(), 2);
    let scoped = index.nearest(&q, 5, Some(&scope(&["T0251"]))).await?;
    assert!(scoped.iter().all(|m| m.passage.id.text_id == "T0251"));
    Ok(())
}

#[tokio::test]
async fn semantic_retriever_ranks_from_one() -> Result<()> {
    let embedder = Arc::new(HashEmbedder::new(DIM));
    let index = Arc::new(MemoryVectorIndex::from_embedder(corpus(), embedder.as_ref()).await?);
    let retriever = SemanticRetriever::new(embedder, index, 10);
    assert_eq!(retriever.failure_policy(), FailurePolicy::Fatal);

    let query = RetrievalQuery { question: "色即是空".into(), ..Default::default() };
    let hits = retriever.retrieve(&query).await?;
    assert_eq!(hits.len(), 4);
    for (i, hit) in hits.iter().enumerate() {
        assert_eq!(hit.rank, i + 1);
        assert_eq!(hit.source, SourceTag::Semantic);
    }
    match &hits[0].item {
        HitItem::Passage(p) => assert_eq!(p.id.text_id, "T0251"),
        HitItem::Entry(_) => panic!("semantic hits are passages"),
    }
    Ok(())
}

struct DownEmbedder;

#[async_trait]
impl EmbeddingService for DownEmbedder {
    fn dim(&self) -> usize {
        DIM
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::backend("embedding", "connection refused"))
    }
}

#[tokio::test]
async fn semantic_retriever_surfaces_embedding_errors() {
    let retriever = SemanticRetriever::new(Arc::new(DownEmbedder), Arc::new(MemoryVectorIndex::default()), 10);
    let query = RetrievalQuery { question: "色即是空".into(), ..Default::default() };
    let err = retriever.retrieve(&query).await.expect_err("fails fast");
    assert!(matches!(err, Error::Backend { backend: "embedding", .. }));
}
