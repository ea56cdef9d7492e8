//! Request orchestration: expansion, concurrent retrieval, fusion, assembly,
//! generation and grounding.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use sutra_core::config::EngineConfig;
use sutra_core::traits::{
    EmbeddingService, FailurePolicy, GenerationService, GlossaryStore, LexicalBackend, PassageStore, Retriever,
    VectorBackend,
};
use sutra_core::types::{ItemKey, RetrievalHit, RetrievalQuery, SourceTag};
use sutra_dict::DictionaryRetriever;
use sutra_query::QueryExpander;
use sutra_text::LexicalRetriever;
use sutra_vector::SemanticRetriever;

use crate::assemble::{AssembledContext, AssemblyMetrics, BlockOrigin, ContextAssembler};
use crate::contract::{ground_points, parse_answer, AnswerMeta, DeepAnswerResponse, GroundingStats, RawAnswer, SourceRef};
use crate::fusion::{FusionEngine, FusionStats};
use crate::prompt::build_prompt;

pub const NO_MATERIAL_SUMMARY: &str = "未能在所檢索的經文中找到與此問題相關的資料。";

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("invalid question: {0}")]
    InvalidQuestion(String),
    #[error("{retriever} retrieval failed: {reason}")]
    Retrieval { retriever: SourceTag, reason: String },
    #[error("generation failed: {0}")]
    Generation(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerOptions {
    pub include_performance: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source: SourceTag,
    pub status: SourceStatus,
    pub hits: usize,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub expansion_ms: u64,
    pub sources: Vec<SourceReport>,
    pub retrieval_ms: u64,
    pub fusion_ms: u64,
    pub fusion: FusionStats,
    pub assembly_ms: u64,
    pub assembly: AssemblyMetrics,
    pub generation_attempts: u32,
    pub generation_ms: u64,
    /// The model returned fewer points or follow-ups than requested.
    pub answer_undersized: bool,
    pub citations: GroundingStats,
    pub total_ms: u64,
}

/// Backends the three standard retrievers are built from.
pub struct Backends {
    pub embedder: Arc<dyn EmbeddingService>,
    pub vectors: Arc<dyn VectorBackend>,
    pub lexical: Arc<dyn LexicalBackend>,
    pub glossary: Arc<dyn GlossaryStore>,
    pub passages: Option<Arc<dyn PassageStore>>,
    pub generator: Arc<dyn GenerationService>,
}

/// Answers one question per call. Holds only immutable configuration and
/// shared read-only backends; concurrent calls share nothing mutable.
pub struct DeepAnswerEngine {
    expander: QueryExpander,
    retrievers: Vec<Arc<dyn Retriever>>,
    fusion: FusionEngine,
    assembler: ContextAssembler,
    generator: Arc<dyn GenerationService>,
    retrieval_timeout: Duration,
    max_attempts: u32,
}

struct RetrievalRound {
    lists: Vec<Vec<RetrievalHit>>,
    reports: Vec<SourceReport>,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl DeepAnswerEngine {
    /// Validates `config` once; the engine never re-reads it.
    pub fn new(
        config: &EngineConfig,
        retrievers: Vec<Arc<dyn Retriever>>,
        passages: Option<Arc<dyn PassageStore>>,
        generator: Arc<dyn GenerationService>,
    ) -> sutra_core::Result<Self> {
        config.validate()?;
        Ok(Self {
            expander: QueryExpander::new(&config.query),
            retrievers,
            fusion: FusionEngine::new(&config.fusion),
            assembler: ContextAssembler::new(config.context.clone(), passages),
            generator,
            retrieval_timeout: config.retrieval.timeout(),
            max_attempts: config.generation.max_attempts,
        })
    }

    /// Semantic, lexical and dictionary retrievers over the given backends.
    pub fn with_backends(config: &EngineConfig, backends: Backends) -> sutra_core::Result<Self> {
        let r = &config.retrieval;
        let semantic_policy = if r.semantic_required { FailurePolicy::Fatal } else { FailurePolicy::Degrade };
        let retrievers: Vec<Arc<dyn Retriever>> = vec![
            Arc::new(
                SemanticRetriever::new(backends.embedder, backends.vectors, r.semantic_top_k)
                    .with_failure_policy(semantic_policy),
            ),
            Arc::new(LexicalRetriever::new(backends.lexical, r.lexical_top_k)),
            Arc::new(DictionaryRetriever::new(backends.glossary, r.dictionary_top_k)),
        ];
        Self::new(config, retrievers, backends.passages, backends.generator)
    }

    pub async fn answer_question(&self, question: &str) -> Result<DeepAnswerResponse, AnswerError> {
        self.answer_question_with(question, AnswerOptions::default()).await
    }

    pub async fn answer_question_with(
        &self,
        question: &str,
        options: AnswerOptions,
    ) -> Result<DeepAnswerResponse, AnswerError> {
        let started = Instant::now();
        if question.trim().is_empty() {
            return Err(AnswerError::InvalidQuestion("question is empty".into()));
        }
        let mut perf = PerformanceReport::default();

        let t = Instant::now();
        let query = self.expander.expand(question);
        perf.expansion_ms = millis(t.elapsed());

        let t = Instant::now();
        let round = self.retrieve_all(&query).await?;
        let retrieval_time = t.elapsed();
        perf.retrieval_ms = millis(retrieval_time);
        perf.sources = round.reports;
        let total_passages_searched = count_passages(&round.lists);

        let t = Instant::now();
        let fused = self.fusion.fuse(&round.lists);
        perf.fusion_ms = millis(t.elapsed());
        perf.fusion = fused.stats.clone();

        let t = Instant::now();
        let context = self.assembler.assemble(&fused.results).await;
        perf.assembly_ms = millis(t.elapsed());
        perf.assembly = context.metrics.clone();

        let mut meta = AnswerMeta {
            total_passages_searched,
            retrieval_time_ms: perf.retrieval_ms,
            generation_time_ms: 0,
        };

        if context.is_empty() {
            info!(question = %query.question, "no relevant material found");
            perf.total_ms = millis(started.elapsed());
            return Ok(no_material(query.question, meta, options.include_performance.then_some(perf)));
        }

        let t = Instant::now();
        let (raw, attempts) = self.generate(&query.question, &context).await?;
        let generation_time = t.elapsed();
        perf.generation_attempts = attempts;
        perf.generation_ms = millis(generation_time);
        perf.answer_undersized = raw.undersized;
        meta.generation_time_ms = perf.generation_ms;

        let (points, grounding) = ground_points(raw.points, &context);
        perf.citations = grounding;
        perf.total_ms = millis(started.elapsed());
        info!(
            kept = grounding.kept,
            dropped = grounding.dropped,
            uncited = grounding.uncited_points,
            total_ms = perf.total_ms,
            "answer ready"
        );

        Ok(DeepAnswerResponse {
            question: query.question,
            summary: raw.summary,
            terminology: raw.terminology,
            points,
            comparison: raw.comparison.filter(|c| !c.is_empty()),
            levels: raw.levels,
            follow_up_questions: raw.follow_up_questions,
            sources: source_refs(&context),
            meta,
            performance: options.include_performance.then_some(perf),
        })
    }

    /// Runs every retriever as its own task under the per-source timeout and
    /// waits for all of them. Dropping the returned future aborts the tasks.
    async fn retrieve_all(&self, query: &RetrievalQuery) -> Result<RetrievalRound, AnswerError> {
        let query = Arc::new(query.clone());
        let timeout = self.retrieval_timeout;
        let mut set = JoinSet::new();
        for (slot, retriever) in self.retrievers.iter().enumerate() {
            let retriever = Arc::clone(retriever);
            let query = Arc::clone(&query);
            set.spawn(async move {
                let t = Instant::now();
                let outcome = tokio::time::timeout(timeout, retriever.retrieve(&query)).await;
                (slot, outcome, t.elapsed())
            });
        }

        let n = self.retrievers.len();
        let mut lists: Vec<Vec<RetrievalHit>> = vec![Vec::new(); n];
        let mut reports: Vec<Option<SourceReport>> = vec![None; n];
        while let Some(joined) = set.join_next().await {
            let (slot, outcome, elapsed) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // a panicked task carries no slot; its report stays missing and is filled below
                    warn!(error = %e, "retrieval task aborted");
                    continue;
                }
            };
            let retriever = &self.retrievers[slot];
            let source = retriever.source();
            let (status, error, hits) = match outcome {
                Ok(Ok(hits)) => (SourceStatus::Ok, None, hits),
                Ok(Err(e)) => (SourceStatus::Failed, Some(e.to_string()), Vec::new()),
                Err(_) => (SourceStatus::TimedOut, Some(format!("timed out after {} ms", millis(timeout))), Vec::new()),
            };
            if let Some(reason) = &error {
                if retriever.failure_policy() == FailurePolicy::Fatal {
                    warn!(%source, %reason, "required retriever failed; aborting request");
                    return Err(AnswerError::Retrieval { retriever: source, reason: reason.clone() });
                }
                warn!(%source, %reason, "retriever failed; continuing without it");
            }
            debug!(%source, hits = hits.len(), elapsed_ms = millis(elapsed), "retriever finished");
            reports[slot] = Some(SourceReport { source, status, hits: hits.len(), elapsed_ms: millis(elapsed), error });
            lists[slot] = hits;
        }

        let mut filled = Vec::with_capacity(n);
        for (slot, report) in reports.into_iter().enumerate() {
            let retriever = &self.retrievers[slot];
            match report {
                Some(r) => filled.push(r),
                None => {
                    let source = retriever.source();
                    if retriever.failure_policy() == FailurePolicy::Fatal {
                        return Err(AnswerError::Retrieval { retriever: source, reason: "retrieval task aborted".into() });
                    }
                    filled.push(SourceReport {
                        source,
                        status: SourceStatus::Failed,
                        hits: 0,
                        elapsed_ms: 0,
                        error: Some("retrieval task aborted".into()),
                    });
                }
            }
        }
        Ok(RetrievalRound { lists, reports: filled })
    }

    /// Up to `max_attempts` calls with the same prompt while the reply is
    /// malformed. Transport errors are not retried.
    async fn generate(&self, question: &str, context: &AssembledContext) -> Result<(RawAnswer, u32), AnswerError> {
        let prompt = build_prompt(question, context);
        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            let payload =
                self.generator.complete(&prompt).await.map_err(|e| AnswerError::Generation(e.to_string()))?;
            match parse_answer(&payload) {
                Ok(raw) => return Ok((raw, attempt)),
                Err(e) => {
                    warn!(attempt, error = %e, "malformed answer from model");
                    last_error = e.to_string();
                }
            }
        }
        Err(AnswerError::Generation(format!(
            "malformed response after {} attempts: {last_error}",
            self.max_attempts
        )))
    }
}

fn count_passages(lists: &[Vec<RetrievalHit>]) -> usize {
    lists
        .iter()
        .flatten()
        .filter_map(|h| match h.key() {
            ItemKey::Passage(id) => Some(id),
            ItemKey::Term(_) => None,
        })
        .collect::<HashSet<_>>()
        .len()
}

fn source_refs(context: &AssembledContext) -> Vec<SourceRef> {
    context
        .passage_blocks()
        .filter_map(|b| match &b.origin {
            BlockOrigin::Passage { anchor, title, .. } => Some(SourceRef {
                text_id: anchor.text_id.clone(),
                title: title.clone(),
                juan: anchor.juan,
                methods: b.sources.iter().copied().collect(),
                similarity: b.similarity,
            }),
            BlockOrigin::Glossary { .. } => None,
        })
        .collect()
}

fn no_material(question: String, meta: AnswerMeta, performance: Option<PerformanceReport>) -> DeepAnswerResponse {
    DeepAnswerResponse {
        question,
        summary: NO_MATERIAL_SUMMARY.to_string(),
        terminology: Vec::new(),
        points: Vec::new(),
        comparison: None,
        levels: None,
        follow_up_questions: Vec::new(),
        sources: Vec::new(),
        meta,
        performance,
    }
}
