//! Helpers shared by the `sutra` binary: passage loading, tracing setup and
//! human-readable answer rendering.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use sutra_core::types::{Passage, PassageId, PassageKind};
use sutra_hybrid::DeepAnswerResponse;

/// One line of a passages file. Parsing of source documents happens upstream.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassageRecord {
    #[serde(alias = "text_id")]
    pub text_id: String,
    pub juan: u32,
    #[serde(alias = "chunk_index")]
    pub chunk_index: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "char_start")]
    pub char_start: u32,
    #[serde(default, alias = "char_end")]
    pub char_end: Option<u32>,
    pub content: String,
    #[serde(default)]
    pub kind: Option<String>,
}

impl From<PassageRecord> for Passage {
    fn from(r: PassageRecord) -> Self {
        let len = u32::try_from(r.content.chars().count()).unwrap_or(u32::MAX);
        Passage {
            id: PassageId::new(r.text_id, r.juan, r.chunk_index),
            title: r.title,
            char_start: r.char_start,
            char_end: r.char_end.unwrap_or(r.char_start.saturating_add(len)),
            content: r.content,
            kind: r.kind.as_deref().map(PassageKind::from_label),
            embedding: None,
        }
    }
}

/// Reads JSON-lines passages. Blank lines are skipped; a malformed line
/// aborts with its line number.
pub fn read_passages(path: &Path) -> anyhow::Result<Vec<Passage>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut passages = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PassageRecord =
            serde_json::from_str(&line).with_context(|| format!("{}:{}: invalid passage", path.display(), n + 1))?;
        if record.content.trim().is_empty() {
            continue;
        }
        passages.push(record.into());
    }
    Ok(passages)
}

/// `RUST_LOG` wins; otherwise `info` for our crates, `warn` elsewhere.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,sutra=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).try_init();
}

pub fn render_answer(answer: &DeepAnswerResponse) -> String {
    let mut out = String::new();
    out.push_str(&format!("Q: {}\n\n{}\n", answer.question, answer.summary));
    for note in &answer.terminology {
        out.push_str(&format!("  · {}: {}\n", note.term, note.definition));
    }
    for (i, point) in answer.points.iter().enumerate() {
        let flag = if point.uncited { " (uncited)" } else { "" };
        out.push_str(&format!("\n{}. {}{}\n   {}\n", i + 1, point.title, flag, point.explanation));
        for c in &point.citations {
            out.push_str(&format!("   「{}」 {} {} 卷{}\n", c.quote, c.sutra_title, c.text_id, c.juan));
        }
    }
    if let Some(levels) = &answer.levels {
        out.push_str(&format!("\nLiteral: {}\nProfound: {}\n", levels.literal, levels.profound));
        if let Some(practice) = &levels.practice {
            out.push_str(&format!("Practice: {practice}\n"));
        }
    }
    if !answer.follow_up_questions.is_empty() {
        out.push_str("\nFurther questions:\n");
        for q in &answer.follow_up_questions {
            out.push_str(&format!("  - {q}\n"));
        }
    }
    if !answer.sources.is_empty() {
        out.push_str("\nSources:\n");
        for s in &answer.sources {
            let methods: Vec<&str> = s.methods.iter().map(|m| m.as_str()).collect();
            out.push_str(&format!("  {} {} 卷{} [{}]\n", s.text_id, s.title, s.juan, methods.join(",")));
        }
    }
    out.push_str(&format!(
        "\n{} passages searched, retrieval {} ms, generation {} ms\n",
        answer.meta.total_passages_searched, answer.meta.retrieval_time_ms, answer.meta.generation_time_ms
    ));
    out
}
