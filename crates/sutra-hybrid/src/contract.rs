//! Response schema and citation grounding.
//!
//! Model output is untrusted. It is parsed leniently into [`RawAnswer`],
//! shape-checked, and every citation is verified against the context blocks
//! the model was actually given before anything reaches the caller.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

use sutra_core::types::SourceTag;

use crate::assemble::AssembledContext;
use crate::engine::PerformanceReport;

pub const MIN_POINTS: usize = 2;
pub const MAX_POINTS: usize = 5;
pub const MIN_FOLLOW_UPS: usize = 2;
pub const MAX_FOLLOW_UPS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepAnswerResponse {
    pub question: String,
    pub summary: String,
    pub terminology: Vec<TermNote>,
    pub points: Vec<AnswerPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Vec<ComparisonItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<Levels>,
    pub follow_up_questions: Vec<String>,
    pub sources: Vec<SourceRef>,
    pub meta: AnswerMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermNote {
    #[serde(default)]
    pub term: String,
    #[serde(default, alias = "explanation")]
    pub definition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPoint {
    pub title: String,
    pub explanation: String,
    pub citations: Vec<Citation>,
    /// Set when no citation survived grounding.
    pub uncited: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub quote: String,
    pub sutra_title: String,
    pub juan: u32,
    pub text_id: String,
    pub match_type: Vec<SourceTag>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonItem {
    #[serde(default, alias = "tradition", alias = "school")]
    pub aspect: String,
    #[serde(default, alias = "view", alias = "description")]
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Levels {
    #[serde(default)]
    pub literal: String,
    #[serde(default)]
    pub profound: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub text_id: String,
    pub title: String,
    pub juan: u32,
    pub methods: Vec<SourceTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerMeta {
    pub total_passages_searched: usize,
    pub retrieval_time_ms: u64,
    pub generation_time_ms: u64,
}

/// Model output that does not satisfy the response shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("payload is not a JSON object: {0}")]
    NotJson(String),
    #[error("summary is empty")]
    EmptySummary,
    #[error("no points in answer")]
    NoPoints,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnswer {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub terminology: Vec<TermNote>,
    #[serde(default)]
    pub points: Vec<RawPoint>,
    #[serde(default)]
    pub comparison: Option<Vec<ComparisonItem>>,
    #[serde(default)]
    pub levels: Option<Levels>,
    #[serde(default, alias = "follow_up_questions", alias = "followUps")]
    pub follow_up_questions: Vec<String>,
    /// Fewer points or follow-ups than the prompt asked for. Accepted, not retried.
    #[serde(skip)]
    pub undersized: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPoint {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub citations: Vec<RawCitation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCitation {
    #[serde(default)]
    pub quote: String,
    #[serde(default, alias = "sutra_title", alias = "title")]
    pub sutra_title: String,
    #[serde(default, deserialize_with = "lenient_juan")]
    pub juan: Option<u32>,
    #[serde(default, alias = "text_id")]
    pub text_id: String,
}

/// Accepts `3`, `"3"` and `"卷3"`-style values; anything else is `None`.
fn lenient_juan<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Juan {
        Num(u64),
        Text(String),
        Other(serde_json::Value),
    }
    Ok(match Juan::deserialize(deserializer)? {
        Juan::Num(n) => u32::try_from(n).ok(),
        Juan::Text(s) => {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        Juan::Other(_) => None,
    })
}

/// Strips Markdown fences and surrounding prose down to the outermost object.
fn json_body(payload: &str) -> &str {
    let trimmed = payload.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parses and shape-checks a model payload.
pub fn parse_answer(payload: &str) -> Result<RawAnswer, SchemaError> {
    let mut raw: RawAnswer =
        serde_json::from_str(json_body(payload)).map_err(|e| SchemaError::NotJson(e.to_string()))?;
    raw.summary = raw.summary.trim().to_string();
    if raw.summary.is_empty() {
        return Err(SchemaError::EmptySummary);
    }
    if raw.points.is_empty() {
        return Err(SchemaError::NoPoints);
    }
    raw.points.truncate(MAX_POINTS);
    raw.follow_up_questions.retain(|q| !q.trim().is_empty());
    raw.follow_up_questions.truncate(MAX_FOLLOW_UPS);
    raw.undersized = raw.points.len() < MIN_POINTS || raw.follow_up_questions.len() < MIN_FOLLOW_UPS;
    if raw.undersized {
        warn!(
            points = raw.points.len(),
            follow_ups = raw.follow_up_questions.len(),
            "answer is shorter than requested"
        );
    }
    Ok(raw)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingStats {
    pub kept: usize,
    pub dropped: usize,
    pub uncited_points: usize,
}

/// Keeps only citations whose quote occurs verbatim in a passage block of the
/// same text and juan, inside one run of consecutive chunks. Title and match
/// types are taken from that block.
pub fn ground_points(points: Vec<RawPoint>, context: &AssembledContext) -> (Vec<AnswerPoint>, GroundingStats) {
    let mut stats = GroundingStats::default();
    let mut out = Vec::with_capacity(points.len());
    for point in points {
        let mut citations: Vec<Citation> = Vec::new();
        let mut seen = HashSet::new();
        for raw in point.citations {
            match ground_citation(&raw, context) {
                Some(citation) => {
                    if seen.insert((citation.quote.clone(), citation.text_id.clone(), citation.juan)) {
                        citations.push(citation);
                        stats.kept += 1;
                    }
                }
                None => {
                    warn!(text_id = %raw.text_id, juan = ?raw.juan, quote = %raw.quote, "dropping ungrounded citation");
                    stats.dropped += 1;
                }
            }
        }
        let uncited = citations.is_empty();
        if uncited {
            stats.uncited_points += 1;
        }
        out.push(AnswerPoint { title: point.title, explanation: point.explanation, citations, uncited });
    }
    (out, stats)
}

fn ground_citation(raw: &RawCitation, context: &AssembledContext) -> Option<Citation> {
    let quote = raw.quote.trim();
    let juan = raw.juan?;
    let text_id = raw.text_id.trim();
    if quote.is_empty() || text_id.is_empty() {
        return None;
    }
    let block = context
        .passage_blocks()
        .find(|b| b.section() == Some((text_id, juan)) && b.runs().iter().any(|run| run.contains(quote)))?;
    Some(Citation {
        quote: quote.to_string(),
        sutra_title: block.title().to_string(),
        juan,
        text_id: text_id.to_string(),
        match_type: block.sources.iter().copied().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{BlockOrigin, ContextBlock, GAP_MARKER};
    use sutra_core::types::PassageId;

    fn block_with_runs(runs: &[&str]) -> AssembledContext {
        let runs: Vec<String> = runs.iter().map(|r| r.to_string()).collect();
        let block = ContextBlock {
            label: 1,
            origin: BlockOrigin::Passage {
                anchor: PassageId::new("T0251", 1, 3),
                title: "心經".into(),
                kind: None,
                covered: vec![PassageId::new("T0251", 1, 3), PassageId::new("T0251", 1, 5)],
                runs: runs.clone(),
            },
            sources: [SourceTag::Semantic].into_iter().collect(),
            content: runs.join(GAP_MARKER),
            truncated: false,
            score: 0.01,
            similarity: None,
        };
        AssembledContext { blocks: vec![block], ..Default::default() }
    }

    fn point_quoting(quote: &str) -> RawPoint {
        RawPoint {
            title: "t".into(),
            explanation: "e".into(),
            citations: vec![RawCitation {
                quote: quote.into(),
                sutra_title: String::new(),
                juan: Some(1),
                text_id: "T0251".into(),
            }],
        }
    }

    #[test]
    fn quote_across_a_gap_is_dropped() {
        let context = block_with_runs(&["色不異空", "空即是色"]);
        let spanning = format!("不異空{GAP_MARKER}空即");
        assert!(context.blocks[0].content.contains(&spanning));

        let (points, stats) = ground_points(vec![point_quoting(&spanning)], &context);
        assert!(points[0].citations.is_empty());
        assert!(points[0].uncited);
        assert_eq!(stats.dropped, 1);

        let (points, stats) = ground_points(vec![point_quoting("空即是色")], &context);
        assert_eq!(points[0].citations.len(), 1);
        assert_eq!(stats.kept, 1);
    }

    #[test]
    fn short_answers_are_flagged_not_rejected() {
        let raw = parse_answer(r#"{"summary":"s","points":[{"title":"t"}],"followUpQuestions":["a"]}"#).expect("parse");
        assert!(raw.undersized);
        let raw = parse_answer(r#"{"summary":"s","points":[{"title":"a"},{"title":"b"}],"followUpQuestions":["x","y"]}"#)
            .expect("parse");
        assert!(!raw.undersized);
    }

    #[test]
    fn fenced_payload_parses() {
        let payload = "```json\n{\"summary\":\"s\",\"points\":[{\"title\":\"t\",\"explanation\":\"e\"}]}\n```";
        let raw = parse_answer(payload).expect("parse");
        assert_eq!(raw.summary, "s");
        assert_eq!(raw.points.len(), 1);
    }

    #[test]
    fn juan_accepts_numbers_and_strings() {
        let raw: RawCitation = serde_json::from_str(r#"{"quote":"q","textId":"T1","juan":"卷3"}"#).expect("parse");
        assert_eq!(raw.juan, Some(3));
        let raw: RawCitation = serde_json::from_str(r#"{"quote":"q","textId":"T1","juan":7}"#).expect("parse");
        assert_eq!(raw.juan, Some(7));
        let raw: RawCitation = serde_json::from_str(r#"{"quote":"q","textId":"T1","juan":null}"#).expect("parse");
        assert_eq!(raw.juan, None);
    }

    #[test]
    fn shape_errors() {
        assert!(matches!(parse_answer("not json"), Err(SchemaError::NotJson(_))));
        assert_eq!(parse_answer(r#"{"summary":"  ","points":[{}]}"#).err(), Some(SchemaError::EmptySummary));
        assert_eq!(parse_answer(r#"{"summary":"s","points":[]}"#).err(), Some(SchemaError::NoPoints));
    }

    #[test]
    fn lists_are_capped() {
        let points: Vec<String> = (0..8).map(|i| format!(r#"{{"title":"p{i}"}}"#)).collect();
        let payload = format!(
            r#"{{"summary":"s","points":[{}],"followUpQuestions":["a","b","","c","d"]}}"#,
            points.join(",")
        );
        let raw = parse_answer(&payload).expect("parse");
        assert_eq!(raw.points.len(), MAX_POINTS);
        assert_eq!(raw.follow_up_questions, vec!["a", "b", "c"]);
    }
}
