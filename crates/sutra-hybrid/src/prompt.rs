use sutra_core::types::Prompt;

use crate::assemble::AssembledContext;

const SYSTEM: &str = "You are a careful scholar of the Buddhist canon. Answer only from the \
numbered source passages you are given. Every citation quote must be copied verbatim from a \
passage, and its textId and juan must be those printed in that passage's header. If the \
passages do not support a claim, leave it uncited rather than inventing a source. Reply with a \
single JSON object and nothing else.";

const SCHEMA: &str = r#"{
  "summary": "string, 2-4 sentences",
  "terminology": [{"term": "string", "definition": "string"}],
  "points": [
    {
      "title": "string",
      "explanation": "string",
      "citations": [{"quote": "verbatim text from one passage", "sutraTitle": "string", "juan": 1, "textId": "string"}]
    }
  ],
  "comparison": [{"aspect": "string", "detail": "string"}],
  "levels": {"literal": "string", "profound": "string", "practice": "string"},
  "followUpQuestions": ["string"]
}"#;

/// Renders the question and the assembled blocks into a chat prompt.
pub fn build_prompt(question: &str, context: &AssembledContext) -> Prompt {
    let mut user = format!("Question: {question}\n\n## Source passages\n\n{}", context.render_passages());
    let glossary = context.render_glossary();
    if !glossary.is_empty() {
        user.push_str("\n\n## Glossary\n\n");
        user.push_str(&glossary);
    }
    user.push_str("\n\n## Response format\n\nReturn JSON matching this shape. Give 2 to 5 points and 2 to 3 follow-up questions. `comparison` and `levels` are optional.\n\n");
    user.push_str(SCHEMA);
    Prompt { system: SYSTEM.to_string(), user }
}
