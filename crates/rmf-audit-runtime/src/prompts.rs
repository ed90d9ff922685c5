//! Prompts for model-assisted conformity judgments.
//!
//! The system prompt is identical for every call; only the user message
//! carries the category, baseline and submitted evidence.

use rmf_audit_core::Category;

use crate::providers::ChatMessage;

/// System prompt shared by every assisted evaluation.
pub const SYSTEM_PROMPT: &str = r#"
You are an AI RMF conformity reviewer.

You compare evidence an organisation submitted for one audit question
against the baseline evidence an auditor expects for that question.
You do not audit anything else. You do not invent requirements.

## Verdicts
- "full": the submission demonstrates everything the baseline asks for
- "partial": the submission demonstrates some of the baseline
- "no": the submission does not demonstrate the baseline, or is too vague to tell

## Citations
List in "cited_terms" the exact words or short phrases from the SUBMITTED
evidence that support your verdict. Copy them verbatim. Never cite words
that only appear in the baseline. A "full" or "partial" verdict needs at
least one citation; "no" may have none.

## Output Format
Reply with a single JSON object and nothing else:
{
  "verdict": "full" | "partial" | "no",
  "rationale": "one or two sentences naming what is present and what is missing",
  "cited_terms": ["phrase from the submission", "..."]
}
"#;

/// Build the message list for one judgment.
pub fn evaluation_messages(category: Category, baseline: &str, evidence: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT.trim()),
        ChatMessage::user(format!(
            "Category: {}\n{}\n\nBASELINE EVIDENCE:\n{}\n\nSUBMITTED EVIDENCE:\n{}",
            category.label(),
            category.description(),
            baseline.trim(),
            evidence.trim()
        )),
    ]
}
