//! Prompt Composer - Builds the final model prompt
//!
//! The prompt source is decided once, by priority:
//! 1. an excerpt from the caller's uploaded document
//! 2. an excerpt from the predefined knowledge file
//! 3. recent conversation history alone
//! 4. the raw question
//!
//! Every templated prompt renders context, then history, then the current
//! question, then an `Answer:` cue.

use serde::Serialize;

/// Where the prompt's grounding comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    /// Excerpt of a session-bound uploaded document
    Document(String),
    /// Excerpt of the predefined knowledge file
    Predefined(String),
    /// No context, but prior turns exist
    HistoryOnly,
    /// Nothing to add; the question is the prompt
    RawQuestion,
}

/// Short label for a prompt source, used in logs and responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptKind {
    Document,
    Predefined,
    History,
    Raw,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Document => "document",
            PromptKind::Predefined => "predefined",
            PromptKind::History => "history",
            PromptKind::Raw => "raw",
        }
    }
}

impl PromptSource {
    /// Pick the first applicable source
    ///
    /// `predefined_excerpt` should only be `Some` when the caller asked for
    /// predefined context and the file is loaded.
    pub fn choose(
        document_excerpt: Option<String>,
        predefined_excerpt: Option<String>,
        history_summary: &str,
    ) -> Self {
        match (document_excerpt, predefined_excerpt) {
            (Some(excerpt), _) => PromptSource::Document(excerpt),
            (None, Some(excerpt)) => PromptSource::Predefined(excerpt),
            (None, None) if !history_summary.is_empty() => PromptSource::HistoryOnly,
            (None, None) => PromptSource::RawQuestion,
        }
    }

    pub fn kind(&self) -> PromptKind {
        match self {
            PromptSource::Document(_) => PromptKind::Document,
            PromptSource::Predefined(_) => PromptKind::Predefined,
            PromptSource::HistoryOnly => PromptKind::History,
            PromptSource::RawQuestion => PromptKind::Raw,
        }
    }

    /// Render the prompt for `question`
    pub fn render(&self, question: &str, history_summary: &str) -> String {
        match self {
            PromptSource::Document(excerpt) => grounded_prompt(
                "Based on this document content, answer the question:",
                "Document:",
                excerpt,
                history_summary,
                question,
            ),
            PromptSource::Predefined(excerpt) => grounded_prompt(
                "Based on this context, answer the question:",
                "Context:",
                excerpt,
                history_summary,
                question,
            ),
            PromptSource::HistoryOnly => {
                format!("{history_summary}\n\nCurrent question: {question}\n\nAnswer:")
            }
            PromptSource::RawQuestion => question.to_string(),
        }
    }
}

fn grounded_prompt(
    instruction: &str,
    label: &str,
    excerpt: &str,
    history_summary: &str,
    question: &str,
) -> String {
    let mut prompt = format!("{instruction}\n\n{label}\n{excerpt}\n\n");
    if !history_summary.is_empty() {
        prompt.push_str(history_summary);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("Current question: {question}\n\nAnswer:"));
    prompt
}

/// Compose the final prompt in one call
pub fn compose(
    question: &str,
    document_excerpt: Option<String>,
    predefined_excerpt: Option<String>,
    history_summary: &str,
) -> String {
    PromptSource::choose(document_excerpt, predefined_excerpt, history_summary)
        .render(question, history_summary)
}
