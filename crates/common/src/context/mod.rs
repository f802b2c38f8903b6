//! Context Selection Components
//!
//! Turns a question plus available material into a prompt:
//! - Keyword extraction
//! - Paragraph relevance scoring and excerpt packing
//! - Prompt composition by priority

mod keywords;
mod prompt;
mod relevance;

pub use keywords::{extract_keywords, MIN_KEYWORD_CHARS};
pub use prompt::{compose, PromptKind, PromptSource};
pub use relevance::{
    score_paragraphs, select_excerpt, select_excerpt_with, Excerpt, ExcerptOptions,
    ScoredParagraph, DEFAULT_MAX_LENGTH, PARAGRAPH_SEPARATOR,
};
