//! Relevance Scorer - Picks the paragraphs of a document worth sending
//!
//! Provides:
//! - Paragraph splitting on blank lines
//! - Keyword occurrence scoring
//! - Stable ranking (ties keep document order)
//! - Greedy packing into a character budget
//! - Prefix truncation when nothing matches
//!
//! All lengths are measured in characters, not bytes.

use super::keywords::{extract_keywords, MIN_KEYWORD_CHARS};
use serde::Serialize;

/// Default character budget for an excerpt
pub const DEFAULT_MAX_LENGTH: usize = 3000;

/// Separator between paragraphs, both in the source and in the excerpt
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Excerpt selection options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcerptOptions {
    /// Character budget
    pub max_length: usize,

    /// Ranked paragraphs considered for packing
    pub max_paragraphs: usize,

    /// Paragraphs with fewer trimmed characters are skipped
    pub min_paragraph_chars: usize,

    /// Minimum keyword length
    pub min_keyword_chars: usize,
}

impl Default for ExcerptOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            max_paragraphs: 10,
            min_paragraph_chars: 20,
            min_keyword_chars: MIN_KEYWORD_CHARS,
        }
    }
}

impl ExcerptOptions {
    /// Same options with a different budget
    pub fn with_max_length(self, max_length: usize) -> Self {
        Self { max_length, ..self }
    }
}

/// A paragraph that matched at least one keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredParagraph<'a> {
    /// Total keyword occurrences
    pub score: usize,

    /// Position among the blank-line separated paragraphs
    pub index: usize,

    /// Paragraph text, untrimmed
    pub text: &'a str,
}

/// Selected excerpt plus how it was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Excerpt {
    /// Text to inject into the prompt
    pub text: String,

    /// Number of whole paragraphs packed (0 on fallback)
    pub paragraphs: usize,

    /// True when no paragraph scored and the content prefix was used
    pub fallback: bool,
}

/// Count non-overlapping occurrences of every keyword in `paragraph_lower`
fn score(paragraph_lower: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .map(|keyword| paragraph_lower.matches(keyword.as_str()).count())
        .sum()
}

/// Score and rank the paragraphs of `content` against `keywords`
///
/// Paragraphs below `min_paragraph_chars` (after trimming) or with a zero
/// score are dropped. The result is sorted by score descending; the sort is
/// stable so equal scores stay in document order.
pub fn score_paragraphs<'a>(
    content: &'a str,
    keywords: &[String],
    min_paragraph_chars: usize,
) -> Vec<ScoredParagraph<'a>> {
    let mut scored: Vec<ScoredParagraph<'a>> = content
        .split(PARAGRAPH_SEPARATOR)
        .enumerate()
        .filter(|(_, text)| text.trim().chars().count() >= min_paragraph_chars)
        .filter_map(|(index, text)| {
            let score = score(&text.to_lowercase(), keywords);
            (score > 0).then_some(ScoredParagraph { score, index, text })
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
}

/// First `max_length` characters of `content`
fn truncate_chars(content: &str, max_length: usize) -> &str {
    match content.char_indices().nth(max_length) {
        Some((byte_idx, _)) => &content[..byte_idx],
        None => content,
    }
}

/// Select an excerpt of `content` relevant to `question`
pub fn select_excerpt_with(content: &str, question: &str, options: &ExcerptOptions) -> Excerpt {
    let keywords = extract_keywords(question, options.min_keyword_chars);
    let ranked = score_paragraphs(content, &keywords, options.min_paragraph_chars);

    let mut text = String::new();
    let mut length = 0usize;
    let mut paragraphs = 0usize;

    for paragraph in ranked.iter().take(options.max_paragraphs) {
        let paragraph_len = paragraph.text.chars().count();
        if length + paragraph_len >= options.max_length {
            break;
        }
        text.push_str(paragraph.text);
        text.push_str(PARAGRAPH_SEPARATOR);
        length += paragraph_len + PARAGRAPH_SEPARATOR.len();
        paragraphs += 1;
    }

    let excerpt = if text.is_empty() {
        Excerpt {
            text: truncate_chars(content, options.max_length).to_string(),
            paragraphs: 0,
            fallback: true,
        }
    } else {
        Excerpt {
            text,
            paragraphs,
            fallback: false,
        }
    };

    tracing::debug!(
        keywords = keywords.len(),
        matched = ranked.len(),
        packed = excerpt.paragraphs,
        chars = excerpt.text.chars().count(),
        fallback = excerpt.fallback,
        "Excerpt selected"
    );

    excerpt
}

/// Select an excerpt of at most roughly `max_length` characters
pub fn select_excerpt(content: &str, question: &str, max_length: usize) -> String {
    select_excerpt_with(
        content,
        question,
        &ExcerptOptions::default().with_max_length(max_length),
    )
    .text
}
