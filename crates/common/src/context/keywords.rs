//! Keyword Extractor - Turns a question into match terms
//!
//! Keywords are the maximal word-character runs of the lower-cased
//! question that meet a minimum length. Word characters are Unicode
//! letters, digits and underscore, so accented and non-Latin words stay whole. Order of appearance is kept and
//! duplicates are not collapsed: a word asked twice weighs twice.

use regex::Regex;
use std::sync::OnceLock;

/// Default minimum keyword length in characters
pub const MIN_KEYWORD_CHARS: usize = 4;

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\w+").expect("static word pattern compiles"))
}

/// Extract keywords of at least `min_chars` characters from `question`
pub fn extract_keywords(question: &str, min_chars: usize) -> Vec<String> {
    let lowered = question.to_lowercase();

    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| word.chars().count() >= min_chars)
        .map(str::to_string)
        .collect()
}
