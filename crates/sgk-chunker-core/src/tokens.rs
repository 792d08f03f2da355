//! Token estimation and size measurement.

use crate::config::SizeUnit;

/// Heuristic token counter for Vietnamese text.
///
/// Vietnamese syllables carry diacritics that BPE vocabularies split more
/// finely than plain ASCII, so every non-ASCII character weighs two units
/// and an ASCII character one; four units make a token.
///
/// This is an approximation: a 512-token target counted here will not match
/// a BPE tokenizer such as `cl100k_base` exactly, and may land somewhat above
/// or below it.
///
/// The weight is additive over concatenation and the final ceiling is
/// subadditive, so the estimate of a joined string never exceeds the sum of
/// the estimates of its parts. It also never exceeds the character count.
pub struct TokenCounter;

impl TokenCounter {
    pub fn estimate(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        if text.is_ascii() {
            return text.len().div_ceil(4);
        }
        let weight: usize = text.chars().map(|c| if c.is_ascii() { 1 } else { 2 }).sum();
        weight.div_ceil(4)
    }
}

/// Length of `text` in `unit`.
pub fn measure(text: &str, unit: SizeUnit) -> usize {
    match unit {
        SizeUnit::Chars => text.chars().count(),
        SizeUnit::Tokens => TokenCounter::estimate(text),
    }
}
