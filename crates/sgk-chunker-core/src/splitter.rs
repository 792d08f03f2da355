//! Size-bounded recursive splitter.
//!
//! Tries each separator in priority order (blank line, newline, sentence
//! ends, space, then single characters). Pieces that fit are merged greedily
//! up to the chunk size, keeping a tail of up to `chunk_overlap` from the
//! previous chunk; pieces that do not fit are split again with the next
//! separator. Separators stay attached to the start of the piece that
//! follows them.
//!
//! Every emitted chunk measures at most `chunk_size` in the configured unit.

use std::collections::VecDeque;

use crate::config::SizeUnit;
use crate::tokens::measure;

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    unit: SizeUnit,
}

impl RecursiveSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize, unit: SizeUnit) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            unit,
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn len(&self, text: &str) -> usize {
        measure(text, self.unit)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, rest) = pick_separator(text, separators);
        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if self.len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting));
                fitting.clear();
            }
            if rest.is_empty() {
                // A single character: cannot be split further.
                let piece = piece.trim();
                if !piece.is_empty() {
                    out.push(piece.to_string());
                }
            } else {
                out.extend(self.split_with(piece, rest));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting));
        }
        out
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = self.len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut docs, &window);
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        push_joined(&mut docs, &window);
        docs
    }
}

fn push_joined(docs: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

/// First separator present in `text`, and the separators after it.
fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split so each separator starts the following piece. Empty pieces are
/// dropped; an empty separator yields single characters.
fn split_keep_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut last = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > last {
            pieces.push(&text[last..idx]);
        }
        last = idx;
    }
    if last < text.len() {
        pieces.push(&text[last..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = RecursiveSplitter::new(100, 10, SizeUnit::Chars);
        assert_eq!(splitter.split("  Ngắn gọn.  "), vec!["Ngắn gọn.".to_string()]);
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        let splitter = RecursiveSplitter::new(100, 10, SizeUnit::Chars);
        assert!(splitter.split(" \n\n ").is_empty());
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let text = format!("{}\n\n{}", "a".repeat(30), "b".repeat(30));
        let splitter = RecursiveSplitter::new(40, 0, SizeUnit::Chars);
        let chunks = splitter.split(&text);
        assert_eq!(chunks, vec!["a".repeat(30), "b".repeat(30)]);
    }

    #[test]
    fn test_separator_kept_at_start() {
        assert_eq!(split_keep_separator("a. b. c", ". "), vec!["a", ". b", ". c"]);
        assert_eq!(split_keep_separator("xyz", ""), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_overlap_repeats_tail() {
        let text = "một hai ba bốn năm sáu bảy tám chín mười";
        let splitter = RecursiveSplitter::new(12, 6, SizeUnit::Chars);
        let chunks = splitter.split(text);
        assert!(chunks.len() > 2);
        // Consecutive chunks share at least one word.
        for pair in chunks.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last_word), "{pair:?}");
        }
    }

    #[test]
    fn test_hard_cut_without_separators() {
        let splitter = RecursiveSplitter::new(4, 0, SizeUnit::Chars);
        let chunks = splitter.split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    proptest! {
        #[test]
        fn prop_chunks_within_size(
            text in "[a-zà-ỹ .!?\n]{0,600}",
            size in 8usize..200,
            overlap_pct in 0usize..60,
            tokens in any::<bool>(),
        ) {
            let unit = if tokens { SizeUnit::Tokens } else { SizeUnit::Chars };
            let overlap = size * overlap_pct / 100;
            let splitter = RecursiveSplitter::new(size, overlap, unit);
            for chunk in splitter.split(&text) {
                prop_assert!(measure(&chunk, unit) <= size);
                prop_assert!(!chunk.trim().is_empty());
            }
        }
    }
}
