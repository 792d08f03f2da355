//! Chunk enrichment: neighbour previews, position, content tags, key terms
//! and density. Operates on the ordered chunks of one lesson.

use regex::Regex;

use crate::config::EnricherConfig;
use crate::error::{Error, Result};
use crate::metadata::has_code;
use crate::models::{ChunkDraft, ContentDensity, ContentType};

pub struct ContextEnricher {
    config: EnricherConfig,
    tags: Vec<(ContentType, Regex)>,
    acronym: Regex,
    capitalized: Regex,
    formula: Regex,
    list_item: Regex,
}

fn compile(id: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::Pattern { id, source })
}

impl ContextEnricher {
    pub fn new(config: EnricherConfig) -> Result<Self> {
        Ok(Self {
            config,
            tags: vec![
                (ContentType::Activity, compile("tag_activity", r"(?i)hoạt động")?),
                (ContentType::Question, compile("tag_question", r"(?i)câu hỏi")?),
                (ContentType::Example, compile("tag_example", r"(?i)ví dụ")?),
                (ContentType::Exercise, compile("tag_exercise", r"(?i)bài tập|thực hành|luyện tập")?),
            ],
            acronym: compile("acronym", r"\b[A-Z]{2,}\b")?,
            capitalized: compile("capitalized", r"\b\p{Lu}\p{Ll}+\b")?,
            formula: compile("density_formula", r"=|×|÷|√|\d\s*[+\-*/^]\s*\d")?,
            list_item: compile("list_item", r"(?m)^[ \t]*(?:[-•*]|\d+[.)])[ \t]")?,
        })
    }

    pub fn enrich(&self, chunks: Vec<ChunkDraft>) -> Vec<ChunkDraft> {
        let total = chunks.len();
        let previews: Vec<(String, String)> = chunks
            .iter()
            .map(|c| {
                (
                    tail_chars(&c.content, self.config.preview_chars),
                    head_chars(&c.content, self.config.preview_chars),
                )
            })
            .collect();

        chunks
            .into_iter()
            .enumerate()
            .map(|(i, mut chunk)| {
                let meta = &mut chunk.metadata;
                meta.chunk_position_index = i;
                meta.total_chunks = total;
                meta.relative_position = relative_position(i, total);
                if self.config.context_windows {
                    meta.prev_preview = i.checked_sub(1).map(|p| previews[p].0.clone());
                    meta.next_preview = previews.get(i + 1).map(|n| n.1.clone());
                }
                meta.content_types = self.content_types(&chunk.content);
                meta.key_terms = self.key_terms(&chunk.content);
                meta.content_density = ContentDensity {
                    char_per_token: round2(chunk.char_count as f64 / chunk.token_count.max(1) as f64),
                    has_formulas: self.formula.is_match(&chunk.content),
                    has_lists: self.list_item.is_match(&chunk.content),
                    has_code: meta.content_types.contains(&ContentType::Code),
                };
                chunk
            })
            .collect()
    }

    pub fn content_types(&self, content: &str) -> Vec<ContentType> {
        let mut types: Vec<ContentType> = self
            .tags
            .iter()
            .filter(|(_, re)| re.is_match(content))
            .map(|(t, _)| *t)
            .collect();
        if has_code(content) {
            types.push(ContentType::Code);
        }
        types
    }

    /// Acronyms first, then capitalized words, in order of first occurrence.
    pub fn key_terms(&self, content: &str) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        let found = self
            .acronym
            .find_iter(content)
            .chain(self.capitalized.find_iter(content));
        for m in found {
            if terms.len() == self.config.max_key_terms {
                break;
            }
            if !terms.iter().any(|t| t == m.as_str()) {
                terms.push(m.as_str().to_string());
            }
        }
        terms
    }
}

/// `index / (total - 1)` rounded to two decimals; 0 for a single chunk.
pub fn relative_position(index: usize, total: usize) -> f64 {
    if total <= 1 {
        return 0.0;
    }
    round2(index as f64 / (total - 1) as f64)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn head_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

fn tail_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}
