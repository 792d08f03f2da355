//! Lesson chunking.
//!
//! # Semantic mode
//!
//! 1. Find semantic boundaries in the lesson: numbered activities,
//!    questions, exercises and worked examples at line start, numbered
//!    section headings, and fenced code blocks. Matches inside a code block
//!    are ignored.
//! 2. Cut the lesson at every boundary. The pieces cover the lesson with no
//!    gaps; a piece too small to stand alone is merged into the next one.
//! 3. A piece within the size limit becomes one complete chunk. A larger
//!    piece is split with the recursive splitter using twice the normal
//!    overlap. A code block is never split: when it alone exceeds the limit
//!    it is emitted whole and flagged oversized.
//!
//! # Basic mode
//!
//! The whole lesson goes through the recursive splitter with the configured
//! overlap.

use regex::Regex;
use tracing::warn;

use crate::config::ChunkerConfig;
use crate::error::{Error, Result};
use crate::models::{
    ChunkDraft, ChunkMetadata, LessonMetadata, LessonSpan, ResolvedMarker, SectionType,
};
use crate::splitter::RecursiveSplitter;
use crate::tokens::{measure, TokenCounter};

/// Pieces with fewer trimmed characters than this are merged forward.
const MIN_PIECE_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Piece {
    start: usize,
    end: usize,
    section_type: SectionType,
}

pub struct LessonChunker {
    config: ChunkerConfig,
    code_fence: Regex,
    boundaries: Vec<(SectionType, Regex)>,
}

fn compile(id: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::Pattern { id, source })
}

impl LessonChunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            code_fence: compile("code_fence", r"(?ms)^[ \t]*```.*?^[ \t]*```[^\n]*$")?,
            boundaries: vec![
                (
                    SectionType::Activity,
                    compile("activity", r"(?m)^[ \t]*(?:[-•*][ \t]*)?(?:HOẠT ĐỘNG|Hoạt động)[ \t]+\d+")?,
                ),
                (
                    SectionType::Question,
                    compile("question", r"(?m)^[ \t]*(?:[-•*][ \t]*)?(?:CÂU HỎI|Câu hỏi)[ \t]+\d+")?,
                ),
                (
                    SectionType::Exercise,
                    compile("exercise", r"(?m)^[ \t]*(?:[-•*][ \t]*)?(?:BÀI TẬP|Bài tập)[ \t]+\d+")?,
                ),
                (
                    SectionType::Example,
                    compile("example", r"(?m)^[ \t]*(?:[-•*][ \t]*)?(?:VÍ DỤ|Ví dụ)[ \t]+\d+")?,
                ),
                (
                    SectionType::SectionHeading,
                    compile("section_heading", r"(?m)^[ \t]*\d+\.[ \t]+\p{Lu}")?,
                ),
            ],
        })
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk one lesson. `sections` are the resolved section markers inside
    /// the lesson; they label each chunk with the heading it falls under.
    pub fn chunk(
        &self,
        span: &LessonSpan,
        lesson: &LessonMetadata,
        sections: &[ResolvedMarker],
    ) -> Vec<ChunkDraft> {
        if self.config.semantic {
            self.chunk_semantic(span, lesson, sections)
        } else {
            self.chunk_basic(span, lesson, sections)
        }
    }

    fn chunk_basic(
        &self,
        span: &LessonSpan,
        lesson: &LessonMetadata,
        sections: &[ResolvedMarker],
    ) -> Vec<ChunkDraft> {
        let splitter = RecursiveSplitter::new(
            self.config.chunk_size,
            self.config.chunk_overlap,
            self.config.unit,
        );
        let parts = splitter.split(&span.raw_text);
        let complete = parts.len() == 1;
        let ranges = locate(&span.raw_text, &parts);
        parts
            .into_iter()
            .zip(ranges)
            .map(|(content, (start, end))| {
                draft(
                    content,
                    ChunkMetadata {
                        lesson: lesson.clone(),
                        section_type: SectionType::General,
                        section: section_for(sections, span.start + start, span.start + end),
                        is_complete_section: complete,
                        ..ChunkMetadata::default()
                    },
                )
            })
            .collect()
    }

    fn chunk_semantic(
        &self,
        span: &LessonSpan,
        lesson: &LessonMetadata,
        sections: &[ResolvedMarker],
    ) -> Vec<ChunkDraft> {
        let text = span.raw_text.as_str();
        let mut drafts = Vec::new();

        for piece in self.pieces(text) {
            let content = text[piece.start..piece.end].trim();
            if content.is_empty() {
                continue;
            }
            let base = ChunkMetadata {
                lesson: lesson.clone(),
                section_type: piece.section_type,
                section: section_for(sections, span.start + piece.start, span.start + piece.end),
                ..ChunkMetadata::default()
            };

            let size = measure(content, self.config.unit);
            if size <= self.config.chunk_size {
                drafts.push(draft(
                    content.to_string(),
                    ChunkMetadata {
                        is_complete_section: true,
                        ..base
                    },
                ));
                continue;
            }

            if piece.section_type == SectionType::CodeBlock {
                warn!(
                    lesson = ?lesson.lesson_number,
                    size,
                    limit = self.config.chunk_size,
                    "code block exceeds chunk size, emitting it whole"
                );
                drafts.push(draft(
                    content.to_string(),
                    ChunkMetadata {
                        is_complete_section: true,
                        is_oversized: true,
                        ..base
                    },
                ));
                continue;
            }

            let splitter = RecursiveSplitter::new(
                self.config.chunk_size,
                self.config.section_overlap(),
                self.config.unit,
            );
            let parts = splitter.split(content);
            let total = parts.len();
            for (index, part) in parts.into_iter().enumerate() {
                drafts.push(draft(
                    part,
                    ChunkMetadata {
                        is_complete_section: false,
                        sub_section_index: Some(index),
                        total_sub_sections: Some(total),
                        ..base.clone()
                    },
                ));
            }
        }
        drafts
    }

    /// Cut `text` at its semantic boundaries. The pieces tile `text`.
    fn pieces(&self, text: &str) -> Vec<Piece> {
        let code_blocks: Vec<(usize, usize)> = self
            .code_fence
            .find_iter(text)
            .map(|m| (m.start(), m.end()))
            .collect();
        let in_code = |pos: usize| code_blocks.iter().any(|&(s, e)| s <= pos && pos < e);

        let mut cuts: Vec<(usize, SectionType)> = Vec::new();
        for &(start, end) in &code_blocks {
            cuts.push((start, SectionType::CodeBlock));
            if end < text.len() {
                cuts.push((end, SectionType::General));
            }
        }
        for (section_type, regex) in &self.boundaries {
            for m in regex.find_iter(text) {
                let pos = m.start() + (m.as_str().len() - m.as_str().trim_start().len());
                if !in_code(pos) {
                    cuts.push((pos, *section_type));
                }
            }
        }
        cuts.sort_by_key(|&(pos, _)| pos);
        cuts.dedup_by_key(|&mut (pos, _)| pos);

        let mut raw = Vec::with_capacity(cuts.len() + 1);
        let first = cuts.first().map_or(text.len(), |&(pos, _)| pos);
        if first > 0 {
            raw.push(Piece {
                start: 0,
                end: first,
                section_type: SectionType::General,
            });
        }
        for (i, &(pos, section_type)) in cuts.iter().enumerate() {
            let end = cuts.get(i + 1).map_or(text.len(), |&(next, _)| next);
            raw.push(Piece {
                start: pos,
                end,
                section_type,
            });
        }

        merge_small(text, raw)
    }
}

/// Fold pieces too small to stand alone into the following piece. Code
/// blocks are never folded, in either direction.
fn merge_small(text: &str, raw: Vec<Piece>) -> Vec<Piece> {
    let mut out: Vec<Piece> = Vec::with_capacity(raw.len());
    let mut carry: Option<usize> = None;
    let mut iter = raw.into_iter().peekable();
    while let Some(piece) = iter.next() {
        let start = carry.take().unwrap_or(piece.start);
        let small = text[start..piece.end].trim().chars().count() < MIN_PIECE_CHARS;
        let foldable = piece.section_type != SectionType::CodeBlock
            && iter
                .peek()
                .is_some_and(|next| next.section_type != SectionType::CodeBlock);
        if small && foldable {
            carry = Some(start);
            continue;
        }
        out.push(Piece { start, ..piece });
    }
    out
}

/// Title of the section covering `start..end`: the last marker at or before
/// `start`, else the first marker inside the range.
fn section_for(sections: &[ResolvedMarker], start: usize, end: usize) -> Option<String> {
    sections
        .iter()
        .take_while(|s| s.position <= start)
        .last()
        .or_else(|| sections.iter().find(|s| s.position > start && s.position < end))
        .map(|s| s.title.clone())
        .filter(|t| !t.is_empty())
}

/// Byte ranges of splitter output within `text`. Parts are trimmed
/// substrings whose starts strictly increase, overlap included.
fn locate(text: &str, parts: &[String]) -> Vec<(usize, usize)> {
    let mut cursor = 0;
    parts
        .iter()
        .map(|part| {
            let start = text
                .get(cursor..)
                .and_then(|rest| rest.find(part.as_str()))
                .map_or(cursor, |offset| cursor + offset);
            cursor = text[start..]
                .chars()
                .next()
                .map_or(text.len(), |c| start + c.len_utf8());
            (start, (start + part.len()).min(text.len()))
        })
        .collect()
}

fn draft(content: String, metadata: ChunkMetadata) -> ChunkDraft {
    ChunkDraft {
        token_count: TokenCounter::estimate(&content),
        char_count: content.chars().count(),
        content,
        metadata,
    }
}
