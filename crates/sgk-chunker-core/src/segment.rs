//! Lesson segmentation.
//!
//! Slices the document between consecutive lesson markers.
//!
//! ```text
//! markers ──► strict pass ──► spans found ─────────────► Strict
//!                  │
//!                  └─ empty ─► fallback pass ─► spans ──► Fallback
//!                                   │
//!                                   └─ no markers ─────► WholeDocument
//! ```
//!
//! The strict pass rejects noise spans (too short, exercise-only, embedded
//! table of contents) and cuts leading table-of-contents remnants. The
//! fallback pass applies no filters and tiles the whole text, so non-empty
//! input always yields at least one span.

use regex::Regex;
use tracing::{debug, warn};

use crate::config::SegmenterConfig;
use crate::error::{Error, Result};
use crate::models::{LessonSpan, MarkerKind, ResolvedMarker, SegmentationMode};
use crate::patterns::TOC_ENTRY_SUFFIX;

/// Output of [`LessonSegmenter::segment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub spans: Vec<LessonSpan>,
    pub mode: SegmentationMode,
}

pub struct LessonSegmenter {
    config: SegmenterConfig,
    exercise_heading: Regex,
    lesson_ref: Regex,
    toc_line: Regex,
    structural_line: Regex,
}

fn compile(id: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::Pattern { id, source })
}

impl LessonSegmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self> {
        Ok(Self {
            config,
            exercise_heading: compile("exercise_heading", r"(?mi)^[ \t]*(?:BÀI TẬP|BÀI NGHỈ)[ \t]*$")?,
            lesson_ref: compile("lesson_ref", r"(?i)bài\s+\d+")?,
            toc_line: compile("toc_line", TOC_ENTRY_SUFFIX)?,
            structural_line: compile(
                "structural_line",
                r"^[ \t]*(?:CHỦ ĐỀ|Chủ đề|CHƯƠNG|Chương|BÀI|Bài)[ \t]+\S",
            )?,
        })
    }

    /// Split `text` using the lesson markers among `markers`.
    pub fn segment(&self, text: &str, markers: &[ResolvedMarker]) -> Segmentation {
        if text.trim().is_empty() {
            return Segmentation {
                spans: Vec::new(),
                mode: SegmentationMode::WholeDocument,
            };
        }

        let mut lessons: Vec<&ResolvedMarker> = markers
            .iter()
            .filter(|m| m.kind == MarkerKind::Lesson)
            .collect();
        lessons.sort_by_key(|m| m.position);
        lessons.dedup_by_key(|m| m.position);

        if lessons.is_empty() {
            warn!("no lesson markers, using the whole document as one lesson");
            return whole_document(text);
        }

        let strict = self.strict(text, &lessons);
        if !strict.is_empty() {
            return Segmentation {
                spans: strict,
                mode: SegmentationMode::Strict,
            };
        }

        warn!(markers = lessons.len(), "strict segmentation empty, entering fallback mode");
        let fallback = fallback(text, &lessons);
        if fallback.is_empty() {
            return whole_document(text);
        }
        Segmentation {
            spans: fallback,
            mode: SegmentationMode::Fallback,
        }
    }

    fn strict(&self, text: &str, lessons: &[&ResolvedMarker]) -> Vec<LessonSpan> {
        let mut spans = Vec::new();
        for (i, marker) in lessons.iter().enumerate() {
            let mut start = marker.position;
            let end = lessons.get(i + 1).map_or(text.len(), |next| next.position);
            let body = &text[start..end];

            let length = body.trim().chars().count();
            if length < self.config.min_lesson_chars {
                debug!(lesson = marker.number, chars = length, "skipping short span");
                continue;
            }
            if self.is_exercise_only(body) {
                debug!(lesson = marker.number, "skipping exercise-only span");
                continue;
            }
            let refs = self.lesson_ref.find_iter(body).count();
            if refs > self.config.max_lesson_refs {
                debug!(lesson = marker.number, refs, "skipping table-of-contents span");
                continue;
            }

            if let Some(cut) = self.toc_remnant_end(body) {
                start += cut;
                let cleaned = text[start..end].trim().chars().count();
                if cleaned < self.config.min_cleaned_chars {
                    debug!(lesson = marker.number, chars = cleaned, "skipping span after toc cleanup");
                    continue;
                }
            }

            spans.push(LessonSpan {
                number: Some(marker.number),
                variant: marker.variant,
                title: marker.title.clone(),
                start,
                end,
                raw_text: text[start..end].to_string(),
                mode: SegmentationMode::Strict,
            });
        }
        spans
    }

    /// An exercise heading with no real body besides its own lesson line.
    fn is_exercise_only(&self, body: &str) -> bool {
        if !self.exercise_heading.is_match(body) {
            return false;
        }
        let rest: usize = body
            .lines()
            .skip(1)
            .filter(|line| !self.exercise_heading.is_match(line))
            .map(|line| line.trim().chars().count())
            .sum();
        rest < self.config.min_lesson_chars
    }

    /// When the span opens with table-of-contents lines, the byte offset of
    /// the first real structural heading after them.
    fn toc_remnant_end(&self, body: &str) -> Option<usize> {
        let first = body.lines().next()?;
        if !self.toc_line.is_match(first) {
            return None;
        }
        let mut offset = 0;
        for line in body.split_inclusive('\n') {
            if offset > 0
                && self.structural_line.is_match(line)
                && !self.toc_line.is_match(line.trim_end())
            {
                return Some(offset);
            }
            offset += line.len();
        }
        None
    }
}

/// No filters; spans tile the text from offset 0 to the end.
fn fallback(text: &str, lessons: &[&ResolvedMarker]) -> Vec<LessonSpan> {
    lessons
        .iter()
        .enumerate()
        .map(|(i, marker)| {
            let start = if i == 0 { 0 } else { marker.position };
            let end = lessons.get(i + 1).map_or(text.len(), |next| next.position);
            LessonSpan {
                number: Some(marker.number),
                variant: marker.variant,
                title: marker.title.clone(),
                start,
                end,
                raw_text: text[start..end].to_string(),
                mode: SegmentationMode::Fallback,
            }
        })
        .collect()
}

fn whole_document(text: &str) -> Segmentation {
    Segmentation {
        spans: vec![LessonSpan {
            number: None,
            variant: None,
            title: String::new(),
            start: 0,
            end: text.len(),
            raw_text: text.to_string(),
            mode: SegmentationMode::WholeDocument,
        }],
        mode: SegmentationMode::WholeDocument,
    }
}
