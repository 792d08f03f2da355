//! Core data models that flow through the segmentation and chunking pipeline.
//!
//! Markers are ephemeral (detector → resolver → mapper/segmenter). Lesson
//! spans live only for the duration of one document's processing call.
//! [`Chunk`] is the terminal artifact written to disk and handed to the
//! downstream index.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The structural level a heading marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Chapter,
    Lesson,
    Section,
}

/// The heading dialect a template recognizes.
///
/// Each variant corresponds to one row of the pattern table in
/// [`crate::patterns`]; the resolver uses the dialect to break ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    UppercaseDot,
    UppercaseColon,
    MixedCaseDot,
    BulletPoint,
    StandaloneUppercase,
    PlainTextDot,
    TableOfContents,
    NoPunctuation,
    Mojibake,
    ChapterUppercase,
    ChapterMixedCase,
    ChapterMojibake,
    ChapterRoman,
    NumberedSection,
    LetteredSubsection,
    ActivityMarker,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::UppercaseDot => "uppercase_dot",
            Dialect::UppercaseColon => "uppercase_colon",
            Dialect::MixedCaseDot => "mixed_case_dot",
            Dialect::BulletPoint => "bullet_point",
            Dialect::StandaloneUppercase => "standalone_uppercase",
            Dialect::PlainTextDot => "plain_text_dot",
            Dialect::TableOfContents => "table_of_contents",
            Dialect::NoPunctuation => "no_punctuation",
            Dialect::Mojibake => "mojibake",
            Dialect::ChapterUppercase => "chapter_uppercase",
            Dialect::ChapterMixedCase => "chapter_mixed_case",
            Dialect::ChapterMojibake => "chapter_mojibake",
            Dialect::ChapterRoman => "chapter_roman",
            Dialect::NumberedSection => "numbered_section",
            Dialect::LetteredSubsection => "lettered_subsection",
            Dialect::ActivityMarker => "activity_marker",
        }
    }

    /// Table-of-contents entries lose to every other dialect.
    pub fn is_table_of_contents(&self) -> bool {
        matches!(self, Dialect::TableOfContents)
    }

    /// Tie-break rank among non-TOC candidates with equal title length.
    ///
    /// Higher wins. Mixed-case and bulleted headings keep the author's
    /// capitalization, so they beat all-uppercase and plain renderings.
    pub fn fidelity_rank(&self) -> u8 {
        match self {
            Dialect::MixedCaseDot | Dialect::BulletPoint | Dialect::ChapterMixedCase => 2,
            Dialect::UppercaseDot
            | Dialect::UppercaseColon
            | Dialect::PlainTextDot
            | Dialect::ChapterUppercase
            | Dialect::ChapterRoman => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A heading occurrence found by one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerCandidate {
    pub kind: MarkerKind,
    /// Byte offset of the match start in the normalized document text.
    pub position: usize,
    pub number: u32,
    pub variant: Option<char>,
    pub title: String,
    pub matched_text: String,
    pub dialect: Dialect,
}

/// Grouping key for deduplication: one logical unit per key.
pub type MarkerKey = (MarkerKind, u32, Option<char>);

impl MarkerCandidate {
    pub fn key(&self) -> MarkerKey {
        (self.kind, self.number, self.variant)
    }
}

/// The canonical marker chosen for one logical unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMarker {
    pub kind: MarkerKind,
    pub position: usize,
    pub number: u32,
    pub variant: Option<char>,
    pub title: String,
    pub dialect: Dialect,
    /// Label prefix used when rendering a chapter ("Chủ đề", "Chương").
    pub label: &'static str,
}

/// Chapter fields assigned to a lesson number. All `None` when no chapter
/// was found in either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterAssignment {
    pub chapter_number: Option<u32>,
    pub chapter_title: Option<String>,
    pub chapter_full_label: Option<String>,
}

impl ChapterAssignment {
    pub fn is_empty(&self) -> bool {
        self.chapter_number.is_none()
    }
}

/// Lesson number → chapter, built once per document.
pub type ChapterMap = BTreeMap<u32, ChapterAssignment>;

/// Which pass of the segmenter produced a span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    #[default]
    Strict,
    Fallback,
    WholeDocument,
}

impl fmt::Display for SegmentationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SegmentationMode::Strict => "strict",
            SegmentationMode::Fallback => "fallback",
            SegmentationMode::WholeDocument => "whole_document",
        })
    }
}

/// The contiguous text of one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonSpan {
    pub number: Option<u32>,
    pub variant: Option<char>,
    pub title: String,
    pub start: usize,
    pub end: usize,
    pub raw_text: String,
    pub mode: SegmentationMode,
}

/// Document-level attributes inferred outside the core (from the filename).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContext {
    pub subject: String,
    pub subject_key: String,
    pub grade: Option<u32>,
    pub education_level: Option<String>,
}

impl Default for DocumentContext {
    fn default() -> Self {
        Self {
            subject: "Unknown".to_string(),
            subject_key: "unknown".to_string(),
            grade: None,
            education_level: None,
        }
    }
}

/// Attributes derived once per lesson and copied into each of its chunks.
///
/// `chapter*`, `lesson_number` and `lesson_title` are always serialized
/// (as `null` when unknown) so downstream filters can query them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonMetadata {
    pub subject: String,
    pub subject_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub education_level: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
    #[serde(default)]
    pub chapter_number: Option<u32>,
    #[serde(default)]
    pub chapter_title: Option<String>,
    #[serde(default)]
    pub lesson_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_variant: Option<char>,
    #[serde(default)]
    pub lesson_title: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub has_questions: bool,
    #[serde(default)]
    pub has_activities: bool,
    #[serde(default)]
    pub has_exercises: bool,
    #[serde(default)]
    pub has_code: bool,
    #[serde(default)]
    pub has_formula: bool,
    #[serde(default)]
    pub has_diagram: bool,
    #[serde(default)]
    pub has_table: bool,
    #[serde(default)]
    pub code_blocks_count: usize,
    #[serde(default)]
    pub question_count: usize,
    #[serde(default)]
    pub activity_count: usize,
    #[serde(default)]
    pub section_count: usize,
    #[serde(default)]
    pub objective_count: usize,
    #[serde(default)]
    pub content_length: usize,
    /// Minutes, at a fixed characters-per-minute rate.
    #[serde(default)]
    pub estimated_reading_time: usize,
    #[serde(default)]
    pub segmentation: SegmentationMode,
}

/// What a semantic piece of a lesson starts with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    #[default]
    General,
    Activity,
    Question,
    Exercise,
    Example,
    CodeBlock,
    SectionHeading,
}

impl SectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionType::General => "general",
            SectionType::Activity => "activity",
            SectionType::Question => "question",
            SectionType::Exercise => "exercise",
            SectionType::Example => "example",
            SectionType::CodeBlock => "code_block",
            SectionType::SectionHeading => "section_heading",
        }
    }
}

/// Chunk-level content tags, computed independently of the lesson flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Activity,
    Question,
    Example,
    Code,
    Exercise,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Activity => "activity",
            ContentType::Question => "question",
            ContentType::Example => "example",
            ContentType::Code => "code",
            ContentType::Exercise => "exercise",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentDensity {
    pub char_per_token: f64,
    pub has_formulas: bool,
    pub has_lists: bool,
    pub has_code: bool,
}

/// Lesson metadata plus the fields specific to one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(flatten)]
    pub lesson: LessonMetadata,
    #[serde(default)]
    pub section_type: SectionType,
    /// Title of the nearest section heading at or before the chunk.
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub is_complete_section: bool,
    /// Set when an indivisible unit exceeded the configured size.
    #[serde(default)]
    pub is_oversized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_section_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_sub_sections: Option<usize>,
    #[serde(default)]
    pub chunk_position_index: usize,
    #[serde(default)]
    pub total_chunks: usize,
    #[serde(default)]
    pub relative_position: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_preview: Option<String>,
    #[serde(default)]
    pub content_types: Vec<ContentType>,
    #[serde(default)]
    pub key_terms: Vec<String>,
    #[serde(default)]
    pub content_density: ContentDensity,
}

/// A chunk before it has been numbered within its document.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDraft {
    pub content: String,
    pub token_count: usize,
    pub char_count: usize,
    pub metadata: ChunkMetadata,
}

/// The persisted, terminal unit handed to the downstream index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub content: String,
    pub token_count: usize,
    pub char_count: usize,
    pub source_file: String,
    pub lesson_index: usize,
    /// SHA-256 of `content`, hex encoded.
    pub content_hash: String,
    pub metadata: ChunkMetadata,
}
