//! Per-lesson metadata extraction.
//!
//! The lesson number and title are re-matched inside the span with the
//! lesson templates in priority order. Chapter fields are never read from
//! the span: they come from the [`ChapterMap`] so that segmentation and
//! metadata agree on which chapter a lesson belongs to.

use regex::Regex;

use crate::detect::{clean_title, strip_page_number, MarkerDetector};
use crate::error::{Error, Result};
use crate::models::{
    ChapterMap, DocumentContext, LessonMetadata, LessonSpan, MarkerKind, ResolvedMarker,
};

/// Characters read per minute for the reading-time estimate.
pub const CHARS_PER_MINUTE: usize = 200;
pub const MAX_OBJECTIVES: usize = 10;

const CODE_KEYWORDS: &[&str] = &["def ", "class ", "print(", "import ", "```"];

pub struct MetadataExtractor {
    detector: MarkerDetector,
    objectives_intro: Regex,
    objectives_stop: Regex,
    title_preamble: Regex,
    questions: Regex,
    activities: Regex,
    exercises: Regex,
    code_words: Regex,
    formula: Regex,
    diagram: Regex,
    table: Regex,
    question_numbered: Regex,
    activity_numbered: Regex,
}

fn compile(id: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::Pattern { id, source })
}

impl MetadataExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            detector: MarkerDetector::new()?,
            objectives_intro: compile("objectives_intro", r"(?i)Sau bài (?:này )?em (?:sẽ|cần)\s*:")?,
            objectives_stop: compile("objectives_stop", r"^(?:KHỞI ĐỘNG|NỘI DUNG)")?,
            title_preamble: compile("title_preamble", r"(?is)\s+Sau\s+bài\s+này.*$")?,
            questions: compile("questions", r"(?i)câu hỏi|thảo luận")?,
            activities: compile("activities", r"(?i)hoạt động|thực hành|làm việc")?,
            exercises: compile("exercises", r"(?i)luyện tập|vận dụng|bài tập|thực hiện")?,
            code_words: compile("code_words", r"(?i)\bcode\b|\bscript\b")?,
            formula: compile("formula", r"=|×|÷|√|\d\s*[+\-*/^]\s*\d")?,
            diagram: compile("diagram", r"(?i)hình|sơ đồ|biểu đồ|đồ thị")?,
            table: compile("table", r"(?i)\bbảng\b")?,
            question_numbered: compile("question_numbered", r"(?i)câu hỏi\s*\d+")?,
            activity_numbered: compile("activity_numbered", r"(?i)hoạt động\s*\d+")?,
        })
    }

    /// Derive the metadata of one lesson.
    ///
    /// `sections` are the resolved section markers lying inside the span.
    pub fn extract(
        &self,
        span: &LessonSpan,
        context: &DocumentContext,
        chapters: &ChapterMap,
        sections: &[ResolvedMarker],
    ) -> LessonMetadata {
        let text = span.raw_text.trim();

        let heading = self.detector.first_by_priority(text, MarkerKind::Lesson);
        let (lesson_number, lesson_variant, raw_title) = match &heading {
            Some(c) => (Some(c.number), c.variant, c.title.as_str()),
            None => (span.number, span.variant, span.title.as_str()),
        };
        let title = self.clean_lesson_title(raw_title);

        let chapter = lesson_number
            .and_then(|n| chapters.get(&n))
            .cloned()
            .unwrap_or_default();

        let topics = self.objectives(text);
        let content_length = text.chars().count();

        LessonMetadata {
            subject: context.subject.clone(),
            subject_key: context.subject_key.clone(),
            grade: context.grade,
            education_level: context.education_level.clone(),
            chapter: chapter.chapter_full_label,
            chapter_number: chapter.chapter_number,
            chapter_title: chapter.chapter_title,
            lesson_number,
            lesson_variant,
            lesson_title: Some(title).filter(|t| !t.is_empty()),
            objective_count: topics.len(),
            topics,
            has_questions: self.questions.is_match(text),
            has_activities: self.activities.is_match(text),
            has_exercises: self.exercises.is_match(text),
            has_code: has_code(text) || self.code_words.is_match(text),
            has_formula: self.formula.is_match(text),
            has_diagram: self.diagram.is_match(text),
            has_table: self.table.is_match(text),
            code_blocks_count: text.matches("```").count().div_ceil(2),
            question_count: self.question_numbered.find_iter(text).count(),
            activity_count: self.activity_numbered.find_iter(text).count(),
            section_count: sections.len(),
            content_length,
            estimated_reading_time: (content_length / CHARS_PER_MINUTE).max(1),
            segmentation: span.mode,
        }
    }

    fn clean_lesson_title(&self, raw: &str) -> String {
        let title = clean_title(strip_page_number(raw));
        self.title_preamble.replace(&title, "").trim().to_string()
    }

    /// Bullet lines of the "Sau bài này em sẽ:" block.
    pub fn objectives(&self, text: &str) -> Vec<String> {
        let Some(intro) = self.objectives_intro.find(text) else {
            return Vec::new();
        };
        let mut objectives = Vec::new();
        let mut previous_blank = false;
        // The first line is the remainder of the intro line itself.
        for (i, line) in text[intro.end()..].lines().enumerate() {
            let line = line.trim();
            if self.objectives_stop.is_match(line) {
                break;
            }
            if previous_blank && line.chars().next().is_some_and(char::is_uppercase) {
                break;
            }
            previous_blank = i > 0 && line.is_empty();

            let Some(item) = line.strip_prefix(|c| matches!(c, '*' | '-' | '•')) else {
                continue;
            };
            let item = item.trim();
            if (10..=200).contains(&item.chars().count()) {
                objectives.push(item.to_string());
                if objectives.len() == MAX_OBJECTIVES {
                    break;
                }
            }
        }
        objectives
    }
}

/// Programming keywords or a code fence.
pub fn has_code(text: &str) -> bool {
    CODE_KEYWORDS.iter().any(|kw| text.contains(kw))
}
