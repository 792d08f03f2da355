//! Text cleanup applied before marker detection.
//!
//! Extracted textbook text carries BOMs, mixed line endings, decomposed
//! diacritics, page separators, front matter and table-of-contents pages.
//! The normalizer removes those so the heading templates see one canonical
//! form. All offsets produced by later stages refer to the normalized text.

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

pub struct TextNormalizer {
    front_matter_start: Regex,
    front_matter_stop: Regex,
    toc_heading: Regex,
    toc_stop: Regex,
    toc_entry_lines: Vec<Regex>,
    page_marker: Regex,
    rule_line: Regex,
    inner_spaces: Regex,
    trailing_spaces: Regex,
    blank_runs: Regex,
}

fn compile(id: &'static str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::Pattern { id, source })
}

impl TextNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            front_matter_start: compile("front_matter_start", r"HƯỚNG DẪN SỬ DỤNG SÁCH|LỜI NÓI ĐẦU")?,
            front_matter_stop: compile("front_matter_stop", r"CHỦ ĐỀ|MỤC LỤC")?,
            toc_heading: compile("toc_heading", r"(?m)^[ \t=]*MỤC LỤC[ \t=]*$")?,
            toc_stop: compile("toc_stop", r"(?m)^[ \t]*CHỦ ĐỀ[ \t]+\d+")?,
            toc_entry_lines: vec![
                compile(
                    "toc_entry_comma",
                    r"(?mi)^[ \t]*(?:Chủ đề|Bài)[ \t]+\d+[A-Z]?\.[ \t]+[^\n]+?,[ \t]*Trang[ \t]+\d+[ \t]*\n?",
                )?,
                compile(
                    "toc_entry_spaced",
                    r"(?mi)^[ \t]*(?:Chủ đề|Bài)[ \t]+\d+[A-Z]?\.[ \t]+[^\n]+?[ \t]{5,}\d+[ \t]*\n?",
                )?,
                compile("toc_page_word", r"(?mi)^[ \t]*Trang[ \t]*\n")?,
            ],
            page_marker: compile("page_marker", r"(?mi)^[ \t]*-{2,}[ \t]*PAGE[ \t]+\d+[ \t]*-{2,}[ \t]*$")?,
            rule_line: compile("rule_line", r"(?m)^[ \t]*(?:-{3,}|={3,}|_{3,})[ \t]*$")?,
            inner_spaces: compile("inner_spaces", r"(\S)[ \t]{2,}")?,
            trailing_spaces: compile("trailing_spaces", r"(?m)[ \t]+$")?,
            blank_runs: compile("blank_runs", r"\n{3,}")?,
        })
    }

    pub fn normalize(&self, raw: &str) -> String {
        let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        let text: String = text.nfc().collect();

        let text = self.remove_front_matter(&text);
        let text = self.remove_table_of_contents(&text);
        let text = self.page_marker.replace_all(&text, "");
        let text = self.rule_line.replace_all(&text, "");
        // Leading indentation is kept for code listings.
        let text = self.inner_spaces.replace_all(&text, "$1 ");
        let text = self.trailing_spaces.replace_all(&text, "");
        let text = self.blank_runs.replace_all(&text, "\n\n");
        text.trim().to_string()
    }

    /// Drop "how to use this book" and foreword blocks up to the next
    /// chapter or contents heading. Left untouched when no stop follows.
    fn remove_front_matter(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        while let Some(start) = self.front_matter_start.find_at(text, cursor) {
            let Some(stop) = self.front_matter_stop.find_at(text, start.end()) else {
                break;
            };
            out.push_str(&text[cursor..start.start()]);
            cursor = stop.start();
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// Drop a "MỤC LỤC" page up to the first chapter heading, then any
    /// remaining contents-style lines ("Bài 3. ..., Trang 12").
    fn remove_table_of_contents(&self, text: &str) -> String {
        let mut text = match self.toc_heading.find(text) {
            Some(heading) => match self.toc_stop.find_at(text, heading.end()) {
                Some(stop) => format!("{}{}", &text[..heading.start()], &text[stop.start()..]),
                None => text.to_string(),
            },
            None => text.to_string(),
        };
        for pattern in &self.toc_entry_lines {
            text = pattern.replace_all(&text, "").into_owned();
        }
        text
    }
}
