//! Marker detection.
//!
//! Runs every row of the heading table in [`crate::patterns`] over the whole
//! document and emits one [`MarkerCandidate`] per match. A heading printed
//! once is often matched by several dialects; the resolver collapses those.
//!
//! A match whose numeral cannot be parsed, or which looks like a
//! table-of-contents entry under a non-TOC dialect, is discarded on its own
//! without affecting the rest of the pass.

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Dialect, MarkerCandidate, MarkerKind};
use crate::patterns::{self, CompiledPattern, TOC_ENTRY_SUFFIX};

pub struct MarkerDetector {
    patterns: Vec<CompiledPattern>,
    toc_suffix: Regex,
}

impl MarkerDetector {
    pub fn new() -> Result<Self> {
        let toc_suffix = Regex::new(TOC_ENTRY_SUFFIX).map_err(|source| Error::Pattern {
            id: "toc_entry_suffix",
            source,
        })?;
        Ok(Self {
            patterns: patterns::compile_all()?,
            toc_suffix,
        })
    }

    /// Scan `text` with every template. The result is unsorted.
    pub fn detect(&self, text: &str) -> Vec<MarkerCandidate> {
        let mut out = Vec::new();
        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                if let Some(candidate) = self.candidate(pattern, &caps) {
                    out.push(candidate);
                }
            }
        }
        debug!(candidates = out.len(), "marker detection finished");
        out
    }

    /// Only the chapter and lesson candidates.
    pub fn detect_structural(&self, text: &str) -> Vec<MarkerCandidate> {
        self.detect(text)
            .into_iter()
            .filter(|c| c.kind != MarkerKind::Section)
            .collect()
    }

    /// The match of the highest-priority template of `kind`, earliest
    /// position first among equal priorities.
    pub fn first_by_priority(&self, text: &str, kind: MarkerKind) -> Option<MarkerCandidate> {
        let mut best: Option<(u8, MarkerCandidate)> = None;
        for pattern in self.patterns.iter().filter(|p| p.spec.kind == kind) {
            let priority = pattern.spec.priority;
            if best.as_ref().is_some_and(|(p, _)| *p < priority) {
                continue;
            }
            let found = pattern
                .regex
                .captures_iter(text)
                .find_map(|caps| self.candidate(pattern, &caps));
            if let Some(candidate) = found {
                let replace = match &best {
                    Some((p, current)) => priority < *p || candidate.position < current.position,
                    None => true,
                };
                if replace {
                    best = Some((priority, candidate));
                }
            }
        }
        best.map(|(_, candidate)| candidate)
    }

    fn candidate(&self, pattern: &CompiledPattern, caps: &Captures<'_>) -> Option<MarkerCandidate> {
        let whole = caps.get(0)?;
        let raw = whole.as_str();
        let spec = &pattern.spec;

        if let Some(reject) = &pattern.reject {
            if reject.is_match(raw) {
                return None;
            }
        }

        let number = match caps.name("num") {
            Some(m) => match patterns::parse_numeral(m.as_str()) {
                Some(n) => n,
                None => {
                    debug!(
                        dialect = %spec.dialect,
                        position = whole.start(),
                        numeral = m.as_str(),
                        "discarding candidate with malformed numeral"
                    );
                    return None;
                }
            },
            // Section markers may be unnumbered ("Hoạt động khởi động").
            None if spec.kind == MarkerKind::Section => 0,
            None => return None,
        };

        let title = caps
            .name("title")
            .map(|m| clean_title(m.as_str()))
            .unwrap_or_default();

        if spec.kind != MarkerKind::Section
            && spec.dialect != Dialect::TableOfContents
            && self.toc_suffix.is_match(&title)
        {
            debug!(dialect = %spec.dialect, position = whole.start(), "discarding toc-like title");
            return None;
        }

        let lead = raw.len() - raw.trim_start().len();
        Some(MarkerCandidate {
            kind: spec.kind,
            position: whole.start() + lead,
            number,
            variant: caps
                .name("variant")
                .and_then(|m| m.as_str().chars().next()),
            title,
            matched_text: raw.trim().to_string(),
            dialect: spec.dialect,
        })
    }
}

/// Collapse internal whitespace and trim.
pub fn clean_title(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop a trailing page number left over from a printed header
/// ("THÔNG TIN VÀ DỮ LIỆU 5").
pub fn strip_page_number(title: &str) -> &str {
    let trimmed = title.trim_end();
    let without_digits = trimmed.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == trimmed.len() || !without_digits.ends_with(char::is_whitespace) {
        return trimmed;
    }
    let rest = without_digits.trim_end();
    if rest.is_empty() {
        trimmed
    } else {
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> MarkerDetector {
        MarkerDetector::new().unwrap()
    }

    fn lessons(text: &str) -> Vec<MarkerCandidate> {
        detector()
            .detect(text)
            .into_iter()
            .filter(|c| c.kind == MarkerKind::Lesson)
            .collect()
    }

    #[test]
    fn test_uppercase_dot_heading() {
        let found = lessons("BÀI 1. MÁY TÍNH VÀ EM\nNội dung");
        let c = found
            .iter()
            .find(|c| c.dialect == Dialect::UppercaseDot)
            .unwrap();
        assert_eq!(c.number, 1);
        assert_eq!(c.title, "MÁY TÍNH VÀ EM");
        assert_eq!(c.position, 0);
    }

    #[test]
    fn test_heading_matched_by_several_dialects() {
        let found = lessons("BÀI 3. Mạng máy tính\nNội dung");
        let dialects: Vec<Dialect> = found.iter().map(|c| c.dialect).collect();
        assert!(dialects.contains(&Dialect::UppercaseDot));
        assert!(dialects.contains(&Dialect::PlainTextDot));
        assert!(found.iter().all(|c| c.number == 3 && c.position == 0));
    }

    #[test]
    fn test_colon_and_variant() {
        let found = lessons("BÀI 12A: Thực hành soạn thảo\n");
        let c = found
            .iter()
            .find(|c| c.dialect == Dialect::UppercaseColon)
            .unwrap();
        assert_eq!(c.number, 12);
        assert_eq!(c.variant, Some('A'));
        assert_eq!(c.title, "Thực hành soạn thảo");
    }

    #[test]
    fn test_mixed_case_and_bullet() {
        let text = "Bài 2. Thông tin và dữ liệu\n• Bài 4 Mạng xã hội, trang 20\n";
        let found = lessons(text);
        assert!(found
            .iter()
            .any(|c| c.dialect == Dialect::MixedCaseDot && c.number == 2));
        let bullet = found
            .iter()
            .find(|c| c.dialect == Dialect::BulletPoint)
            .unwrap();
        assert_eq!(bullet.number, 4);
        assert_eq!(bullet.title, "Mạng xã hội");
    }

    #[test]
    fn test_toc_entry_only_matches_toc_dialect() {
        let found = lessons("Bài 5. Thuật toán (Trang 30)\n");
        assert!(!found.is_empty());
        assert!(found.iter().all(|c| c.dialect == Dialect::TableOfContents));
        assert_eq!(found[0].title, "Thuật toán");
    }

    #[test]
    fn test_standalone_and_no_punctuation() {
        let found = lessons("BÀI 7\nNội dung\nBÀI 8 ĐỊNH DẠNG VĂN BẢN\n");
        assert!(found
            .iter()
            .any(|c| c.dialect == Dialect::StandaloneUppercase && c.number == 7 && c.title.is_empty()));
        assert!(found
            .iter()
            .any(|c| c.dialect == Dialect::NoPunctuation && c.number == 8));
    }

    #[test]
    fn test_mojibake_lesson_and_chapter() {
        let text = "CHá»¦ Äá»€ 2 MANG MAY TINH\nBÃ€I 4. MANG XA HOI\n";
        let found = detector().detect(text);
        assert!(found
            .iter()
            .any(|c| c.dialect == Dialect::ChapterMojibake && c.number == 2));
        assert!(found
            .iter()
            .any(|c| c.dialect == Dialect::Mojibake && c.number == 4));
    }

    #[test]
    fn test_roman_chapter() {
        let found = detector().detect("CHƯƠNG IV. DAO ĐỘNG CƠ\n");
        let c = found
            .iter()
            .find(|c| c.kind == MarkerKind::Chapter)
            .unwrap();
        assert_eq!(c.number, 4);
        assert_eq!(c.title, "DAO ĐỘNG CƠ");
    }

    #[test]
    fn test_malformed_numeral_is_discarded() {
        let found = detector().detect("BÀI 99999999999999999999. QUÁ LỚN\nBÀI 2. HỢP LỆ\n");
        assert!(found.iter().all(|c| c.number != 0 || c.kind == MarkerKind::Section));
        assert!(found.iter().any(|c| c.kind == MarkerKind::Lesson && c.number == 2));
        assert!(!found
            .iter()
            .any(|c| c.kind == MarkerKind::Lesson && c.title.contains("QUÁ LỚN")));
    }

    #[test]
    fn test_section_markers() {
        let text = "1. Khái niệm\na) Ví dụ mở đầu\n- Hoạt động 2: Thảo luận nhóm\n";
        let sections: Vec<MarkerCandidate> = detector()
            .detect(text)
            .into_iter()
            .filter(|c| c.kind == MarkerKind::Section)
            .collect();
        assert!(sections
            .iter()
            .any(|c| c.dialect == Dialect::NumberedSection && c.title == "Khái niệm"));
        assert!(sections
            .iter()
            .any(|c| c.dialect == Dialect::LetteredSubsection && c.number == 1));
        assert!(sections
            .iter()
            .any(|c| c.dialect == Dialect::ActivityMarker && c.number == 2));
    }

    #[test]
    fn test_first_by_priority_prefers_uppercase_dot() {
        let text = "Bài 2. Tiêu đề phụ\nBÀI 2. TIÊU ĐỀ CHÍNH\n";
        let c = detector()
            .first_by_priority(text, MarkerKind::Lesson)
            .unwrap();
        assert_eq!(c.dialect, Dialect::UppercaseDot);
        assert_eq!(c.title, "TIÊU ĐỀ CHÍNH");
    }

    #[test]
    fn test_strip_page_number() {
        assert_eq!(strip_page_number("THÔNG TIN VÀ DỮ LIỆU 5"), "THÔNG TIN VÀ DỮ LIỆU");
        assert_eq!(strip_page_number("Python3"), "Python3");
        assert_eq!(strip_page_number("12"), "12");
        assert_eq!(strip_page_number("Máy tính"), "Máy tính");
    }

    #[test]
    fn test_plain_prose_has_no_structural_markers() {
        let text = "Máy tính là thiết bị xử lí thông tin. Bài học hôm nay rất thú vị.";
        assert!(detector().detect_structural(text).is_empty());
    }
}
