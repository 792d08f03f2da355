//! Declarative heading templates.
//!
//! Every heading dialect is one [`PatternSpec`] row: the marker kind it
//! produces, the dialect tag, a regex template and a priority. The detector
//! runs all rows through one generic matching loop, so adding a dialect is a
//! new row here and nothing else.
//!
//! Templates use these named groups:
//!
//! | Group | Meaning |
//! |-------|---------|
//! | `num` | heading number (Arabic, Roman, or a single lowercase letter) |
//! | `variant` | optional uppercase letter directly after the number (`12A`) |
//! | `title` | optional heading title |

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{Dialect, MarkerKind};

/// A title ending like a table-of-contents entry: `(Trang 12)`, `, trang 12`,
/// or a dot leader followed by a page number.
pub const TOC_ENTRY_SUFFIX: &str =
    r"(?i)(?:\(\s*(?:trang|page)\s*\d+\s*\)|,\s*(?:trang|page)\s+\d+|\.{3,}\s*\d+|…+\s*\d+)\s*$";

/// One heading dialect.
#[derive(Debug, Clone, Copy)]
pub struct PatternSpec {
    pub kind: MarkerKind,
    pub dialect: Dialect,
    pub template: &'static str,
    /// Lower runs first when a single best match is wanted (metadata
    /// re-matching). Detection itself runs every row.
    pub priority: u8,
    /// Matched text that also matches this pattern is discarded.
    pub reject_matched: Option<&'static str>,
    /// Rendering prefix for chapter labels.
    pub label: &'static str,
}

pub const PATTERNS: &[PatternSpec] = &[
    // ── Lessons ─────────────────────────────────────────────────────────
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::UppercaseDot,
        template: r"(?m)\bBÀI[ \t]+(?P<num>\d+)(?P<variant>[A-Z])?[ \t]*\.[ \t]*(?P<title>\p{Lu}[^.\n]*)$",
        priority: 0,
        reject_matched: None,
        label: "Bài",
    },
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::UppercaseColon,
        template: r"(?m)\bBÀI[ \t]+(?P<num>\d+)(?P<variant>[A-Z])?[ \t]*:[ \t]*(?P<title>\p{Lu}[^:\n]*)$",
        priority: 1,
        reject_matched: None,
        label: "Bài",
    },
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::MixedCaseDot,
        template: r"(?m)^[ \t]*Bài[ \t]+(?P<num>\d+)(?P<variant>[A-Z])?(?:[ \t]*\.[ \t]*|[ \t]+)(?P<title>\p{Lu}[^.\n]*)$",
        priority: 2,
        reject_matched: None,
        label: "Bài",
    },
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::BulletPoint,
        template: r"(?m)^[ \t]*[*•\-][ \t]*Bài[ \t]+(?P<num>\d+)(?P<variant>[A-Z])?(?:[ \t]*\.[ \t]*|[ \t]+)(?P<title>\p{Lu}[^,\n]*)",
        priority: 3,
        reject_matched: None,
        label: "Bài",
    },
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::PlainTextDot,
        template: r"(?m)^[ \t]*BÀI[ \t]+(?P<num>\d+)(?P<variant>[A-Z])?[ \t]*\.[ \t]*(?P<title>\p{Lu}[^.\n]*)$",
        priority: 4,
        reject_matched: None,
        label: "Bài",
    },
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::NoPunctuation,
        template: r"(?m)^[ \t]*BÀI[ \t]+(?P<num>\d+)[ \t]+(?P<title>\p{Lu}[^\n]*)$",
        priority: 5,
        reject_matched: Some(r"[.:\-]"),
        label: "Bài",
    },
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::StandaloneUppercase,
        template: r"(?m)^[ \t]*BÀI[ \t]+(?P<num>\d+)(?P<variant>[A-Z])?(?:[ \t]+(?P<title>\p{Lu}[^\n]*?))?[ \t]*$",
        priority: 6,
        reject_matched: None,
        label: "Bài",
    },
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::Mojibake,
        template: r"(?m)BÃ€I[ \t]+(?P<num>\d+)(?P<variant>[A-Z])?(?:[ \t]*[.:\-]?[ \t]*(?P<title>\p{Lu}[^\n]*?))?[ \t]*$",
        priority: 7,
        reject_matched: None,
        label: "Bài",
    },
    PatternSpec {
        kind: MarkerKind::Lesson,
        dialect: Dialect::TableOfContents,
        template: r"(?m)(?i:bài)[ \t]+(?P<num>\d+)(?P<variant>[A-Z])?(?:[ \t]*\.[ \t]*|[ \t]+)(?P<title>[^(\n]*?)[ \t]*\((?i:trang|page)[ \t]+\d+\)",
        priority: 8,
        reject_matched: None,
        label: "Bài",
    },
    // ── Chapters ────────────────────────────────────────────────────────
    PatternSpec {
        kind: MarkerKind::Chapter,
        dialect: Dialect::ChapterUppercase,
        template: r"(?m)\bCHỦ ĐỀ[ \t]+(?P<num>\d+)[ \t]*[.:：\-]?[ \t]*(?P<title>\p{Lu}[^\n]*)$",
        priority: 0,
        reject_matched: None,
        label: "Chủ đề",
    },
    PatternSpec {
        kind: MarkerKind::Chapter,
        dialect: Dialect::ChapterMixedCase,
        template: r"(?m)^[ \t]*Chủ đề[ \t]+(?P<num>\d+)[ \t]*[.:：\-]?[ \t]*(?P<title>\p{Lu}[^\n]*)$",
        priority: 1,
        reject_matched: None,
        label: "Chủ đề",
    },
    PatternSpec {
        kind: MarkerKind::Chapter,
        dialect: Dialect::ChapterMojibake,
        template: r"(?m)CHá»¦ Ä\x{90}?á»€[ \t]+(?P<num>\d+)[ \t]*[.:：\-]?[ \t]*(?P<title>\p{Lu}[^\n]*)$",
        priority: 2,
        reject_matched: None,
        label: "Chủ đề",
    },
    PatternSpec {
        kind: MarkerKind::Chapter,
        dialect: Dialect::ChapterRoman,
        template: r"(?m)^[ \t]*(?:CHƯƠNG|Chương)[ \t]+(?P<num>\d+|[IVXLCDM]+\b)[ \t]*[.:：\-]?[ \t]*(?P<title>\p{Lu}[^\n]*)$",
        priority: 3,
        reject_matched: None,
        label: "Chương",
    },
    // ── Sections ────────────────────────────────────────────────────────
    PatternSpec {
        kind: MarkerKind::Section,
        dialect: Dialect::NumberedSection,
        template: r"(?m)^[ \t]*(?P<num>\d{1,2})\.[ \t]+(?P<title>\p{Lu}[^\n]*)$",
        priority: 0,
        reject_matched: None,
        label: "",
    },
    PatternSpec {
        kind: MarkerKind::Section,
        dialect: Dialect::LetteredSubsection,
        template: r"(?m)^[ \t]*(?P<num>[a-z])\)[ \t]+(?P<title>\p{Lu}[^\n]*)$",
        priority: 1,
        reject_matched: None,
        label: "",
    },
    PatternSpec {
        kind: MarkerKind::Section,
        dialect: Dialect::ActivityMarker,
        template: r"(?m)^[ \t]*(?:[-•*][ \t]*)?(?P<title>(?i:hoạt động|thực hành|bài tập|câu hỏi|luyện tập|vận dụng|khởi động)(?:[ \t]+(?P<num>\d+))?[^\n]*?)[ \t]*$",
        priority: 2,
        reject_matched: None,
        label: "",
    },
];

/// A [`PatternSpec`] with its regexes compiled.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub spec: PatternSpec,
    pub regex: Regex,
    pub reject: Option<Regex>,
}

/// Compile every row of [`PATTERNS`].
pub fn compile_all() -> Result<Vec<CompiledPattern>> {
    PATTERNS.iter().map(compile).collect()
}

/// Compile the rows of one kind, ordered by priority.
pub fn compile_kind(kind: MarkerKind) -> Result<Vec<CompiledPattern>> {
    let mut specs: Vec<&PatternSpec> = PATTERNS.iter().filter(|p| p.kind == kind).collect();
    specs.sort_by_key(|p| p.priority);
    specs.into_iter().map(compile).collect()
}

fn compile(spec: &PatternSpec) -> Result<CompiledPattern> {
    let regex = Regex::new(spec.template).map_err(|source| Error::Pattern {
        id: spec.dialect.as_str(),
        source,
    })?;
    let reject = spec
        .reject_matched
        .map(|r| {
            Regex::new(r).map_err(|source| Error::Pattern {
                id: spec.dialect.as_str(),
                source,
            })
        })
        .transpose()?;
    Ok(CompiledPattern {
        spec: *spec,
        regex,
        reject,
    })
}

/// Parse a heading numeral: Arabic digits, a canonical Roman numeral, or a
/// single lowercase letter (`a` = 1).
///
/// Returns `None` for overflowing or non-canonical input so the caller can
/// discard the candidate.
pub fn parse_numeral(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<u32>().ok();
    }
    let mut chars = s.chars();
    if let (Some(c), None) = (chars.next(), chars.clone().next()) {
        if c.is_ascii_lowercase() {
            return Some(c as u32 - 'a' as u32 + 1);
        }
    }
    parse_roman(s)
}

fn parse_roman(s: &str) -> Option<u32> {
    let value_of = |c: char| match c {
        'I' => Some(1),
        'V' => Some(5),
        'X' => Some(10),
        'L' => Some(50),
        'C' => Some(100),
        'D' => Some(500),
        'M' => Some(1000),
        _ => None,
    };
    let values: Vec<u32> = s.chars().map(value_of).collect::<Option<_>>()?;
    let mut total = 0u32;
    for (i, v) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(next) if next > v => total = total.checked_sub(*v).unwrap_or(0),
            _ => total += v,
        }
    }
    // Reject non-canonical spellings such as "IIII" or "VX".
    if total == 0 || to_roman(total) != s {
        return None;
    }
    Some(total)
}

fn to_roman(mut n: u32) -> String {
    const TABLE: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, glyph) in TABLE {
        while n >= value {
            out.push_str(glyph);
            n -= value;
        }
    }
    out
}
