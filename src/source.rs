//! Source discovery, decoding and filename inference.
//!
//! Files are read once as bytes and decoded with `encoding_rs` (BOM sniffing,
//! UTF-8 with replacement). Subject and grade come from the file name only;
//! they are a thin lookup, not part of the segmentation logic.

use anyhow::{bail, Context, Result};
use encoding_rs::UTF_8;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use sgk_chunker_core::{DocumentContext, SourceRef};

use crate::config::{SourceConfig, SubjectEntry};

/// A decoded input document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub source: SourceRef,
    pub text: String,
    /// U+FFFD characters introduced while decoding.
    pub replacements: usize,
}

/// List the input files under `input`, sorted for deterministic order.
///
/// A file argument is returned as is, without glob filtering.
pub fn scan_inputs(input: &Path, config: &SourceConfig) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        bail!("Input does not exist: {}", input.display());
    }
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut excludes = vec!["**/.git/**".to_string()];
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(input) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(input).unwrap_or(path);
        let rel_str = relative.to_string_lossy();
        if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
            continue;
        }
        paths.push(path.to_path_buf());
    }
    paths.sort();
    Ok(paths)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {pattern}"))?);
    }
    Ok(builder.build()?)
}

/// Decode bytes as UTF-8, honouring a BOM. Returns the text and the number
/// of replacement characters the decoder inserted.
pub fn decode(bytes: &[u8]) -> (String, usize) {
    let existing = count_replacements_raw(bytes);
    let (text, _encoding, had_errors) = UTF_8.decode(bytes);
    let replacements = if had_errors {
        text.chars()
            .filter(|&c| c == char::REPLACEMENT_CHARACTER)
            .count()
            .saturating_sub(existing)
    } else {
        0
    };
    (text.into_owned(), replacements)
}

/// U+FFFD already present in valid UTF-8 input is content, not damage.
fn count_replacements_raw(bytes: &[u8]) -> usize {
    const ENCODED: &[u8] = "\u{FFFD}".as_bytes();
    bytes.windows(ENCODED.len()).filter(|w| *w == ENCODED).count()
}

/// Read and decode one file.
pub fn load_document(path: &Path, config: &SourceConfig) -> Result<SourceDocument> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let (text, replacements) = decode(&bytes);

    let chars = text.chars().count();
    if text.trim().is_empty() {
        bail!("Empty document: {}", path.display());
    }
    let ratio = replacements as f64 / chars as f64;
    if ratio > config.max_replacement_ratio {
        bail!(
            "Unreadable document {}: {} of {} characters could not be decoded",
            path.display(),
            replacements,
            chars
        );
    }
    if replacements > 0 {
        warn!(path = %path.display(), replacements, "replaced undecodable bytes");
    }

    Ok(SourceDocument {
        path: path.to_path_buf(),
        source: source_ref(path),
        text,
        replacements,
    })
}

pub fn source_ref(path: &Path) -> SourceRef {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    SourceRef { stem, file_name }
}

/// Output stems for `paths`, one per path and all distinct. A file stem
/// shared by several inputs is replaced by the path relative to `root`
/// joined with `_` (`lop6/sgk_tin_hoc.txt` becomes `lop6_sgk_tin_hoc`).
pub fn unique_stems(root: &Path, paths: &[PathBuf]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for path in paths {
        *counts.entry(source_ref(path).stem).or_default() += 1;
    }

    let mut taken: HashSet<String> = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let stem = source_ref(path).stem;
            let base = if counts.get(&stem).copied().unwrap_or(0) > 1 {
                relative_stem(root, path)
            } else {
                stem
            };
            let mut candidate = base.clone();
            let mut n = 1;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{base}_{n}");
                n += 1;
            }
            candidate
        })
        .collect()
}

fn relative_stem(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
}

const BUILTIN_SUBJECTS: &[(&str, &str, &[&str])] = &[
    ("tin_hoc", "Tin học", &["tin_hoc", "tin học", "tin hoc", "tinhoc"]),
    ("toan", "Toán học", &["toan", "toán"]),
    ("ngu_van", "Ngữ văn", &["ngu_van", "ngữ văn", "ngu van", "van_hoc"]),
    ("vat_ly", "Vật lý", &["vat_ly", "vật lý", "vat ly", "vatly"]),
    ("hoa_hoc", "Hóa học", &["hoa_hoc", "hóa học", "hoá học", "hoa hoc"]),
    ("sinh_hoc", "Sinh học", &["sinh_hoc", "sinh học", "sinh hoc"]),
];

/// Subject lookup: configured entries first, then the built-in table.
#[derive(Debug, Clone)]
pub struct SubjectTable {
    entries: Vec<SubjectEntry>,
}

impl SubjectTable {
    pub fn new(extra: &[SubjectEntry]) -> Self {
        let mut entries = extra.to_vec();
        entries.extend(BUILTIN_SUBJECTS.iter().map(|(key, name, aliases)| SubjectEntry {
            key: key.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }));
        Self { entries }
    }

    /// First entry whose key or an alias occurs in the lower-cased name.
    pub fn infer(&self, file_name: &str) -> Option<&SubjectEntry> {
        let name = file_name.to_lowercase();
        self.entries.iter().find(|entry| {
            name.contains(&entry.key.to_lowercase())
                || entry.aliases.iter().any(|a| name.contains(&a.to_lowercase()))
        })
    }

    /// Document context inferred from the file name.
    pub fn context(&self, file_name: &str) -> DocumentContext {
        let grade = infer_grade(file_name);
        let mut context = DocumentContext {
            grade,
            education_level: grade.map(|g| education_level(g).to_string()),
            ..DocumentContext::default()
        };
        if let Some(subject) = self.infer(file_name) {
            context.subject = subject.name.clone();
            context.subject_key = subject.key.clone();
        }
        context
    }
}

/// First run of digits in the file name. Zero is not a grade.
pub fn infer_grade(file_name: &str) -> Option<u32> {
    let digits: String = file_name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok().filter(|&g| g > 0)
}

pub fn education_level(grade: u32) -> &'static str {
    match grade {
        0..=5 => "Tiểu học",
        6..=9 => "THCS",
        _ => "THPT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unique_stems_disambiguates_shared_names() {
        let root = Path::new("/data/raw");
        let paths = vec![
            root.join("lop6/sgk_tin_hoc.txt"),
            root.join("lop7/sgk_tin_hoc.txt"),
            root.join("sgk_toan_6.txt"),
        ];
        assert_eq!(
            unique_stems(root, &paths),
            vec!["lop6_sgk_tin_hoc", "lop7_sgk_tin_hoc", "sgk_toan_6"]
        );
    }

    #[test]
    fn test_unique_stems_suffixes_residual_collisions() {
        let root = Path::new("/data/raw");
        let paths = vec![
            root.join("a/b_c.txt"),
            root.join("a_b/c.txt"),
            root.join("x/b_c.txt"),
            root.join("y/c.txt"),
        ];
        let stems = unique_stems(root, &paths);
        assert_eq!(stems, vec!["a_b_c", "a_b_c_1", "x_b_c", "y_c"]);
    }

    #[test]
    fn test_grade_and_level() {
        assert_eq!(infer_grade("sgk_tin_hoc_6.txt"), Some(6));
        assert_eq!(infer_grade("sgk_toan_11_tap2.txt"), Some(11));
        assert_eq!(infer_grade("notes.txt"), None);
        assert_eq!(infer_grade("ban_0.txt"), None);
        assert_eq!(education_level(3), "Tiểu học");
        assert_eq!(education_level(9), "THCS");
        assert_eq!(education_level(12), "THPT");
    }

    #[test]
    fn test_subject_inference() {
        let table = SubjectTable::new(&[]);
        let context = table.context("SGK_Tin_Hoc_10.txt");
        assert_eq!(context.subject, "Tin học");
        assert_eq!(context.subject_key, "tin_hoc");
        assert_eq!(context.grade, Some(10));
        assert_eq!(context.education_level.as_deref(), Some("THPT"));

        let unknown = table.context("tai_lieu.txt");
        assert_eq!(unknown.subject_key, "unknown");
        assert_eq!(unknown.grade, None);
        assert_eq!(unknown.education_level, None);
    }

    #[test]
    fn test_configured_subjects_win() {
        let table = SubjectTable::new(&[SubjectEntry {
            key: "dia_ly".into(),
            name: "Địa lý".into(),
            aliases: vec!["dia".into()],
        }]);
        assert_eq!(table.context("sgk_dia_7.txt").subject, "Địa lý");
        assert_eq!(table.context("sgk_toan_7.txt").subject_key, "toan");
    }

    #[test]
    fn test_decode_bom_and_invalid_bytes() {
        let (text, replacements) = decode(b"\xEF\xBB\xBFB\xC3\x80I 1");
        assert_eq!(text, "BÀI 1");
        assert_eq!(replacements, 0);

        let (text, replacements) = decode(b"ab\xFFcd");
        assert_eq!(text, "ab\u{FFFD}cd");
        assert_eq!(replacements, 1);

        let (_, replacements) = decode("đã có \u{FFFD}".as_bytes());
        assert_eq!(replacements, 0);
    }

    #[test]
    fn test_load_rejects_garbage_and_empty() {
        let dir = TempDir::new().unwrap();
        let garbage = dir.path().join("garbage.txt");
        fs::write(&garbage, [0xFFu8; 64]).unwrap();
        let err = load_document(&garbage, &SourceConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Unreadable"));

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "  \n").unwrap();
        assert!(load_document(&empty, &SourceConfig::default()).is_err());

        let missing = dir.path().join("missing.txt");
        assert!(load_document(&missing, &SourceConfig::default()).is_err());
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::write(dir.path().join("b/sgk_2.txt"), "x").unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        fs::write(dir.path().join("skip.md"), "x").unwrap();
        fs::write(dir.path().join("draft.txt"), "x").unwrap();

        let config = SourceConfig {
            exclude_globs: vec!["draft.txt".into()],
            ..SourceConfig::default()
        };
        let paths = scan_inputs(dir.path(), &config).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt".to_string(), "b/sgk_2.txt".to_string()]);
    }
}
