//! Chunk file persistence: save, load, merge and filter.
//!
//! A chunk file is a JSON array of [`Chunk`] records in sequence order,
//! written with non-ASCII text preserved.

use anyhow::{Context, Result};
use std::path::Path;

use sgk_chunker_core::Chunk;

/// Write `chunks` to `path`, creating parent directories.
pub fn save_chunks(path: &Path, chunks: &[Chunk], pretty: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = if pretty {
        serde_json::to_string_pretty(chunks)?
    } else {
        serde_json::to_string(chunks)?
    };
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn load_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chunk file: {}", path.display()))?;
    let chunks = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse chunk file: {}", path.display()))?;
    Ok(chunks)
}

/// Concatenate chunk files in argument order.
pub fn merge_chunk_files<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<Chunk>> {
    let mut merged = Vec::new();
    for input in inputs {
        merged.extend(load_chunks(input.as_ref())?);
    }
    Ok(merged)
}

/// Criteria for `sgk filter`. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub subject: Option<String>,
    pub grade: Option<u32>,
    pub has_code: Option<bool>,
    pub has_formula: Option<bool>,
    pub min_tokens: Option<usize>,
    pub max_tokens: Option<usize>,
}

impl ChunkFilter {
    /// `subject` matches either the subject key or the display name.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        let lesson = &chunk.metadata.lesson;
        if let Some(subject) = &self.subject {
            if &lesson.subject_key != subject && &lesson.subject != subject {
                return false;
            }
        }
        if self.grade.is_some() && lesson.grade != self.grade {
            return false;
        }
        if self.has_code.is_some_and(|v| v != lesson.has_code) {
            return false;
        }
        if self.has_formula.is_some_and(|v| v != lesson.has_formula) {
            return false;
        }
        if self.min_tokens.is_some_and(|min| chunk.token_count < min) {
            return false;
        }
        if self.max_tokens.is_some_and(|max| chunk.token_count > max) {
            return false;
        }
        true
    }

    pub fn apply(&self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        chunks.into_iter().filter(|c| self.matches(c)).collect()
    }
}

pub fn run_merge<P: AsRef<Path>>(inputs: &[P], output: &Path, pretty: bool) -> Result<()> {
    let merged = merge_chunk_files(inputs)?;
    save_chunks(output, &merged, pretty)?;
    println!(
        "Merged {} chunks from {} files into {}",
        merged.len(),
        inputs.len(),
        output.display()
    );
    Ok(())
}

pub fn run_filter(input: &Path, output: &Path, filter: &ChunkFilter, pretty: bool) -> Result<()> {
    let chunks = load_chunks(input)?;
    let total = chunks.len();
    let kept = filter.apply(chunks);
    save_chunks(output, &kept, pretty)?;
    println!(
        "Kept {} of {} chunks, written to {}",
        kept.len(),
        total,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgk_chunker_core::models::{ChunkMetadata, LessonMetadata};
    use tempfile::TempDir;

    fn chunk(id: &str, tokens: usize, grade: u32, has_code: bool) -> Chunk {
        Chunk {
            chunk_id: id.into(),
            content: format!("Nội dung {id}"),
            token_count: tokens,
            char_count: 12,
            source_file: "sgk.txt".into(),
            lesson_index: 0,
            content_hash: String::new(),
            metadata: ChunkMetadata {
                lesson: LessonMetadata {
                    subject: "Tin học".into(),
                    subject_key: "tin_hoc".into(),
                    grade: Some(grade),
                    has_code,
                    ..LessonMetadata::default()
                },
                ..ChunkMetadata::default()
            },
        }
    }

    #[test]
    fn test_save_load_keeps_vietnamese_and_nulls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/sgk_chunks.json");
        save_chunks(&path, &[chunk("a_0000", 10, 6, false)], true).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Nội dung"));
        assert!(raw.contains("\"chapter\": null"));
        assert!(raw.contains("\"section\": null"));
        assert!(!raw.contains("prev_preview"));

        let loaded = load_chunks(&path).unwrap();
        assert_eq!(loaded, vec![chunk("a_0000", 10, 6, false)]);
    }

    #[test]
    fn test_merge_preserves_argument_order() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        save_chunks(&a, &[chunk("a_0000", 1, 6, false)], false).unwrap();
        save_chunks(&b, &[chunk("b_0000", 1, 6, false), chunk("b_0001", 1, 6, false)], false)
            .unwrap();
        let merged = merge_chunk_files(&[&b, &a]).unwrap();
        let ids: Vec<&str> = merged.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b_0000", "b_0001", "a_0000"]);
    }

    #[test]
    fn test_filter_criteria() {
        let chunks = vec![
            chunk("x_0000", 50, 6, true),
            chunk("x_0001", 300, 6, false),
            chunk("x_0002", 100, 10, true),
        ];
        let filter = ChunkFilter {
            grade: Some(6),
            max_tokens: Some(200),
            ..ChunkFilter::default()
        };
        let kept = filter.apply(chunks.clone());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk_id, "x_0000");

        let code = ChunkFilter {
            subject: Some("tin_hoc".into()),
            has_code: Some(true),
            min_tokens: Some(60),
            ..ChunkFilter::default()
        };
        let kept = code.apply(chunks);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].chunk_id, "x_0002");
    }

    #[test]
    fn test_load_reports_path() {
        let err = load_chunks(Path::new("/nonexistent/chunks.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/chunks.json"));
    }
}
