//! Batch processing orchestration.
//!
//! Coordinates the full run: discover inputs → decode → pipeline → write
//! `<stem>_chunks.json` → write `manifest.json`. Documents are independent,
//! so they are processed in parallel with `rayon`; a failing document is
//! recorded in the manifest and never aborts the batch.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use sgk_chunker_core::{Pipeline, Profile, SegmentationMode};

use crate::config::Config;
use crate::export::save_chunks;
use crate::source::{load_document, scan_inputs, unique_stems, SubjectTable};

/// Outcome for one input file.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub lessons: usize,
    pub chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<SegmentationMode>,
    pub replacements: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-run record written next to the chunk files.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub profile: Profile,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub semantic: bool,
    pub dry_run: bool,
    pub succeeded: usize,
    pub failed: usize,
    pub total_chunks: usize,
    pub documents: Vec<DocumentReport>,
}

pub const MANIFEST_FILE: &str = "manifest.json";

/// Name of the chunk file written for a source with this stem.
pub fn chunk_file_name(stem: &str) -> String {
    format!("{stem}_chunks.json")
}

pub fn run_process(
    config: &Config,
    input: &Path,
    output_dir: &Path,
    dry_run: bool,
) -> Result<Manifest> {
    let started_at = Utc::now();
    let run_id = Uuid::new_v4().to_string();
    let pipeline_config = config.pipeline();
    let pipeline = Pipeline::new(pipeline_config.clone())?;
    let subjects = SubjectTable::new(&config.subjects);

    let paths = scan_inputs(input, &config.source)?;
    if paths.is_empty() {
        bail!("No input files found under {}", input.display());
    }
    info!(run_id = %run_id, files = paths.len(), "processing batch");

    let stems = unique_stems(input, &paths);
    let documents: Vec<DocumentReport> = paths
        .par_iter()
        .zip(stems.par_iter())
        .map(|(path, stem)| {
            process_file(config, &pipeline, &subjects, path, stem, output_dir, dry_run)
                .unwrap_or_else(|e| {
                    warn!(path = %path.display(), error = %format!("{e:#}"), "document skipped");
                    DocumentReport {
                        file: path.display().to_string(),
                        output: None,
                        lessons: 0,
                        chunks: 0,
                        segmentation: None,
                        replacements: 0,
                        error: Some(format!("{e:#}")),
                    }
                })
        })
        .collect();

    let failed = documents.iter().filter(|d| d.error.is_some()).count();
    let manifest = Manifest {
        run_id,
        started_at,
        finished_at: Utc::now(),
        profile: config.chunking.profile,
        chunk_size: pipeline_config.chunker.chunk_size,
        chunk_overlap: pipeline_config.chunker.chunk_overlap,
        semantic: pipeline_config.chunker.semantic,
        dry_run,
        succeeded: documents.len() - failed,
        failed,
        total_chunks: documents.iter().map(|d| d.chunks).sum(),
        documents,
    };

    if !dry_run {
        let path = output_dir.join(MANIFEST_FILE);
        std::fs::create_dir_all(output_dir)?;
        std::fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
    }

    print_summary(&manifest, output_dir);
    Ok(manifest)
}

fn process_file(
    config: &Config,
    pipeline: &Pipeline,
    subjects: &SubjectTable,
    path: &Path,
    stem: &str,
    output_dir: &Path,
    dry_run: bool,
) -> Result<DocumentReport> {
    let mut document = load_document(path, &config.source)?;
    document.source.stem = stem.to_string();
    let context = subjects.context(&document.source.file_name);
    let processed = pipeline.process(&document.source, &document.text, &context);

    let output = if dry_run {
        None
    } else {
        let out: PathBuf = output_dir.join(chunk_file_name(&document.source.stem));
        save_chunks(&out, &processed.chunks, config.output.pretty)?;
        Some(out.display().to_string())
    };

    Ok(DocumentReport {
        file: path.display().to_string(),
        output,
        lessons: processed.spans.len(),
        chunks: processed.chunks.len(),
        segmentation: Some(processed.mode),
        replacements: document.replacements,
        error: None,
    })
}

fn print_summary(manifest: &Manifest, output_dir: &Path) {
    if manifest.dry_run {
        println!("process (dry-run)");
    } else {
        println!("process -> {}", output_dir.display());
    }
    for doc in &manifest.documents {
        match (&doc.error, doc.segmentation) {
            (Some(error), _) => println!("  {}  FAILED: {}", doc.file, error),
            (None, Some(mode)) => println!(
                "  {}  lessons: {}  chunks: {}  mode: {}",
                doc.file, doc.lessons, doc.chunks, mode
            ),
            (None, None) => println!("  {}", doc.file),
        }
    }
    println!("  documents: {} ok, {} failed", manifest.succeeded, manifest.failed);
    println!("  chunks: {}", manifest.total_chunks);
    println!("  run id: {}", manifest.run_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const LESSONS: &str = "CHỦ ĐỀ 1. MÁY TÍNH VÀ CỘNG ĐỒNG\n\
BÀI 1. THÔNG TIN VÀ DỮ LIỆU\n\
Thông tin là những gì đem lại hiểu biết cho con người về thế giới xung quanh.\n\
Dữ liệu là thông tin được ghi lại trên vật mang tin.\n\
BÀI 2. XỬ LÝ THÔNG TIN\n\
Máy tính thu nhận, lưu trữ, xử lý và truyền thông tin một cách nhanh chóng.\n\
Con người dùng máy tính để hỗ trợ công việc hằng ngày.\n";

    #[test]
    fn test_batch_writes_chunks_and_manifest() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("sgk_tin_hoc_6.txt"), LESSONS).unwrap();
        fs::write(input.path().join("broken.txt"), [0xFFu8; 32]).unwrap();

        let manifest = run_process(&Config::default(), input.path(), output.path(), false).unwrap();
        assert_eq!(manifest.succeeded, 1);
        assert_eq!(manifest.failed, 1);
        assert!(manifest.documents[0].error.is_some());

        let chunks = crate::export::load_chunks(&output.path().join("sgk_tin_hoc_6_chunks.json"))
            .unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].chunk_id, "sgk_tin_hoc_6_0000");
        assert_eq!(chunks[0].metadata.lesson.grade, Some(6));
        assert_eq!(chunks[0].metadata.lesson.subject_key, "tin_hoc");
        assert!(output.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn test_same_stem_in_subdirectories_kept_apart() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        for dir in ["lop6", "lop7"] {
            fs::create_dir_all(input.path().join(dir)).unwrap();
            fs::write(input.path().join(dir).join("sgk_tin_hoc.txt"), LESSONS).unwrap();
        }

        let manifest = run_process(&Config::default(), input.path(), output.path(), false).unwrap();
        assert_eq!(manifest.succeeded, 2);

        let mut on_disk = 0;
        let mut ids = std::collections::HashSet::new();
        for stem in ["lop6_sgk_tin_hoc", "lop7_sgk_tin_hoc"] {
            let chunks =
                crate::export::load_chunks(&output.path().join(chunk_file_name(stem))).unwrap();
            assert!(chunks[0].chunk_id.starts_with(stem));
            on_disk += chunks.len();
            ids.extend(chunks.into_iter().map(|c| c.chunk_id));
        }
        assert_eq!(on_disk, manifest.total_chunks);
        assert_eq!(ids.len(), manifest.total_chunks);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("sgk_tin_hoc_6.txt"), LESSONS).unwrap();

        let manifest = run_process(&Config::default(), input.path(), output.path(), true).unwrap();
        assert_eq!(manifest.succeeded, 1);
        assert!(manifest.total_chunks > 0);
        assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_empty_input_dir_is_error() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        assert!(run_process(&Config::default(), input.path(), output.path(), true).is_err());
    }
}
