//! Chunk file statistics.
//!
//! Summarizes what a processing run produced: chunk and lesson counts, the
//! token distribution, and how many chunks are complete sections, oversized,
//! or missing a chapter. Used by `sgk inspect` as a quick sanity check after
//! processing a batch.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;

use sgk_chunker_core::Chunk;

use crate::export::load_chunks;

#[derive(Debug, Clone, PartialEq)]
pub struct FileStats {
    pub chunks: usize,
    pub lessons: usize,
    pub min_tokens: usize,
    pub avg_tokens: f64,
    pub median_tokens: f64,
    pub max_tokens: usize,
    pub complete_sections: usize,
    pub oversized: usize,
    pub without_chapter: usize,
}

impl FileStats {
    pub fn from_chunks(chunks: &[Chunk]) -> Self {
        let mut tokens: Vec<usize> = chunks.iter().map(|c| c.token_count).collect();
        tokens.sort_unstable();
        let lessons: BTreeSet<usize> = chunks.iter().map(|c| c.lesson_index).collect();

        Self {
            chunks: chunks.len(),
            lessons: lessons.len(),
            min_tokens: tokens.first().copied().unwrap_or(0),
            avg_tokens: if tokens.is_empty() {
                0.0
            } else {
                tokens.iter().sum::<usize>() as f64 / tokens.len() as f64
            },
            median_tokens: median(&tokens),
            max_tokens: tokens.last().copied().unwrap_or(0),
            complete_sections: chunks
                .iter()
                .filter(|c| c.metadata.is_complete_section)
                .count(),
            oversized: chunks.iter().filter(|c| c.metadata.is_oversized).count(),
            without_chapter: chunks
                .iter()
                .filter(|c| c.metadata.lesson.chapter.is_none())
                .count(),
        }
    }

    /// Percentage of chunks that are complete sections.
    pub fn complete_share(&self) -> f64 {
        if self.chunks == 0 {
            0.0
        } else {
            self.complete_sections as f64 * 100.0 / self.chunks as f64
        }
    }
}

/// `sorted` must be ascending.
fn median(sorted: &[usize]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2] as f64,
        n => (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0,
    }
}

/// Run the inspect command: print a summary per chunk file.
pub fn run_inspect<P: AsRef<Path>>(files: &[P]) -> Result<()> {
    println!(
        "  {:<32} {:>7} {:>7} {:>6} {:>8} {:>8} {:>6} {:>9} {:>9} {:>10}",
        "FILE", "CHUNKS", "LESSONS", "MIN", "AVG", "MEDIAN", "MAX", "COMPLETE", "OVERSIZE", "NO CHAPTER"
    );
    println!("  {}", "-".repeat(108));
    for file in files {
        let path = file.as_ref();
        let stats = FileStats::from_chunks(&load_chunks(path)?);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        println!(
            "  {:<32} {:>7} {:>7} {:>6} {:>8.1} {:>8.1} {:>6} {:>8.0}% {:>9} {:>10}",
            name,
            stats.chunks,
            stats.lessons,
            stats.min_tokens,
            stats.avg_tokens,
            stats.median_tokens,
            stats.max_tokens,
            stats.complete_share(),
            stats.oversized,
            stats.without_chapter
        );
    }
    Ok(())
}
