//! End-to-end processing of one document.
//!
//! ```text
//! raw text ─► normalize ─► detect ─► resolve ─┬─► chapter map ─┐
//!                                             └─► segment ─────┴─► per lesson:
//!                                                   extract ─► chunk ─► enrich
//! ```
//!
//! The pipeline owns every stage, built once from a [`PipelineConfig`], and
//! is `Sync`: one instance can serve many documents in parallel since all
//! per-document state lives on the stack of [`Pipeline::process`].

use sha2::{Digest, Sha256};
use tracing::info;

use crate::chapters::ChapterMapper;
use crate::chunker::LessonChunker;
use crate::config::PipelineConfig;
use crate::detect::MarkerDetector;
use crate::enrich::ContextEnricher;
use crate::error::Result;
use crate::metadata::MetadataExtractor;
use crate::models::{
    ChapterMap, Chunk, ChunkDraft, DocumentContext, LessonSpan, MarkerKind, ResolvedMarker,
    SegmentationMode,
};
use crate::normalize::TextNormalizer;
use crate::resolve::MarkerResolver;
use crate::segment::LessonSegmenter;

/// Identity of the source a document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// File stem, used as the chunk id prefix.
    pub stem: String,
    /// File name recorded on every chunk.
    pub file_name: String,
}

/// Everything produced for one document.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    /// The text all span offsets refer to.
    pub normalized_text: String,
    pub markers: Vec<ResolvedMarker>,
    pub chapters: ChapterMap,
    pub spans: Vec<LessonSpan>,
    pub mode: SegmentationMode,
    pub chunks: Vec<Chunk>,
}

pub struct Pipeline {
    config: PipelineConfig,
    normalizer: TextNormalizer,
    detector: MarkerDetector,
    resolver: MarkerResolver,
    mapper: ChapterMapper,
    segmenter: LessonSegmenter,
    extractor: MetadataExtractor,
    chunker: LessonChunker,
    enricher: ContextEnricher,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            normalizer: TextNormalizer::new()?,
            detector: MarkerDetector::new()?,
            resolver: MarkerResolver::new(),
            mapper: ChapterMapper::new(),
            segmenter: LessonSegmenter::new(config.segmenter.clone())?,
            extractor: MetadataExtractor::new()?,
            chunker: LessonChunker::new(config.chunker.clone())?,
            enricher: ContextEnricher::new(config.enricher.clone())?,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn process(&self, source: &SourceRef, text: &str, context: &DocumentContext) -> ProcessedDocument {
        let normalized = if self.config.clean_text {
            self.normalizer.normalize(text)
        } else {
            text.to_string()
        };

        let markers = self.resolver.resolve(self.detector.detect(&normalized));
        let chapters = self.mapper.map(&markers);
        let segmentation = self.segmenter.segment(&normalized, &markers);
        let sections: Vec<ResolvedMarker> = markers
            .iter()
            .filter(|m| m.kind == MarkerKind::Section)
            .cloned()
            .collect();

        let mut chunks = Vec::new();
        for (lesson_index, span) in segmentation.spans.iter().enumerate() {
            let inside: Vec<ResolvedMarker> = sections
                .iter()
                .filter(|s| s.position >= span.start && s.position < span.end)
                .cloned()
                .collect();
            let lesson = self.extractor.extract(span, context, &chapters, &inside);
            let drafts = self.chunker.chunk(span, &lesson, &inside);
            for draft in self.enricher.enrich(drafts) {
                let sequence = chunks.len();
                chunks.push(stamp(source, lesson_index, sequence, draft));
            }
        }

        info!(
            source = %source.file_name,
            lessons = segmentation.spans.len(),
            chunks = chunks.len(),
            mode = %segmentation.mode,
            "document processed"
        );

        ProcessedDocument {
            normalized_text: normalized,
            markers,
            chapters,
            spans: segmentation.spans,
            mode: segmentation.mode,
            chunks,
        }
    }
}

/// `{stem}_{sequence:04}`.
pub fn chunk_id(stem: &str, sequence: usize) -> String {
    format!("{stem}_{sequence:04}")
}

/// Hex SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn stamp(source: &SourceRef, lesson_index: usize, sequence: usize, draft: ChunkDraft) -> Chunk {
    Chunk {
        chunk_id: chunk_id(&source.stem, sequence),
        content_hash: content_hash(&draft.content),
        content: draft.content,
        token_count: draft.token_count,
        char_count: draft.char_count,
        source_file: source.file_name.clone(),
        lesson_index,
        metadata: draft.metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> SourceRef {
        SourceRef {
            stem: "sgk_tin_hoc_6".into(),
            file_name: "sgk_tin_hoc_6.txt".into(),
        }
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("sgk_tin_hoc_6", 7), "sgk_tin_hoc_6_0007");
        assert_eq!(chunk_id("x", 12345), "x_12345");
    }

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("").len(), 64);
    }

    #[test]
    fn test_ids_sequential_across_lessons() {
        let body = "Thông tin là những gì đem lại hiểu biết cho con người. ".repeat(4);
        let text = format!("BÀI 1. MỘT\n{body}\nBÀI 2. HAI\n{body}");
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let doc = pipeline.process(&source(), &text, &DocumentContext::default());
        assert_eq!(doc.mode, SegmentationMode::Strict);
        let ids: Vec<String> = doc.chunks.iter().map(|c| c.chunk_id.clone()).collect();
        let expected: Vec<String> = (0..ids.len()).map(|i| chunk_id("sgk_tin_hoc_6", i)).collect();
        assert_eq!(ids, expected);
        assert_eq!(doc.chunks.first().unwrap().lesson_index, 0);
        assert_eq!(doc.chunks.last().unwrap().lesson_index, 1);
        assert!(doc.chunks.iter().all(|c| c.source_file == "sgk_tin_hoc_6.txt"));
    }

    #[test]
    fn test_empty_document_has_no_chunks() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let doc = pipeline.process(&source(), "   ", &DocumentContext::default());
        assert!(doc.spans.is_empty());
        assert!(doc.chunks.is_empty());
    }
}
