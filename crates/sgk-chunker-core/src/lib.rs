//! # sgk-chunker core
//!
//! Turns the plain text of a Vietnamese K-12 textbook into retrieval-ready
//! chunks: heading detection, marker resolution, chapter mapping, lesson
//! segmentation, metadata extraction, chunking and enrichment.
//!
//! This crate does no filesystem I/O and holds no process-wide state. Every
//! stage is built from an explicit config, and [`pipeline::Pipeline`] wires
//! them together for one document at a time.

pub mod chapters;
pub mod chunker;
pub mod config;
pub mod detect;
pub mod embedding;
pub mod enrich;
pub mod error;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod record;
pub mod resolve;
pub mod segment;
pub mod splitter;
pub mod store;
pub mod tokens;

pub use config::{PipelineConfig, Profile, SizeUnit};
pub use error::{Error, Result};
pub use models::{Chunk, DocumentContext, SegmentationMode};
pub use pipeline::{Pipeline, ProcessedDocument, SourceRef};
