//! Stage configuration.
//!
//! Each stage constructor takes its own config struct; [`PipelineConfig`]
//! bundles them. Nothing here is global: two pipelines with different
//! settings can run side by side.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The unit chunk size and overlap are measured in. Fixed per profile and
/// never mixed within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    Chars,
    Tokens,
}

/// Named presets for the chunking stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Token-measured, semantic boundaries and previews on.
    #[default]
    Enhanced,
    /// Character-measured fixed-size splitting.
    Legacy,
}

impl Profile {
    pub fn unit(&self) -> SizeUnit {
        match self {
            Profile::Enhanced => SizeUnit::Tokens,
            Profile::Legacy => SizeUnit::Chars,
        }
    }

    pub fn default_chunk_size(&self) -> usize {
        match self {
            Profile::Enhanced => 512,
            Profile::Legacy => 1000,
        }
    }

    pub fn default_chunk_overlap(&self) -> usize {
        match self {
            Profile::Enhanced => 50,
            Profile::Legacy => 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmenterConfig {
    /// Spans shorter than this (trimmed, in characters) are noise.
    pub min_lesson_chars: usize,
    /// More "Bài N" references than this marks a table-of-contents span.
    pub max_lesson_refs: usize,
    /// Floor applied after a table-of-contents remnant was cut off.
    pub min_cleaned_chars: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_lesson_chars: 50,
            max_lesson_refs: 3,
            min_cleaned_chars: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub unit: SizeUnit,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Split at semantic boundaries before size-splitting.
    pub semantic: bool,
}

impl ChunkerConfig {
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            unit: profile.unit(),
            chunk_size: profile.default_chunk_size(),
            chunk_overlap: profile.default_chunk_overlap(),
            semantic: profile == Profile::Enhanced,
        }
    }

    /// Overlap used when an oversized semantic piece is split: twice the
    /// configured overlap, kept below the chunk size.
    pub fn section_overlap(&self) -> usize {
        (self.chunk_overlap * 2).min(self.chunk_size.saturating_sub(1))
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self::for_profile(Profile::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnricherConfig {
    /// Attach previous/next previews.
    pub context_windows: bool,
    pub preview_chars: usize,
    pub max_key_terms: usize,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            context_windows: true,
            preview_chars: 100,
            max_key_terms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Run the text normalizer before detection.
    pub clean_text: bool,
    pub segmenter: SegmenterConfig,
    pub chunker: ChunkerConfig,
    pub enricher: EnricherConfig,
}

impl PipelineConfig {
    pub fn for_profile(profile: Profile) -> Self {
        Self {
            clean_text: true,
            segmenter: SegmenterConfig::default(),
            chunker: ChunkerConfig::for_profile(profile),
            enricher: EnricherConfig {
                context_windows: profile == Profile::Enhanced,
                ..EnricherConfig::default()
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.chunker.validate()?;
        if self.segmenter.max_lesson_refs == 0 {
            return Err(Error::InvalidConfig("max_lesson_refs must be >= 1".into()));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_profile(Profile::default())
    }
}
