use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use sgk_chunker_core::config::{ChunkerConfig, EnricherConfig, PipelineConfig, SegmenterConfig};
use sgk_chunker_core::Profile;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Extra entries for the subject lookup, tried before the built-in table.
    #[serde(default)]
    pub subjects: Vec<SubjectEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub profile: Profile,
    /// Defaults per profile when absent.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub chunk_overlap: Option<usize>,
    #[serde(default)]
    pub semantic: Option<bool>,
    #[serde(default)]
    pub context_windows: Option<bool>,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            chunk_size: None,
            chunk_overlap: None,
            semantic: None,
            context_windows: None,
            preview_chars: default_preview_chars(),
        }
    }
}

fn default_preview_chars() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct SegmentationConfig {
    #[serde(default = "default_min_lesson_chars")]
    pub min_lesson_chars: usize,
    #[serde(default = "default_max_lesson_refs")]
    pub max_lesson_refs: usize,
    #[serde(default = "default_true")]
    pub clean_text: bool,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            min_lesson_chars: default_min_lesson_chars(),
            max_lesson_refs: default_max_lesson_refs(),
            clean_text: true,
        }
    }
}

fn default_min_lesson_chars() -> usize {
    50
}
fn default_max_lesson_refs() -> usize {
    3
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Share of U+FFFD characters above which a decoded file is rejected.
    #[serde(default = "default_max_replacement_ratio")]
    pub max_replacement_ratio: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            max_replacement_ratio: default_max_replacement_ratio(),
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string()]
}
fn default_max_replacement_ratio() -> f64 {
    0.05
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            pretty: true,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/processed")
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SubjectEntry {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Config {
    /// Stage configuration for the core pipeline.
    pub fn pipeline(&self) -> PipelineConfig {
        let chunking = &self.chunking;
        let profile = chunking.profile;
        let defaults = ChunkerConfig::for_profile(profile);
        PipelineConfig {
            clean_text: self.segmentation.clean_text,
            segmenter: SegmenterConfig {
                min_lesson_chars: self.segmentation.min_lesson_chars,
                max_lesson_refs: self.segmentation.max_lesson_refs,
                ..SegmenterConfig::default()
            },
            chunker: ChunkerConfig {
                unit: profile.unit(),
                chunk_size: chunking.chunk_size.unwrap_or(defaults.chunk_size),
                chunk_overlap: chunking.chunk_overlap.unwrap_or(defaults.chunk_overlap),
                semantic: chunking.semantic.unwrap_or(defaults.semantic),
            },
            enricher: EnricherConfig {
                context_windows: chunking
                    .context_windows
                    .unwrap_or(profile == Profile::Enhanced),
                preview_chars: chunking.preview_chars,
                ..EnricherConfig::default()
            },
        }
    }

    fn validate(&self) -> Result<()> {
        let pipeline = self.pipeline();
        if pipeline.chunker.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if pipeline.chunker.chunk_overlap >= pipeline.chunker.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be less than chunking.chunk_size ({})",
                pipeline.chunker.chunk_overlap,
                pipeline.chunker.chunk_size
            );
        }
        if self.segmentation.max_lesson_refs < 1 {
            anyhow::bail!("segmentation.max_lesson_refs must be >= 1");
        }
        if !(0.0..=1.0).contains(&self.source.max_replacement_ratio) {
            anyhow::bail!("source.max_replacement_ratio must be in [0.0, 1.0]");
        }
        for subject in &self.subjects {
            if subject.key.trim().is_empty() {
                anyhow::bail!("subjects: key must not be empty (name '{}')", subject.name);
            }
        }
        Ok(())
    }
}

/// Load configuration from `path`, or defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
