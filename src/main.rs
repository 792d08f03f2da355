//! # sgk-chunker CLI (`sgk`)
//!
//! ## Usage
//!
//! ```bash
//! sgk --config ./config/sgk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sgk process <input>` | Chunk a file or every matching file under a directory |
//! | `sgk inspect <files..>` | Print statistics for chunk files |
//! | `sgk filter <file>` | Keep the chunks matching metadata criteria |
//! | `sgk merge <files..>` | Concatenate chunk files |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sgk_chunker::config;
use sgk_chunker::export::{self, ChunkFilter};
use sgk_chunker::ingest;
use sgk_chunker::stats;
use sgk_chunker_core::Profile;

/// sgk-chunker: lesson-aware chunking for Vietnamese textbook text.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "sgk",
    about = "Lesson-aware chunking for Vietnamese K-12 textbooks",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sgk.toml")]
    config: PathBuf,

    /// Log filter, e.g. `info` or `sgk_chunker_core=debug`. `RUST_LOG` wins
    /// when set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk textbook text files.
    ///
    /// Writes `<stem>_chunks.json` per document and a `manifest.json` for
    /// the run into the output directory.
    Process {
        /// A text file or a directory to walk.
        input: PathBuf,

        /// Output directory. Overrides `[output].dir`.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Chunking profile: `enhanced` or `legacy`.
        #[arg(long, value_parser = parse_profile)]
        profile: Option<Profile>,

        #[arg(long)]
        chunk_size: Option<usize>,

        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Disable semantic-boundary chunking.
        #[arg(long)]
        no_semantic: bool,

        /// Show lesson and chunk counts without writing files.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print statistics for chunk files.
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Write the chunks of a file that match all given criteria.
    Filter {
        file: PathBuf,

        #[arg(long, short)]
        output: PathBuf,

        /// Subject key or name.
        #[arg(long)]
        subject: Option<String>,

        #[arg(long)]
        grade: Option<u32>,

        #[arg(long)]
        has_code: Option<bool>,

        #[arg(long)]
        has_formula: Option<bool>,

        #[arg(long)]
        min_tokens: Option<usize>,

        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Concatenate chunk files in argument order.
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long, short)]
        output: PathBuf,
    },
}

fn parse_profile(s: &str) -> Result<Profile, String> {
    match s {
        "enhanced" => Ok(Profile::Enhanced),
        "legacy" => Ok(Profile::Legacy),
        other => Err(format!("unknown profile '{other}' (expected enhanced or legacy)")),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Process {
            input,
            output,
            profile,
            chunk_size,
            chunk_overlap,
            no_semantic,
            dry_run,
        } => {
            if let Some(profile) = profile {
                cfg.chunking.profile = profile;
            }
            if chunk_size.is_some() {
                cfg.chunking.chunk_size = chunk_size;
            }
            if chunk_overlap.is_some() {
                cfg.chunking.chunk_overlap = chunk_overlap;
            }
            if no_semantic {
                cfg.chunking.semantic = Some(false);
            }
            let output_dir = output.unwrap_or_else(|| cfg.output.dir.clone());
            let manifest = ingest::run_process(&cfg, &input, &output_dir, dry_run)?;
            if manifest.succeeded == 0 {
                anyhow::bail!("no document could be processed");
            }
        }
        Commands::Inspect { files } => {
            stats::run_inspect(&files)?;
        }
        Commands::Filter {
            file,
            output,
            subject,
            grade,
            has_code,
            has_formula,
            min_tokens,
            max_tokens,
        } => {
            let filter = ChunkFilter {
                subject,
                grade,
                has_code,
                has_formula,
                min_tokens,
                max_tokens,
            };
            export::run_filter(&file, &output, &filter, cfg.output.pretty)?;
        }
        Commands::Merge { files, output } => {
            export::run_merge(&files, &output, cfg.output.pretty)?;
        }
    }

    Ok(())
}
