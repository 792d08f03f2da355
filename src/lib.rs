//! # sgk-chunker
//!
//! Batch front end for [`sgk_chunker_core`]: turns a directory of Vietnamese
//! textbook text files into per-document chunk files ready for embedding.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────────────┐
//! │   source    │──▶│  core pipeline   │──▶│     export       │
//! │ walk+decode │   │ detect → chunk   │   │ <stem>_chunks.json│
//! └─────────────┘   └──────────────────┘   └────────┬─────────┘
//!                                                   │
//!                                     ┌─────────────┴──────────┐
//!                                     ▼                        ▼
//!                               ┌──────────┐            ┌────────────┐
//!                               │ inspect  │            │ filter /   │
//!                               │ (stats)  │            │ merge      │
//!                               └──────────┘            └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sgk process data/raw                 # chunk every .txt under data/raw
//! sgk inspect data/processed/*_chunks.json
//! sgk filter data/processed/sgk_tin_hoc_6_chunks.json --has-code true --output code.json
//! sgk merge data/processed/*_chunks.json --output all_chunks.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`source`] | Input discovery, decoding, subject/grade inference |
//! | [`ingest`] | Parallel batch processing and run manifest |
//! | [`export`] | Chunk file save/load/merge/filter |
//! | [`stats`] | Chunk file statistics |

pub mod config;
pub mod export;
pub mod ingest;
pub mod source;
pub mod stats;
