//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the narrow contract the chunker needs from a
//! downstream vector database: write records, query by vector. Backends are
//! pluggable; [`memory::InMemoryIndex`] is the brute-force reference used in
//! tests.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorIndex::upsert) | Insert or replace records by id |
//! | [`search`](VectorIndex::search) | Top-`limit` records by cosine similarity |

pub mod memory;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::models::Chunk;
use crate::record::index_metadata;

/// One chunk as written to a vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRecord {
    pub id: String,
    pub content: String,
    /// Flat scalar metadata, see [`index_metadata`].
    pub metadata: Map<String, Value>,
    pub vector: Vec<f32>,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Map<String, Value>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert records, replacing any with the same id.
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()>;

    /// Highest-scoring records first.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<IndexHit>>;
}

/// Embed chunks in batches of `batch_size` and upsert them.
///
/// Returns the number of records written.
pub async fn publish_chunks(
    provider: &dyn EmbeddingProvider,
    index: &dyn VectorIndex,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<usize> {
    let mut written = 0;
    for batch in chunks.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = provider.embed(&texts)?;
        if vectors.len() != batch.len() {
            bail!(
                "embedding provider {} returned {} vectors for {} texts",
                provider.model_name(),
                vectors.len(),
                batch.len()
            );
        }
        let records: Vec<IndexRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexRecord {
                id: chunk.chunk_id.clone(),
                content: chunk.content.clone(),
                metadata: index_metadata(chunk),
                vector,
            })
            .collect();
        index.upsert(&records).await?;
        written += records.len();
        debug!(written, total = chunks.len(), "published batch");
    }
    Ok(written)
}
