//! In-memory [`VectorIndex`] for tests.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`; search is
//! brute-force cosine similarity over every stored vector.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;

use super::{IndexHit, IndexRecord, VectorIndex};

pub struct InMemoryIndex {
    records: RwLock<HashMap<String, IndexRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, id: &str) -> Result<Option<IndexRecord>> {
        Ok(self.read()?.get(id).cloned())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, IndexRecord>>> {
        self.records.read().map_err(|_| anyhow!("index lock poisoned"))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[IndexRecord]) -> Result<()> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow!("index lock poisoned"))?;
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<IndexHit>> {
        let stored = self.read()?;
        let mut hits: Vec<IndexHit> = stored
            .values()
            .map(|r| IndexHit {
                id: r.id.clone(),
                score: cosine_similarity(query, &r.vector),
                content: r.content.clone(),
                metadata: r.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingProvider;
    use crate::models::{Chunk, ChunkMetadata};
    use crate::store::publish_chunks;
    use serde_json::Map;

    fn record(id: &str, vector: Vec<f32>) -> IndexRecord {
        IndexRecord {
            id: id.into(),
            content: format!("nội dung {id}"),
            metadata: Map::new(),
            vector,
        }
    }

    /// Embeds a text as (char count, ascii count, 1).
    struct CountingProvider;

    impl EmbeddingProvider for CountingProvider {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            3
        }
        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    vec![
                        t.chars().count() as f32,
                        t.chars().filter(char::is_ascii).count() as f32,
                        1.0,
                    ]
                })
                .collect())
        }
    }

    struct BrokenProvider;

    impl EmbeddingProvider for BrokenProvider {
        fn model_name(&self) -> &str {
            "broken"
        }
        fn dims(&self) -> usize {
            1
        }
        fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk {
            chunk_id: id.into(),
            content: content.into(),
            token_count: 1,
            char_count: content.chars().count(),
            source_file: "sgk.txt".into(),
            lesson_index: 0,
            content_hash: String::new(),
            metadata: ChunkMetadata::default(),
        }
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record("a", vec![1.0, 0.0]),
                record("b", vec![0.7, 0.7]),
                record("c", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        let hits = index.search(&[1.0, 0.1], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = InMemoryIndex::new();
        index.upsert(&[record("a", vec![1.0])]).await.unwrap();
        index.upsert(&[record("a", vec![2.0])]).await.unwrap();
        assert_eq!(index.len().unwrap(), 1);
        assert_eq!(index.get("a").unwrap().unwrap().vector, vec![2.0]);
    }

    #[tokio::test]
    async fn test_publish_chunks_in_batches() {
        let index = InMemoryIndex::new();
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| chunk(&format!("sgk_{i:04}"), &"Bài học ".repeat(i + 1)))
            .collect();
        let written = publish_chunks(&CountingProvider, &index, &chunks, 2)
            .await
            .unwrap();
        assert_eq!(written, 5);
        assert_eq!(index.len().unwrap(), 5);
        let stored = index.get("sgk_0003").unwrap().unwrap();
        assert_eq!(stored.metadata["chunk_id"], "sgk_0003");
        assert_eq!(stored.vector.len(), CountingProvider.dims());
    }

    #[tokio::test]
    async fn test_publish_rejects_vector_count_mismatch() {
        let index = InMemoryIndex::new();
        let chunks = vec![chunk("x_0000", "một"), chunk("x_0001", "hai")];
        let result = publish_chunks(&BrokenProvider, &index, &chunks, 10).await;
        assert!(result.is_err());
        assert!(index.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_an_error_everywhere() {
        let index = std::sync::Arc::new(InMemoryIndex::new());
        let writer = index.clone();
        let _ = std::thread::spawn(move || {
            let _guard = writer.records.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        assert!(index.len().is_err());
        assert!(index.is_empty().is_err());
        assert!(index.get("a").is_err());
        assert!(index.search(&[1.0], 1).await.is_err());
        assert!(index.upsert(&[record("a", vec![1.0])]).await.is_err());
    }
}
