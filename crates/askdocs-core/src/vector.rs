//! In-memory vector index with cosine-similarity search.
//!
//! Stores one embedding per chunk, produced by an external
//! [`EmbeddingProvider`] — the index never computes embeddings itself.
//! Search is brute-force cosine similarity over all stored vectors,
//! ranked descending with ties broken by build ordinal.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::models::{Chunk, RankedResult};
use crate::providers::EmbeddingProvider;

/// A stored embedding for one chunk.
#[derive(Debug, Clone)]
pub struct VectorEntry {
    pub chunk_id: String,
    pub vector: Vec<f32>,
}

/// Dense index over a fixed chunk set. Built once per ingestion and
/// read-only thereafter; entries are stored in build-ordinal order.
#[derive(Debug)]
pub struct VectorIndex {
    entries: Vec<VectorEntry>,
    dims: usize,
}

impl VectorIndex {
    /// Embed every chunk and store the vectors.
    ///
    /// An empty chunk set builds an empty index (not an error). All
    /// vectors in one index must share the dimension fixed by the
    /// provider's first vector.
    ///
    /// # Errors
    ///
    /// `Error::EmbeddingDimensionMismatch` when the provider returns
    /// vectors of inconsistent length; `Error::Retrieval` when the
    /// provider fails or returns the wrong number of vectors.
    pub async fn build(chunks: &[Chunk], embedder: &dyn EmbeddingProvider) -> Result<Self> {
        if chunks.is_empty() {
            return Ok(Self {
                entries: Vec::new(),
                dims: 0,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::Retrieval(format!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let dims = vectors[0].len();
        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter().zip(vectors) {
            if vector.len() != dims {
                return Err(Error::EmbeddingDimensionMismatch {
                    expected: dims,
                    actual: vector.len(),
                });
            }
            entries.push(VectorEntry {
                chunk_id: chunk.id.clone(),
                vector,
            });
        }

        Ok(Self { entries, dims })
    }

    /// Embedding dimensionality of this index (0 when empty).
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rank up to `k` chunks by cosine similarity to the embedded query,
    /// ties broken by ascending build ordinal.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` when `k == 0`; `Error::Retrieval` when
    /// the query embedding fails.
    pub async fn query(
        &self,
        text: &str,
        embedder: &dyn EmbeddingProvider,
        k: usize,
    ) -> Result<Vec<RankedResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument(
                "vector query k must be positive".to_string(),
            ));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_text = [text.to_string()];
        let query_vec = embedder
            .embed(&query_text)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Retrieval("empty embedding response for query".to_string()))?;

        let mut ranked: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(ordinal, entry)| {
                (
                    ordinal,
                    f64::from(cosine_similarity(&query_vec, &entry.vector)),
                )
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(ordinal, score)| RankedResult {
                chunk_id: self.entries[ordinal].chunk_id.clone(),
                score,
            })
            .collect())
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; returns `0.0` for empty vectors,
/// zero-magnitude vectors, or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn chunk(id: &str, sequence: usize, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            document_id: "doc".to_string(),
            sequence,
            char_start: 0,
            char_end: text.chars().count(),
            text: text.to_string(),
            hash: String::new(),
        }
    }

    /// Embeds "a"/"b"/"c" onto fixed axes; anything else gets a diagonal.
    struct AxisEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbeddings {
        fn model_name(&self) -> &str {
            "axis-test"
        }
        fn dims(&self) -> usize {
            3
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| match t.as_str() {
                    "a" => vec![1.0, 0.0, 0.0],
                    "b" => vec![0.0, 1.0, 0.0],
                    "c" => vec![0.0, 0.0, 1.0],
                    _ => vec![1.0, 1.0, 0.0],
                })
                .collect())
        }
    }

    /// Returns a different dimension for every call.
    struct RaggedEmbeddings;

    #[async_trait]
    impl EmbeddingProvider for RaggedEmbeddings {
        fn model_name(&self) -> &str {
            "ragged-test"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, _)| vec![0.5; i + 1])
                .collect())
        }
    }

    #[tokio::test]
    async fn test_empty_chunk_set_builds_empty_index() {
        let index = VectorIndex::build(&[], &AxisEmbeddings).await.unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dims(), 0);
        assert!(index.query("a", &AxisEmbeddings, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_build() {
        let chunks = vec![chunk("c1", 0, "a"), chunk("c2", 1, "b")];
        let err = VectorIndex::build(&chunks, &RaggedEmbeddings)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::EmbeddingDimensionMismatch {
                expected: 1,
                actual: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_most_similar_ranks_first() {
        let chunks = vec![chunk("c1", 0, "a"), chunk("c2", 1, "b"), chunk("c3", 2, "c")];
        let index = VectorIndex::build(&chunks, &AxisEmbeddings).await.unwrap();
        // Query embeds to the a+b diagonal: equidistant from c1 and c2,
        // orthogonal to c3.
        let results = index.query("query", &AxisEmbeddings, 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk_id, "c1");
        assert_eq!(results[1].chunk_id, "c2");
        assert_eq!(results[2].chunk_id, "c3");
        assert!((results[0].score - results[1].score).abs() < 1e-9);
        assert!(results[1].score > results[2].score);
    }

    #[tokio::test]
    async fn test_query_zero_k_rejected() {
        let index = VectorIndex::build(&[chunk("c1", 0, "a")], &AxisEmbeddings)
            .await
            .unwrap();
        let err = index.query("a", &AxisEmbeddings, 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_truncates_to_k() {
        let chunks = vec![chunk("c1", 0, "a"), chunk("c2", 1, "b"), chunk("c3", 2, "c")];
        let index = VectorIndex::build(&chunks, &AxisEmbeddings).await.unwrap();
        assert_eq!(index.query("a", &AxisEmbeddings, 2).await.unwrap().len(), 2);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
