//! Hybrid retrieval: rank fusion over the lexical and vector indexes.
//!
//! # Fusion algorithm
//!
//! 1. Fetch `candidate_multiplier × k` candidates from each index for the
//!    same query.
//! 2. Min-max normalize each source's scores to `[0, 1]` over that
//!    source's own candidate set (all-equal sets normalize to 1.0).
//! 3. Union the candidates; a chunk absent from one source scores 0 for
//!    that source — it is never dropped outright.
//! 4. Fused score = `w_lex × lexical + w_vec × vector`.
//! 5. Sort by fused score descending, ties by ascending build ordinal.
//! 6. Truncate to `k`.
//!
//! The ordering is a deterministic total order: fixed corpus, parameters,
//! and query give the same ranked ids on every call, which keeps tests
//! reproducible and prompt construction stable run to run.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::chunk::chunk_document;
use crate::error::{Error, Result};
use crate::lexical::LexicalIndex;
use crate::models::{Chunk, ChunkParams, Document, RankedResult};
use crate::providers::EmbeddingProvider;
use crate::vector::VectorIndex;

/// The single chunk set both indexes reference by id.
///
/// Owns the chunks in build-ordinal order (documents in input order,
/// chunks in sequence order) and resolves chunk id → ordinal for
/// deterministic tie-breaking.
pub struct ChunkCatalog {
    chunks: Vec<Chunk>,
    by_id: HashMap<String, usize>,
}

impl ChunkCatalog {
    pub fn new(chunks: Vec<Chunk>) -> Self {
        let by_id = chunks
            .iter()
            .enumerate()
            .map(|(ordinal, chunk)| (chunk.id.clone(), ordinal))
            .collect();
        Self { chunks, by_id }
    }

    pub fn get(&self, chunk_id: &str) -> Option<&Chunk> {
        self.by_id.get(chunk_id).map(|&ordinal| &self.chunks[ordinal])
    }

    /// Build ordinal of a chunk — its position in the corpus-ordered
    /// chunk slice handed to the index builders.
    pub fn ordinal(&self, chunk_id: &str) -> Option<usize> {
        self.by_id.get(chunk_id).copied()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Per-source fusion weights. The weights must sum to a positive number;
/// they are not required to sum to 1.
#[derive(Debug, Clone, Copy)]
pub struct FusionWeights {
    pub lexical: f64,
    pub vector: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            lexical: 0.5,
            vector: 0.5,
        }
    }
}

impl FusionWeights {
    /// # Errors
    ///
    /// `Error::InvalidArgument` when either weight is negative or not
    /// finite, or the sum is not positive.
    pub fn validate(&self) -> Result<()> {
        if !self.lexical.is_finite() || !self.vector.is_finite() {
            return Err(Error::InvalidArgument(
                "fusion weights must be finite".to_string(),
            ));
        }
        if self.lexical < 0.0 || self.vector < 0.0 {
            return Err(Error::InvalidArgument(
                "fusion weights must be non-negative".to_string(),
            ));
        }
        if self.lexical + self.vector <= 0.0 {
            return Err(Error::InvalidArgument(
                "fusion weights must sum to a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

/// One-shot batch build of the chunk catalog and both indexes from a
/// document set.
///
/// # Errors
///
/// Propagates chunker configuration errors and vector-index build
/// failures ([`Error::EmbeddingDimensionMismatch`], [`Error::Retrieval`]).
pub async fn build_indexes(
    documents: &[Document],
    params: &ChunkParams,
    embedder: &dyn EmbeddingProvider,
) -> Result<(ChunkCatalog, LexicalIndex, VectorIndex)> {
    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(chunk_document(document, params)?);
    }

    let lexical = LexicalIndex::build(&chunks);
    let vector = VectorIndex::build(&chunks, embedder).await?;
    debug!(
        documents = documents.len(),
        chunks = chunks.len(),
        dims = vector.dims(),
        "indexes built"
    );

    Ok((ChunkCatalog::new(chunks), lexical, vector))
}

/// Queries both indexes and fuses the rankings into one ordered result.
#[derive(Clone)]
pub struct HybridRetriever {
    catalog: Arc<ChunkCatalog>,
    lexical: Arc<LexicalIndex>,
    vector: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    weights: FusionWeights,
    candidate_multiplier: usize,
}

impl HybridRetriever {
    pub fn new(
        catalog: Arc<ChunkCatalog>,
        lexical: Arc<LexicalIndex>,
        vector: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            catalog,
            lexical,
            vector,
            embedder,
            weights: FusionWeights::default(),
            candidate_multiplier: 2,
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Over-fetch factor: each index is asked for `multiplier × k`
    /// candidates so fusion has enough to work with.
    #[must_use]
    pub fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier.max(1);
        self
    }

    /// Fused ranking of up to `k` chunks, with scores.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` for `k == 0` or bad weights;
    /// `Error::Retrieval` when the query embedding fails.
    pub async fn rank(&self, query: &str, k: usize) -> Result<Vec<RankedResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument(
                "retrieve k must be positive".to_string(),
            ));
        }
        self.weights.validate()?;

        let fetch = k.saturating_mul(self.candidate_multiplier);
        let lexical_candidates = self.lexical.query(query, fetch)?;
        let vector_candidates = if self.vector.is_empty() {
            Vec::new()
        } else {
            self.vector
                .query(query, self.embedder.as_ref(), fetch)
                .await?
        };
        debug!(
            lexical = lexical_candidates.len(),
            vector = vector_candidates.len(),
            "retrieval candidates"
        );

        if lexical_candidates.is_empty() && vector_candidates.is_empty() {
            return Ok(Vec::new());
        }

        let lexical_norm = normalize_scores(&lexical_candidates);
        let vector_norm = normalize_scores(&vector_candidates);

        // Union by chunk id; a chunk missing from one source scores 0 there.
        let mut fused: HashMap<&str, f64> = HashMap::new();
        for (candidate, norm) in lexical_candidates.iter().zip(&lexical_norm) {
            *fused.entry(candidate.chunk_id.as_str()).or_insert(0.0) +=
                self.weights.lexical * norm;
        }
        for (candidate, norm) in vector_candidates.iter().zip(&vector_norm) {
            *fused.entry(candidate.chunk_id.as_str()).or_insert(0.0) +=
                self.weights.vector * norm;
        }

        let mut ranked: Vec<(usize, &str, f64)> = fused
            .into_iter()
            .filter_map(|(chunk_id, score)| {
                self.catalog
                    .ordinal(chunk_id)
                    .map(|ordinal| (ordinal, chunk_id, score))
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(_, chunk_id, score)| RankedResult {
                chunk_id: chunk_id.to_string(),
                score,
            })
            .collect())
    }

    /// Fused ranking of up to `k` chunks, resolved to the chunks
    /// themselves in ranked order.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        let ranked = self.rank(query, k).await?;
        Ok(ranked
            .iter()
            .filter_map(|r| self.catalog.get(&r.chunk_id).cloned())
            .collect())
    }

    pub fn catalog(&self) -> &ChunkCatalog {
        &self.catalog
    }
}

/// Min-max normalize raw scores to `[0.0, 1.0]` over one source's
/// candidate set. If all scores are equal, they normalize to `1.0`.
pub fn normalize_scores(candidates: &[RankedResult]) -> Vec<f64> {
    if candidates.is_empty() {
        return Vec::new();
    }

    let s_min = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::INFINITY, f64::min);
    let s_max = candidates
        .iter()
        .map(|c| c.score)
        .fold(f64::NEG_INFINITY, f64::max);

    candidates
        .iter()
        .map(|c| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (c.score - s_min) / (s_max - s_min)
            }
        })
        .collect()
}
