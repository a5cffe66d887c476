//! In-memory lexical index with BM25 scoring.
//!
//! Builds a term → postings map over chunk texts and ranks query matches
//! with Okapi BM25: terms frequent in a chunk but rare across the corpus
//! score highest, with length normalization so long chunks are not
//! unfairly favored.
//!
//! Tokenization (lowercase, split on non-alphanumeric) is applied
//! identically at build and query time — an asymmetric policy would
//! silently degrade recall.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::models::{Chunk, RankedResult};

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

/// Lowercase a text and split it on non-alphanumeric characters.
///
/// The same function normalizes chunk text at build time and query text
/// at query time.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

struct Posting {
    ordinal: u32,
    term_frequency: u32,
}

/// Sparse term-frequency index over a fixed chunk set.
///
/// Built once per ingestion and read-only thereafter; re-ingestion
/// rebuilds the index wholesale. Because `build` is the constructor,
/// querying an unbuilt index is unrepresentable at this layer.
pub struct LexicalIndex {
    postings: HashMap<String, Vec<Posting>>,
    /// Token count per chunk, addressed by build ordinal.
    lengths: Vec<u32>,
    /// Chunk id per build ordinal.
    chunk_ids: Vec<String>,
    avg_length: f64,
}

impl LexicalIndex {
    /// Build the index over `chunks`. The slice order defines the build
    /// ordinal used for deterministic tie-breaking.
    pub fn build(chunks: &[Chunk]) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut lengths = Vec::with_capacity(chunks.len());
        let mut chunk_ids = Vec::with_capacity(chunks.len());

        for (ordinal, chunk) in chunks.iter().enumerate() {
            let tokens = tokenize(&chunk.text);
            lengths.push(tokens.len() as u32);
            chunk_ids.push(chunk.id.clone());

            let mut counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *counts.entry(token).or_insert(0) += 1;
            }
            for (term, term_frequency) in counts {
                postings.entry(term).or_default().push(Posting {
                    ordinal: ordinal as u32,
                    term_frequency,
                });
            }
        }

        let avg_length = if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().map(|&l| f64::from(l)).sum::<f64>() / lengths.len() as f64
        };

        Self {
            postings,
            lengths,
            chunk_ids,
            avg_length,
        }
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.chunk_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }

    /// Rank up to `k` chunks by BM25 score, ties broken by ascending
    /// build ordinal.
    ///
    /// # Errors
    ///
    /// `Error::InvalidArgument` when `k == 0`.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<RankedResult>> {
        if k == 0 {
            return Err(Error::InvalidArgument(
                "lexical query k must be positive".to_string(),
            ));
        }
        if self.chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Sorted unique terms keep floating-point accumulation order fixed.
        let terms: BTreeSet<String> = tokenize(text).into_iter().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let n = self.chunk_ids.len() as f64;
        let avg = self.avg_length.max(1.0);
        let mut scores: HashMap<u32, f64> = HashMap::new();

        for term in &terms {
            let Some(plist) = self.postings.get(term) else {
                continue;
            };
            let df = plist.len() as f64;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
            for posting in plist {
                let tf = f64::from(posting.term_frequency);
                let length = f64::from(self.lengths[posting.ordinal as usize]);
                let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * length / avg);
                *scores.entry(posting.ordinal).or_insert(0.0) += idf * tf * (BM25_K1 + 1.0) / denom;
            }
        }

        let mut ranked: Vec<(u32, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(ordinal, score)| RankedResult {
                chunk_id: self.chunk_ids[ordinal as usize].clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("When can I withdraw, from a Course?"),
            vec!["when", "can", "i", "withdraw", "from", "a", "course"]
        );
        assert!(tokenize("...!?").is_empty());
    }

    #[test]
    fn test_query_zero_k_rejected() {
        let index = LexicalIndex::build(&[chunk("c1", 0, "hello")]);
        let err = index.query("hello", 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_index_returns_empty() {
        let index = LexicalIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.query("anything", 5).unwrap().is_empty());
    }

    #[test]
    fn test_rare_term_outranks_common_term() {
        let chunks = vec![
            chunk("c1", 0, "course withdrawal is allowed until week ten"),
            chunk("c2", 1, "course grades and course credit and course load"),
            chunk("c3", 2, "campus parking permits for the semester"),
        ];
        let index = LexicalIndex::build(&chunks);
        let results = index.query("course withdrawal", 3).unwrap();
        // "withdrawal" appears only in c1, so c1 must rank first.
        assert_eq!(results[0].chunk_id, "c1");
    }

    #[test]
    fn test_score_monotonic_in_term_frequency() {
        let chunks = vec![
            chunk("c1", 0, "apple banana cherry"),
            chunk("c2", 1, "apple apple banana"),
        ];
        let index = LexicalIndex::build(&chunks);
        let results = index.query("apple", 2).unwrap();
        assert_eq!(results[0].chunk_id, "c2");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_ties_broken_by_build_ordinal() {
        let chunks = vec![
            chunk("c1", 0, "alpha beta"),
            chunk("c2", 1, "alpha beta"),
            chunk("c3", 2, "alpha beta"),
        ];
        let index = LexicalIndex::build(&chunks);
        let results = index.query("alpha", 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_result_length_capped_at_k() {
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| chunk(&format!("c{i}"), i, "shared term here"))
            .collect();
        let index = LexicalIndex::build(&chunks);
        assert_eq!(index.query("shared", 4).unwrap().len(), 4);
        assert_eq!(index.query("shared", 50).unwrap().len(), 10);
    }

    #[test]
    fn test_no_matches_returns_empty() {
        let index = LexicalIndex::build(&[chunk("c1", 0, "alpha beta gamma")]);
        assert!(index.query("zeppelin", 5).unwrap().is_empty());
    }

    #[test]
    fn test_symmetric_normalization() {
        // Query casing/punctuation must not matter.
        let index = LexicalIndex::build(&[chunk("c1", 0, "Course WITHDRAWAL deadline.")]);
        let a = index.query("course withdrawal", 1).unwrap();
        let b = index.query("Course, Withdrawal!", 1).unwrap();
        assert_eq!(a[0].chunk_id, b[0].chunk_id);
        assert!((a[0].score - b[0].score).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic_ranking() {
        let chunks: Vec<Chunk> = (0..20)
            .map(|i| {
                chunk(
                    &format!("c{i}"),
                    i,
                    &format!("registration deadline week {} policy notes", i % 7),
                )
            })
            .collect();
        let index = LexicalIndex::build(&chunks);
        let first = index.query("registration deadline week", 10).unwrap();
        for _ in 0..5 {
            let again = index.query("registration deadline week", 10).unwrap();
            let a: Vec<&str> = first.iter().map(|r| r.chunk_id.as_str()).collect();
            let b: Vec<&str> = again.iter().map(|r| r.chunk_id.as_str()).collect();
            assert_eq!(a, b);
        }
    }
}
