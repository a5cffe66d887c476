//! Core data models for the retrieval and assembly pipeline.
//!
//! These types represent the documents, chunks, ranked results, and
//! conversation turns that flow between the chunker, the two indexes,
//! the hybrid retriever, and the conversational chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ingested source document. Immutable once created.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub source_path: String,
    pub raw_text: String,
}

/// Chunking parameters, fixed for one corpus so both indexes are built
/// from the same chunk set.
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    /// Target chunk length in characters. Must be positive.
    pub target_chars: usize,
    /// Overlap between consecutive chunks in characters. Must be less
    /// than `target_chars`.
    pub overlap_chars: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            target_chars: 1000,
            overlap_chars: 200,
        }
    }
}

/// A contiguous span of a document, the unit of retrieval.
///
/// `char_start`/`char_end` are char offsets into the parent document's
/// text (`[start, end)`); `sequence` is the chunk's index within its
/// document. Chunks are immutable once created.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub sequence: usize,
    pub char_start: usize,
    pub char_end: usize,
    pub text: String,
    /// SHA-256 of the chunk text, used for reproducibility checks.
    pub hash: String,
}

/// A scored candidate returned from one index. Score semantics differ by
/// source (BM25 vs cosine similarity) and are normalized before fusion.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub chunk_id: String,
    pub score: f64,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat-completion APIs and prompt formatting.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of a session's conversation log. Append-only; ordering is
/// insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTurn {
    pub session_id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Everything assembled for one completion call: the standalone query,
/// the retrieved chunks in ranked order, and the session history.
/// Constructed per request and discarded after the call.
#[derive(Debug, Clone)]
pub struct GroundedContext {
    pub query: String,
    pub chunks: Vec<Chunk>,
    pub history: Vec<SessionTurn>,
}
