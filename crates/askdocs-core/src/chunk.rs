//! Fixed-size overlapping text chunker.
//!
//! Splits a document into chunks of a target character length with a
//! configurable overlap between consecutive chunks. The split policy is
//! character-count based and must stay fixed for one corpus, since the
//! lexical and vector indexes are built from the same chunk set.
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Chunk, ChunkParams, Document};

/// Split a document into overlapping chunks.
///
/// Chunk *i+1* starts exactly `target_chars - overlap_chars` characters
/// after chunk *i*; the final chunk is the first one whose end reaches the
/// end of the document and may be shorter. A document shorter than
/// `target_chars` (including an empty one) yields exactly one chunk
/// spanning the whole document.
///
/// Boundaries are char offsets, so multi-byte text never splits inside a
/// code point. Identical input and parameters produce identical boundaries
/// on every run.
///
/// # Errors
///
/// `Error::Configuration` when `target_chars == 0` or
/// `overlap_chars >= target_chars`.
pub fn chunk_document(document: &Document, params: &ChunkParams) -> Result<Vec<Chunk>> {
    if params.target_chars == 0 {
        return Err(Error::Configuration(
            "chunking target_chars must be positive".to_string(),
        ));
    }
    if params.overlap_chars >= params.target_chars {
        return Err(Error::Configuration(format!(
            "chunking overlap_chars ({}) must be less than target_chars ({})",
            params.overlap_chars, params.target_chars
        )));
    }

    let stride = params.target_chars - params.overlap_chars;

    // Byte offset of every char boundary, so char offsets slice safely.
    let byte_offsets: Vec<usize> = document.raw_text.char_indices().map(|(b, _)| b).collect();
    let total_chars = byte_offsets.len();
    let byte_at = |char_idx: usize| {
        byte_offsets
            .get(char_idx)
            .copied()
            .unwrap_or(document.raw_text.len())
    };

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + params.target_chars).min(total_chars);
        let text = &document.raw_text[byte_at(start)..byte_at(end)];
        chunks.push(make_chunk(document, chunks.len(), start, end, text));
        if end >= total_chars {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

fn make_chunk(
    document: &Document,
    sequence: usize,
    char_start: usize,
    char_end: usize,
    text: &str,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document.id.clone(),
        sequence,
        char_start,
        char_end,
        text: text.to_string(),
        hash,
    }
}
