//! Collaborator traits consumed by the engine.
//!
//! Embedding and completion are external services as far as this crate is
//! concerned: the traits below are the whole contract. Concrete
//! implementations (HTTP providers, test doubles) live in the application
//! crate and in test modules.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::SessionTurn;

/// Produces fixed-length float vectors for texts.
///
/// Implementations must be deterministic for a fixed model version and
/// return one vector per input text, in input order. Batching, retries,
/// and rate limits are the implementation's concern. Failures map to
/// [`Error::Retrieval`](crate::Error::Retrieval).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// One fully-shaped completion call: system instructions (including any
/// grounding context), prior conversation turns, and the user message.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub history: Vec<SessionTurn>,
    pub user: String,
}

/// Produces an answer text for a completion request.
///
/// Any non-success — provider outage, rate limiting, malformed output —
/// maps to [`Error::CompletionUnavailable`](crate::Error::CompletionUnavailable);
/// callers must never see a fabricated answer in place of a failure.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Run one completion call.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}
