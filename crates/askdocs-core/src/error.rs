//! Error taxonomy for the retrieval and assembly pipeline.
//!
//! Every failure surfaced by this crate is one of the kinds below, so
//! callers can tell a bad parameter from a transient collaborator outage
//! without parsing message strings. The application layer may wrap these
//! with additional context but must not collapse the kinds.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure kinds produced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad chunking or fusion parameters. Fatal — fix the configuration
    /// before retrying.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Bad call-site parameter (for example `k == 0`). Fatal for the call,
    /// never retried automatically.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation that needs built indexes ran before ingestion.
    #[error("{0} called before indexes were built")]
    NotInitialized(&'static str),

    /// The embedding provider returned vectors of inconsistent length
    /// within one index build. Corpus-level inconsistency, surfaces at
    /// build time.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    /// A transient failure while producing retrieval candidates
    /// (embedding call, index query). Eligible for caller-driven retry;
    /// the engine itself never retries silently.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    /// The completion provider failed or returned a malformed response.
    /// The caller sees this explicitly — the fixed cannot-answer reply is
    /// never substituted for a provider outage.
    #[error("completion provider unavailable: {0}")]
    CompletionUnavailable(String),
}
