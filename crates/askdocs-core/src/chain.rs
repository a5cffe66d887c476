//! Session-threaded conversational retrieval chain.
//!
//! Each `answer` call walks one state machine:
//!
//! 1. **Condense** — when the session has history, rewrite the new
//!    utterance into a standalone query via the completion provider.
//!    An empty history skips the rewrite (and the provider call).
//! 2. **Retrieve** — hybrid retrieval with the standalone query.
//! 3. **Assemble** — grounding context from the retrieved chunks in
//!    ranked order. No retrieved chunks short-circuits to the fixed
//!    cannot-answer reply without calling the provider.
//! 4. **Complete** — system instructions + context, prior turns, and the
//!    standalone query go to the completion provider.
//! 5. **Record** — the user turn and the assistant turn are appended as
//!    one pair, so the next call's condense step sees this exchange.
//!
//! History is only written in step 5: a failure anywhere earlier leaves
//! the session log exactly as it was.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Chunk, GroundedContext, SessionTurn};
use crate::providers::{CompletionProvider, CompletionRequest};
use crate::retrieve::HybridRetriever;
use crate::session::SessionStore;

/// Rewrites a follow-up into a self-contained query for retrieval.
const CONDENSE_SYSTEM_PROMPT: &str = "Given a conversation and a follow-up question, \
rephrase the follow-up into a standalone question that can be understood without the \
conversation, in its original language. Return only the standalone question.";

/// Grounding instructions for the answering call. The retrieved context
/// is appended below these instructions.
const ANSWER_SYSTEM_PROMPT: &str = "You are an assistant answering questions about a \
private document collection.\n\
Answer using only the context below. If the context does not contain the information \
needed, reply exactly: \"I cannot answer that based on the indexed documents.\" Do not \
invent policies or facts that are not in the context.";

/// The fixed reply used when retrieval finds nothing relevant. Reserved
/// strictly for that case — provider outages surface as errors instead.
pub const NO_CONTEXT_ANSWER: &str = "I cannot answer that based on the indexed documents.";

/// The conversational chain: hybrid retriever + completion provider +
/// session memory.
pub struct ConversationChain {
    retriever: Arc<HybridRetriever>,
    completions: Arc<dyn CompletionProvider>,
    sessions: Arc<SessionStore>,
    top_k: usize,
}

impl ConversationChain {
    pub fn new(
        retriever: Arc<HybridRetriever>,
        completions: Arc<dyn CompletionProvider>,
        sessions: Arc<SessionStore>,
        top_k: usize,
    ) -> Self {
        Self {
            retriever,
            completions,
            sessions,
            top_k,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer one user utterance within a session.
    ///
    /// Calls against the same session are serialized for their full
    /// duration; unrelated sessions proceed concurrently.
    ///
    /// # Errors
    ///
    /// `Error::Retrieval` for embedding/index failures,
    /// `Error::CompletionUnavailable` for provider failures — in both
    /// cases the session history is left untouched.
    pub async fn answer(&self, session_id: &str, user_utterance: &str) -> Result<SessionTurn> {
        let session = self.sessions.session(session_id);
        let _serialized = session.acquire().await;

        let history = session.history();

        let standalone_query = if history.is_empty() {
            user_utterance.to_string()
        } else {
            self.condense(&history, user_utterance).await?
        };
        debug!(session = session_id, query = %standalone_query, "standalone query");

        let chunks = self.retriever.retrieve(&standalone_query, self.top_k).await?;
        if chunks.is_empty() {
            debug!(session = session_id, "no relevant context, fixed reply");
            return Ok(session.record_exchange(user_utterance, NO_CONTEXT_ANSWER));
        }

        let grounded = GroundedContext {
            query: standalone_query,
            chunks,
            history,
        };

        let request = CompletionRequest {
            system: format!(
                "{ANSWER_SYSTEM_PROMPT}\n\nContext:\n{}",
                format_context(&grounded.chunks)
            ),
            history: grounded.history.clone(),
            user: grounded.query.clone(),
        };
        let answer = self.completions.complete(&request).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(Error::CompletionUnavailable(
                "provider returned an empty answer".to_string(),
            ));
        }

        Ok(session.record_exchange(user_utterance, answer))
    }

    /// Rewrite history + utterance into a standalone retrieval query.
    async fn condense(&self, history: &[SessionTurn], question: &str) -> Result<String> {
        let request = CompletionRequest {
            system: CONDENSE_SYSTEM_PROMPT.to_string(),
            history: Vec::new(),
            user: format!(
                "Conversation:\n{}\n\nFollow-up question: {question}\n\nStandalone question:",
                format_history(history)
            ),
        };
        let rewritten = self.completions.complete(&request).await?;
        let rewritten = rewritten.trim();
        // An empty rewrite falls back to the original utterance rather
        // than issuing an empty retrieval query.
        if rewritten.is_empty() {
            Ok(question.to_string())
        } else {
            Ok(rewritten.to_string())
        }
    }
}

/// Format conversation turns for the condense prompt.
fn format_history(turns: &[SessionTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", capitalized_role(turn), turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

fn capitalized_role(turn: &SessionTurn) -> &'static str {
    match turn.role {
        crate::models::Role::User => "User",
        crate::models::Role::Assistant => "Assistant",
    }
}

/// Concatenate retrieved chunks, in ranked order, into the grounding
/// context block.
fn format_context(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}
