//! Engine assembly: config → providers → corpus → indexes → chain.
//!
//! The engine owns the built indexes (in memory, rebuilt per process —
//! index persistence is delegated to whatever store a deployment puts
//! behind the providers) and exposes the three operations the CLI needs:
//! `ingest`, `search`, and `answer`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::info;

use askdocs_core::chain::ConversationChain;
use askdocs_core::chunk::chunk_document;
use askdocs_core::lexical::LexicalIndex;
use askdocs_core::models::{Document, SessionTurn};
use askdocs_core::providers::{CompletionProvider, EmbeddingProvider};
use askdocs_core::retrieve::{build_indexes, ChunkCatalog, HybridRetriever};
use askdocs_core::session::SessionStore;
use askdocs_core::Error;

use crate::completion::OpenAiCompletions;
use crate::config::Config;
use crate::corpus;
use crate::embedding::OpenAiEmbeddings;

/// Counts reported after an ingest run.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub embedded: usize,
    /// SHA-256 over the corpus content, for reproducibility checks.
    pub fingerprint: String,
}

/// One row of `search` output.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub source_path: String,
    pub score: f64,
    pub snippet: String,
}

struct EngineState {
    catalog: Arc<ChunkCatalog>,
    lexical: Arc<LexicalIndex>,
    retriever: Option<HybridRetriever>,
    /// Document id → source path, for result display.
    paths: HashMap<String, String>,
}

pub struct Engine {
    config: Config,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    completions: Option<Arc<dyn CompletionProvider>>,
    sessions: Arc<SessionStore>,
    state: Option<EngineState>,
}

impl Engine {
    /// Build an engine with providers constructed from the configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let embedder: Option<Arc<dyn EmbeddingProvider>> = if config.embedding.is_enabled() {
            Some(Arc::new(OpenAiEmbeddings::new(&config.embedding)?))
        } else {
            None
        };
        let completions: Option<Arc<dyn CompletionProvider>> = if config.completion.is_enabled() {
            Some(Arc::new(OpenAiCompletions::new(&config.completion)?))
        } else {
            None
        };
        Ok(Self::with_providers(config, embedder, completions))
    }

    /// Build an engine around caller-supplied providers. This is the
    /// seam integration tests use to inject scripted collaborators.
    pub fn with_providers(
        config: Config,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        completions: Option<Arc<dyn CompletionProvider>>,
    ) -> Self {
        Self {
            config,
            embedder,
            completions,
            sessions: Arc::new(SessionStore::new()),
            state: None,
        }
    }

    /// Load the corpus and build the indexes. The lexical index is always
    /// built; the vector index (and with it hybrid retrieval) requires an
    /// embedding provider.
    pub async fn ingest(&mut self) -> Result<IngestReport> {
        let documents = corpus::load_corpus(&self.config)?;
        let params = self.config.chunking.chunk_params();
        let fingerprint = corpus_fingerprint(&documents);
        let paths: HashMap<String, String> = documents
            .iter()
            .map(|d| (d.id.clone(), d.source_path.clone()))
            .collect();

        let state = match &self.embedder {
            Some(embedder) => {
                let (catalog, lexical, vector) =
                    build_indexes(&documents, &params, embedder.as_ref()).await?;
                let catalog = Arc::new(catalog);
                let lexical = Arc::new(lexical);
                let retriever = HybridRetriever::new(
                    Arc::clone(&catalog),
                    Arc::clone(&lexical),
                    Arc::new(vector),
                    Arc::clone(embedder),
                )
                .with_weights(self.config.retrieval.fusion_weights())
                .with_candidate_multiplier(self.config.retrieval.candidate_multiplier);
                EngineState {
                    catalog,
                    lexical,
                    retriever: Some(retriever),
                    paths,
                }
            }
            None => {
                let mut chunks = Vec::new();
                for document in &documents {
                    chunks.extend(chunk_document(document, &params)?);
                }
                let lexical = Arc::new(LexicalIndex::build(&chunks));
                EngineState {
                    catalog: Arc::new(ChunkCatalog::new(chunks)),
                    lexical,
                    retriever: None,
                    paths,
                }
            }
        };

        let report = IngestReport {
            documents: documents.len(),
            chunks: state.catalog.len(),
            embedded: if self.embedder.is_some() {
                state.catalog.len()
            } else {
                0
            },
            fingerprint,
        };
        info!(
            documents = report.documents,
            chunks = report.chunks,
            embedded = report.embedded,
            "corpus indexed"
        );

        self.state = Some(state);
        Ok(report)
    }

    /// Query the indexes directly. Modes: `lexical`, `semantic`, `hybrid`.
    pub async fn search(&self, query: &str, mode: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let state = self
            .state
            .as_ref()
            .ok_or(Error::NotInitialized("search"))?;

        let ranked = match mode {
            "lexical" => state.lexical.query(query, limit)?,
            "semantic" | "hybrid" => {
                let retriever = state.retriever.as_ref().ok_or_else(|| {
                    Error::Configuration(format!(
                        "search mode '{mode}' requires an embedding provider; set [embedding] in config"
                    ))
                })?;
                match mode {
                    "semantic" => {
                        let semantic_only = retriever.clone().with_weights(
                            askdocs_core::retrieve::FusionWeights {
                                lexical: 0.0,
                                vector: 1.0,
                            },
                        );
                        semantic_only.rank(query, limit).await?
                    }
                    _ => retriever.rank(query, limit).await?,
                }
            }
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown search mode: {other}. Use lexical, semantic, or hybrid."
                ))
                .into())
            }
        };

        Ok(ranked
            .into_iter()
            .filter_map(|result| {
                state.catalog.get(&result.chunk_id).map(|chunk| SearchHit {
                    chunk_id: result.chunk_id.clone(),
                    source_path: state
                        .paths
                        .get(&chunk.document_id)
                        .cloned()
                        .unwrap_or_else(|| chunk.document_id.clone()),
                    score: result.score,
                    snippet: chunk.text.chars().take(240).collect(),
                })
            })
            .collect())
    }

    /// Answer a question within a session via the conversational chain.
    pub async fn answer(&self, session_id: &str, utterance: &str) -> Result<SessionTurn> {
        let chain = self.chain()?;
        Ok(chain.answer(session_id, utterance).await?)
    }

    /// Session history, for display.
    pub fn history(&self, session_id: &str) -> Vec<SessionTurn> {
        self.sessions.history(session_id)
    }

    fn chain(&self) -> Result<ConversationChain> {
        let state = self
            .state
            .as_ref()
            .ok_or(Error::NotInitialized("answer"))?;
        let retriever = state.retriever.as_ref().ok_or_else(|| {
            Error::Configuration(
                "answering requires an embedding provider; set [embedding] in config".to_string(),
            )
        })?;
        let completions = self.completions.as_ref().ok_or_else(|| {
            Error::Configuration(
                "answering requires a completion provider; set [completion] in config".to_string(),
            )
        })?;

        Ok(ConversationChain::new(
            Arc::new(retriever.clone()),
            Arc::clone(completions),
            Arc::clone(&self.sessions),
            self.config.retrieval.top_k,
        ))
    }
}

/// SHA-256 over every document's path and text, in corpus order.
fn corpus_fingerprint(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for document in documents {
        hasher.update(document.source_path.as_bytes());
        hasher.update([0]);
        hasher.update(document.raw_text.as_bytes());
        hasher.update([0]);
    }
    format!("{:x}", hasher.finalize())
}
