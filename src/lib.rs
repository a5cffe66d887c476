//! # askdocs
//!
//! **A hybrid-retrieval question answering engine for private document
//! corpora.**
//!
//! askdocs chunks a directory of plain-text documents, indexes the chunks
//! both lexically (BM25) and semantically (embedding vectors), fuses the
//! two rankings, and threads the retrieved context plus per-session
//! conversation history into an OpenAI-compatible chat-completion
//! endpoint.
//!
//! ## Data flow
//!
//! 1. The **corpus loader** ([`corpus`]) walks the configured root and
//!    produces documents in deterministic path order.
//! 2. The **chunker** (`askdocs_core::chunk`) splits documents into
//!    fixed-size overlapping chunks.
//! 3. Chunks are indexed in the **BM25 lexical index** and embedded into
//!    the **vector index** via the provider in [`embedding`].
//! 4. The **hybrid retriever** (`askdocs_core::retrieve`) min-max
//!    normalizes both rankings and fuses them with configurable weights.
//! 5. The **conversational chain** (`askdocs_core::chain`) condenses
//!    follow-ups against session history, assembles the grounding
//!    context, and calls the completion provider in [`completion`].
//! 6. The **engine** ([`engine`]) wires all of it from a TOML config
//!    ([`config`]) and backs the `ask` CLI.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`corpus`] | Filesystem corpus loader |
//! | [`embedding`] | OpenAI embedding provider |
//! | [`completion`] | OpenAI-compatible chat-completion provider |
//! | [`engine`] | Engine assembly: ingest, search, answer |

pub mod completion;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod engine;
