//! # askdocs CLI (`ask`)
//!
//! The `ask` binary answers natural-language questions against a private
//! document corpus. Indexes are built in memory at startup from the
//! configured corpus directory.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ask ingest` | Build the indexes and print corpus statistics |
//! | `ask search "<query>"` | Inspect retrieval results with scores |
//! | `ask query "<question>"` | Answer a single question |
//! | `ask chat` | Interactive session-threaded chat loop |
//!
//! ## Examples
//!
//! ```bash
//! # Check what the corpus looks like after chunking
//! ask ingest --config ./config/askdocs.toml
//!
//! # Lexical-only retrieval works without any provider configured
//! ask search "withdrawal deadline" --mode lexical
//!
//! # Hybrid retrieval and answering need [embedding] and [completion]
//! ask search "withdrawal deadline" --mode hybrid
//! ask query "When can I withdraw from a course?"
//! ask chat
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use askdocs::config;
use askdocs::engine::Engine;

/// askdocs — a hybrid-retrieval question answering engine for private
/// document corpora.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file describing the corpus, chunking, retrieval, and providers.
#[derive(Parser)]
#[command(
    name = "ask",
    about = "askdocs — hybrid-retrieval question answering over a private document corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/askdocs.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the indexes and print corpus statistics.
    ///
    /// Loads the corpus, chunks every document, builds the lexical index
    /// (and the vector index when embeddings are configured), and prints
    /// counts plus a corpus fingerprint for reproducibility checks.
    Ingest,

    /// Search the indexed corpus and print ranked chunks.
    ///
    /// Lexical mode needs no providers; semantic and hybrid modes require
    /// an embedding provider.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `lexical` (BM25), `semantic` (cosine), or
        /// `hybrid` (weighted fusion).
        #[arg(long, default_value = "hybrid")]
        mode: String,

        /// Maximum number of results to return.
        #[arg(long, default_value_t = 8)]
        limit: usize,
    },

    /// Answer a single question against the corpus.
    Query {
        /// The question to answer.
        question: String,

        /// Session identifier; repeated calls with the same id share
        /// conversational memory within one process.
        #[arg(long)]
        session: Option<String>,
    },

    /// Interactive chat loop with session-threaded memory.
    ///
    /// Each line is answered through the conversational chain; follow-up
    /// questions are condensed against the session history before
    /// retrieval. `exit`, `quit`, or EOF ends the loop.
    Chat {
        /// Session identifier. Defaults to a fresh id per invocation.
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let mut engine = Engine::from_config(cfg)?;

    match cli.command {
        Commands::Ingest => {
            let report = engine.ingest().await?;
            println!("ingest");
            println!("  documents: {}", report.documents);
            println!("  chunks: {}", report.chunks);
            println!("  embedded: {}", report.embedded);
            println!("  fingerprint: {}", report.fingerprint);
            println!("ok");
        }
        Commands::Search { query, mode, limit } => {
            engine.ingest().await?;
            let hits = engine.search(&query, &mode, limit).await?;
            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                println!("{}. [{:.3}] {}", i + 1, hit.score, hit.source_path);
                println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " "));
                println!("    chunk: {}", hit.chunk_id);
                println!();
            }
        }
        Commands::Query { question, session } => {
            engine.ingest().await?;
            let session_id = session.unwrap_or_else(new_session_id);
            let turn = engine.answer(&session_id, &question).await?;
            println!("{}", turn.text);
        }
        Commands::Chat { session } => {
            let report = engine.ingest().await?;
            let session_id = session.unwrap_or_else(new_session_id);
            println!(
                "askdocs chat — {} documents indexed, session '{}'",
                report.documents, session_id
            );
            println!("Type a question, or 'exit' to quit.");
            run_chat_loop(&engine, &session_id).await?;
        }
    }

    Ok(())
}

fn new_session_id() -> String {
    format!("cli-{}", Uuid::new_v4())
}

async fn run_chat_loop(engine: &Engine, session_id: &str) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        match engine.answer(session_id, question).await {
            Ok(turn) => println!("{}\n", turn.text),
            Err(e) => eprintln!("error: {e:#}"),
        }
    }
    Ok(())
}
