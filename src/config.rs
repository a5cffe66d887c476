use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use askdocs_core::models::ChunkParams;
use askdocs_core::retrieve::FusionWeights;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_chars")]
    pub target_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_chars: default_target_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

impl ChunkingConfig {
    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams {
            target_chars: self.target_chars,
            overlap_chars: self.overlap_chars,
        }
    }
}

fn default_target_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_weight")]
    pub lexical_weight: f64,
    #[serde(default = "default_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            lexical_weight: default_weight(),
            vector_weight: default_weight(),
            top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

impl RetrievalConfig {
    pub fn fusion_weights(&self) -> FusionWeights {
        FusionWeights {
            lexical: self.lexical_weight,
            vector: self.vector_weight,
        }
    }
}

fn default_weight() -> f64 {
    0.5
}
fn default_top_k() -> usize {
    4
}
fn default_candidate_multiplier() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embed_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_embed_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embed_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key. Configurable because
    /// OpenAI-compatible endpoints ship their own key variables.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_complete_retries")]
    pub max_retries: u32,
    #[serde(default = "default_complete_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_retries: default_complete_retries(),
            timeout_secs: default_complete_timeout_secs(),
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_complete_retries() -> u32 {
    3
}
fn default_complete_timeout_secs() -> u64 {
    60
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Chunking
    if config.chunking.target_chars == 0 {
        anyhow::bail!("chunking.target_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.target_chars {
        anyhow::bail!("chunking.overlap_chars must be less than chunking.target_chars");
    }

    // Retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.candidate_multiplier < 1 {
        anyhow::bail!("retrieval.candidate_multiplier must be >= 1");
    }
    if config.retrieval.lexical_weight < 0.0 || config.retrieval.vector_weight < 0.0 {
        anyhow::bail!("retrieval weights must be non-negative");
    }
    if config.retrieval.lexical_weight + config.retrieval.vector_weight <= 0.0 {
        anyhow::bail!("retrieval.lexical_weight + retrieval.vector_weight must be positive");
    }

    // Embedding
    if config.embedding.is_enabled() {
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Completion
    if config.completion.is_enabled() && config.completion.model.is_none() {
        anyhow::bail!(
            "completion.model must be specified when provider is '{}'",
            config.completion.provider
        );
    }
    match config.completion.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
            [corpus]
            root = "./docs"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.target_chars, 1000);
        assert_eq!(config.chunking.overlap_chars, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert!((config.retrieval.lexical_weight - 0.5).abs() < 1e-9);
        assert!(!config.embedding.is_enabled());
        assert!(!config.completion.is_enabled());
    }

    #[test]
    fn test_overlap_must_be_below_target() {
        let err = parse(
            r#"
            [corpus]
            root = "./docs"
            [chunking]
            target_chars = 100
            overlap_chars = 100
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn test_weights_must_sum_positive() {
        let err = parse(
            r#"
            [corpus]
            root = "./docs"
            [retrieval]
            lexical_weight = 0.0
            vector_weight = 0.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let err = parse(
            r#"
            [corpus]
            root = "./docs"
            [embedding]
            provider = "openai"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse(
            r#"
            [corpus]
            root = "./docs"
            [completion]
            provider = "carrier-pigeon"
            model = "rock-dove-1"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("Unknown completion provider"));
    }

    #[test]
    fn test_full_config_round_trip() {
        let config = parse(
            r#"
            [corpus]
            root = "./kb"
            include_globs = ["**/*.md"]

            [chunking]
            target_chars = 800
            overlap_chars = 160

            [retrieval]
            lexical_weight = 0.4
            vector_weight = 0.6
            top_k = 6

            [embedding]
            provider = "openai"
            model = "text-embedding-3-small"
            dims = 1536

            [completion]
            provider = "openai"
            model = "deepseek-reasoner"
            base_url = "https://api.deepseek.com/v1"
            api_key_env = "DEEPSEEK_API_KEY"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_params().target_chars, 800);
        assert_eq!(config.embedding.dims, Some(1536));
        assert_eq!(config.completion.api_key_env, "DEEPSEEK_API_KEY");
        let weights = config.retrieval.fusion_weights();
        assert!((weights.lexical - 0.4).abs() < 1e-9);
    }
}
