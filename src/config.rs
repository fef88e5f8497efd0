//! Configuration parsing and validation.
//!
//! Memory Harness is configured via a TOML file (default `./config/mh.toml`).
//! Every section and field has a default, so an empty file is a valid
//! configuration.
//!
//! # Example
//!
//! ```toml
//! [memory]
//! dir = "./memory"
//! retention_days = 30
//!
//! [watcher]
//! debounce_ms = 500
//! ignore_initial = true
//! include_globs = ["**/*.md"]
//!
//! [db]
//! path = "./data/mh.sqlite"
//!
//! [chunking]
//! max_tokens = 700
//!
//! [retrieval]
//! k1 = 1.5
//! b = 0.75
//! rrf_k = 60.0
//! vector_weight = 0.6
//! text_weight = 0.4
//! final_limit = 10
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use memory_harness_core::bm25::Bm25Params;
use memory_harness_core::fusion::FusionWeights;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Config {
    /// All defaults. Useful for tests and ad-hoc tooling.
    pub fn minimal() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    /// Root of the memory tree (`MEMORY.md`, `daily/`).
    #[serde(default = "default_memory_dir")]
    pub dir: PathBuf,
    /// Age in days after which `mh cleanup` removes daily notes.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Per-message truncation when extracting conversations.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dir: default_memory_dir(),
            retention_days: default_retention_days(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

fn default_memory_dir() -> PathBuf {
    PathBuf::from("./memory")
}
fn default_retention_days() -> u32 {
    30
}
fn default_max_message_chars() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatcherConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Skip `add` events for files that exist when watching starts.
    #[serde(default = "default_true")]
    pub ignore_initial: bool,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            ignore_initial: true,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_debounce_ms() -> u64 {
    500
}
fn default_true() -> bool {
    true
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/mh.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    700
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    #[serde(default = "default_text_weight")]
    pub text_weight: f64,
    /// Candidates requested from each retriever before fusion.
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_vector_timeout_ms")]
    pub vector_timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            rrf_k: default_rrf_k(),
            vector_weight: default_vector_weight(),
            text_weight: default_text_weight(),
            candidate_k: default_candidate_k(),
            final_limit: default_final_limit(),
            vector_timeout_ms: default_vector_timeout_ms(),
        }
    }
}

impl RetrievalConfig {
    pub fn bm25_params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.k1,
            b: self.b,
        }
    }

    pub fn fusion_weights(&self) -> FusionWeights {
        FusionWeights {
            vector_weight: self.vector_weight,
            text_weight: self.text_weight,
            rrf_k: self.rrf_k,
        }
    }
}

fn default_k1() -> f64 {
    1.5
}
fn default_b() -> f64 {
    0.75
}
fn default_rrf_k() -> f64 {
    60.0
}
fn default_vector_weight() -> f64 {
    0.6
}
fn default_text_weight() -> f64 {
    0.4
}
fn default_candidate_k() -> usize {
    50
}
fn default_final_limit() -> usize {
    10
}
fn default_vector_timeout_ms() -> u64 {
    5000
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
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Override for OpenAI-compatible gateways.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }
    if config.watcher.debounce_ms == 0 {
        bail!("watcher.debounce_ms must be > 0");
    }

    let r = &config.retrieval;
    if r.final_limit < 1 {
        bail!("retrieval.final_limit must be >= 1");
    }
    for (name, value) in [
        ("k1", r.k1),
        ("b", r.b),
        ("rrf_k", r.rrf_k),
        ("vector_weight", r.vector_weight),
        ("text_weight", r.text_weight),
    ] {
        if !value.is_finite() {
            bail!("retrieval.{} must be a finite number", name);
        }
    }
    if r.k1 < 0.0 {
        bail!("retrieval.k1 must be >= 0");
    }
    if !(0.0..=1.0).contains(&r.b) {
        bail!("retrieval.b must be in [0.0, 1.0]");
    }
    if r.vector_weight < 0.0 || r.text_weight < 0.0 {
        bail!("retrieval weights must be >= 0");
    }
    if r.rrf_k <= 0.0 {
        bail!("retrieval.rrf_k must be > 0");
    }

    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.memory.dir, PathBuf::from("./memory"));
        assert_eq!(config.watcher.debounce_ms, 500);
        assert!(config.watcher.ignore_initial);
        assert_eq!(config.watcher.include_globs, vec!["**/*.md"]);
        assert_eq!(config.retrieval.k1, 1.5);
        assert_eq!(config.retrieval.b, 0.75);
        assert_eq!(config.retrieval.rrf_k, 60.0);
        assert_eq!(config.retrieval.fusion_weights(), FusionWeights::default());
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_partial_sections() {
        let config =
            parse("[memory]\ndir = \"/tmp/mem\"\n\n[retrieval]\nvector_weight = 1.0\n").unwrap();
        assert_eq!(config.memory.dir, PathBuf::from("/tmp/mem"));
        assert_eq!(config.memory.retention_days, 30);
        assert_eq!(config.retrieval.vector_weight, 1.0);
        assert_eq!(config.retrieval.text_weight, 0.4);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(parse("[chunking]\nmax_tokens = 0\n").is_err());
        assert!(parse("[retrieval]\nb = 1.5\n").is_err());
        assert!(parse("[retrieval]\nrrf_k = 0.0\n").is_err());
        assert!(parse("[retrieval]\ntext_weight = -0.1\n").is_err());
        assert!(parse("[retrieval]\nfinal_limit = 0\n").is_err());
        assert!(parse("[watcher]\ndebounce_ms = 0\n").is_err());
        assert!(parse("[embedding]\nprovider = \"local\"\n").is_err());
    }

    #[test]
    fn test_validation_rejects_non_finite_retrieval_values() {
        for src in [
            "[retrieval]\nk1 = nan\n",
            "[retrieval]\nvector_weight = nan\n",
            "[retrieval]\ntext_weight = nan\n",
            "[retrieval]\nrrf_k = inf\n",
        ] {
            let err = parse(src).unwrap_err();
            assert!(err.to_string().contains("finite"), "{src}: {err}");
        }
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\n").is_err());
        let ok = parse("[embedding]\nprovider = \"openai\"\nmodel = \"m\"\ndims = 8\n").unwrap();
        assert!(ok.embedding.is_enabled());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/nonexistent/mh.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
