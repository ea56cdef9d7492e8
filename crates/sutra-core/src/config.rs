//! Configuration loader, typed engine settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_FUSION__RRF_K=30`). The resulting [`EngineConfig`] is validated once
//! and treated as immutable afterwards.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::SourceTag;

pub struct Config {
    figment: Figment,
    env_name: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, env_name };
        config.validate_for_env()?;
        Ok(config)
    }

    /// Wraps an already-assembled figment; used by tests and embedders of the engine.
    pub fn from_figment(figment: Figment, env_name: impl Into<String>) -> Self {
        Self { figment, env_name: env_name.into() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extracts and validates the full engine configuration.
    pub fn engine(&self) -> anyhow::Result<EngineConfig> {
        let engine: EngineConfig = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to extract engine config: {}", e))?;
        engine.validate()?;
        Ok(engine)
    }

    fn validate_for_env(&self) -> anyhow::Result<()> {
        match self.env_name.as_str() {
            "prod" | "production" => {
                let provider: EmbeddingProvider = self.get("embedding.provider")?;
                if provider == EmbeddingProvider::Hash {
                    anyhow::bail!("Prod config must not use the hash embedder");
                }
            }
            "dev" | "development" | "test" | "testing" => {}
            _ => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub fusion: FusionConfig,
    pub context: ContextConfig,
    pub generation: GenerationConfig,
    pub embedding: EmbeddingConfig,
    pub query: QueryConfig,
    pub data: DataConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let w = &self.fusion.weights;
        for (name, value) in [("semantic", w.semantic), ("lexical", w.lexical), ("dictionary", w.dictionary)] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!("fusion weight '{name}' must be finite and >= 0, got {value}")));
            }
        }
        if self.fusion.rrf_k == 0 {
            return Err(Error::InvalidConfig("fusion.rrf_k must be > 0".into()));
        }
        if self.fusion.final_top_k == 0 {
            return Err(Error::InvalidConfig("fusion.final_top_k must be > 0".into()));
        }
        if self.context.max_item_chars == 0 || self.context.max_total_chars == 0 {
            return Err(Error::InvalidConfig("context budgets must be > 0".into()));
        }
        if self.context.max_item_chars > self.context.max_total_chars {
            return Err(Error::InvalidConfig(format!(
                "context.max_item_chars ({}) exceeds context.max_total_chars ({})",
                self.context.max_item_chars, self.context.max_total_chars
            )));
        }
        if self.retrieval.timeout_ms == 0 {
            return Err(Error::InvalidConfig("retrieval.timeout_ms must be > 0".into()));
        }
        if self.generation.max_attempts == 0 {
            return Err(Error::InvalidConfig("generation.max_attempts must be > 0".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::InvalidConfig("embedding.dimension must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub semantic_top_k: usize,
    pub lexical_top_k: usize,
    pub dictionary_top_k: usize,
    /// Per-retriever budget; a task over budget counts as failed.
    pub timeout_ms: u64,
    /// When false a semantic failure degrades like the other sources.
    pub semantic_required: bool,
}

impl RetrievalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { semantic_top_k: 10, lexical_top_k: 10, dictionary_top_k: 5, timeout_ms: 8_000, semantic_required: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceWeights {
    pub semantic: f64,
    pub lexical: f64,
    pub dictionary: f64,
}

impl SourceWeights {
    pub fn weight(&self, source: SourceTag) -> f64 {
        match source {
            SourceTag::Semantic => self.semantic,
            SourceTag::Lexical => self.lexical,
            SourceTag::Dictionary => self.dictionary,
        }
    }
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self { semantic: 0.5, lexical: 0.3, dictionary: 0.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub weights: SourceWeights,
    pub rrf_k: u32,
    pub final_top_k: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { weights: SourceWeights::default(), rrf_k: 60, final_top_k: 15 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Passages fetched on each side of a hit; 0 disables expansion.
    pub neighbor_window: u32,
    pub max_item_chars: usize,
    pub max_total_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self { neighbor_window: 2, max_item_chars: 1_500, max_total_chars: 12_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible API (`.../v1`).
    pub endpoint: String,
    pub model: String,
    /// Name of the env var holding the API key; none means no auth header.
    pub api_key_env: Option<String>,
    pub timeout_ms: u64,
    pub temperature: f32,
    /// Total attempts when the model returns malformed output.
    pub max_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5:14b".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            timeout_ms: 120_000,
            temperature: 0.2,
            max_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Http,
    Hash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub api_key_env: Option<String>,
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Http,
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "bge-m3".to_string(),
            dimension: 1024,
            api_key_env: None,
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QueryConfig {
    /// Domain phrases added to the built-in table.
    pub extra_phrases: Vec<String>,
    /// Alias → text ids, added to the built-in alias table.
    pub extra_aliases: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub tantivy_index_dir: String,
    pub lancedb_dir: String,
    pub table_name: String,
    pub glossary_path: String,
}

impl DataConfig {
    pub fn tantivy_index_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.tantivy_index_dir)
    }

    pub fn lancedb_dir(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.lancedb_dir)
    }

    pub fn glossary_path(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.glossary_path)
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            tantivy_index_dir: "data/indexes/tantivy".to_string(),
            lancedb_dir: "data/indexes/lancedb".to_string(),
            table_name: "passages".to_string(),
            glossary_path: "data/glossary.json".to_string(),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
