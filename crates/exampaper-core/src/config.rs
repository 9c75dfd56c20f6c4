//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`). Every setting has a default so an empty
//! environment still yields a runnable service.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => tracing::warn!(env = other, "unknown RUST_ENV, using base config only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    /// Build from an explicit figment (tests, embedding callers).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment: Figment::from(Serialized::defaults(Settings::default())).merge(figment) }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed settings record.
    pub fn settings(&self) -> crate::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub index: IndexSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub prompts: PromptSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be > 0".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.chunks_per_topic == 0 {
            return Err(Error::InvalidConfig("chunking.chunks_per_topic must be > 0".into()));
        }
        if self.retrieval.total_chunks == 0 || self.retrieval.max_chars == 0 {
            return Err(Error::InvalidConfig("retrieval budgets must be > 0".into()));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(Error::InvalidConfig("server.max_upload_bytes must be > 0".into()));
        }
        for (name, model) in [("labeler", &self.llm.labeler), ("generator", &self.llm.generator)] {
            if !(0.0..=2.0).contains(&model.temperature) {
                return Err(Error::InvalidConfig(format!("llm.{name}.temperature out of range: {}", model.temperature)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Request body cap for uploads.
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self { Self { host: "0.0.0.0".into(), port: 8000, max_upload_bytes: 25 * 1024 * 1024 } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexNamespace {
    /// One directory, rebuilt by every upload; uploads are serialized.
    Shared,
    /// A fresh sub-directory per request, removed once retrieval is done.
    PerRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub dir: String,
    pub table: String,
    pub namespace: IndexNamespace,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { dir: "vector_store".into(), table: "chunks".into(), namespace: IndexNamespace::Shared }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunks_per_topic: usize,
    pub max_label_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 2000, chunk_overlap: 300, chunks_per_topic: 20, max_label_chars: 8000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub total_chunks: usize,
    pub max_chars: usize,
    pub query: String,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { total_chunks: 15, max_chars: 12000, query: "Generate questions about this content".into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Transformer model loaded from `model_dir`.
    Local,
    /// Deterministic token hashing; no model files needed.
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub model_dir: String,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { provider: EmbeddingProvider::Local, model_dir: "models/bge-m3".into(), dim: 1024, max_len: 256, batch_size: 16 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub labeler: ModelSettings,
    pub generator: ModelSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self { labeler: ModelSettings { temperature: 0.3, ..ModelSettings::default() }, generator: ModelSettings::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing, deserialize_with = "deserialize_option_secret_string")]
    pub api_key: Option<SecretString>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "groq".into(),
            base_url: "https://api.groq.com/openai/v1".into(),
            model: "gemma2-9b-it".into(),
            api_key: None,
            temperature: 0.2,
            timeout_secs: 120,
        }
    }
}

fn deserialize_option_secret_string<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.filter(|s| !s.is_empty()).map(SecretString::from))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    pub question_paper: String,
    pub answer_key: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self { question_paper: "prompts/questionPaper.txt".into(), answer_key: "prompts/answerKey.txt".into() }
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
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
