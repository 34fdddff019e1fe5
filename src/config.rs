//! Configuration parsing and validation.
//!
//! schema-rag reads a TOML file, then lets environment variables override
//! the credentials and model names (a `.env` file in the working directory
//! is loaded first by the binary). Every section is optional; a missing file
//! behaves like an empty one.
//!
//! ```toml
//! [gemini]
//! model = "gemini-2.0-flash"
//! embedding_model = "text-embedding-004"
//!
//! [pinecone]
//! index_name = "knowledge-index"
//!
//! [retrieval]
//! default_top_k = 5
//! fetch_overhead = 5
//! late_policy = "abort"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `GEMINI_API_KEY` | `gemini.api_key` |
//! | `GEMINI_MODEL` | `gemini.model` |
//! | `GEMINI_EMBEDDING_MODEL` | `gemini.embedding_model` |
//! | `PINECONE_API_KEY` | `pinecone.api_key` |
//! | `PINECONE_INDEX_NAME` | `pinecone.index_name` |
//! | `PINECONE_INDEX_HOST` | `pinecone.host` |

use anyhow::{Context, Result};
use schema_rag_core::aggregate::LatePolicy;
use schema_rag_core::extract::{MarkerPair, MarkerSet};
use schema_rag_core::pipeline::{PipelineSettings, CHAT_FALLBACK_MESSAGE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub pinecone: PineconeConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_gemini_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_gemini_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct PineconeConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// Data-plane host. Resolved through the control plane when unset.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_pinecone_timeout_secs")]
    pub timeout_secs: u64,
}

impl PineconeConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            index_name: default_index_name(),
            host: None,
            control_plane_url: default_control_plane_url(),
            api_version: default_api_version(),
            timeout_secs: default_pinecone_timeout_secs(),
        }
    }
}

fn default_index_name() -> String {
    "knowledge-index".to_string()
}
fn default_control_plane_url() -> String {
    "https://api.pinecone.io".to_string()
}
fn default_api_version() -> String {
    "2024-07".to_string()
}
fn default_pinecone_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_chat_top_k")]
    pub chat_top_k: usize,
    #[serde(default = "default_agent_namespace")]
    pub agent_namespace: String,
    #[serde(default = "default_chat_namespace")]
    pub chat_namespace: String,
    #[serde(default = "default_fetch_overhead")]
    pub fetch_overhead: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fetch_deadline_secs")]
    pub fetch_deadline_secs: u64,
    #[serde(default)]
    pub late_policy: LatePolicy,
    #[serde(default = "default_chat_fallback")]
    pub chat_fallback: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            chat_top_k: default_chat_top_k(),
            agent_namespace: default_agent_namespace(),
            chat_namespace: default_chat_namespace(),
            fetch_overhead: default_fetch_overhead(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_deadline_secs: default_fetch_deadline_secs(),
            late_policy: LatePolicy::default(),
            chat_fallback: default_chat_fallback(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_chat_top_k() -> usize {
    3
}
fn default_agent_namespace() -> String {
    "schemas-json".to_string()
}
fn default_chat_namespace() -> String {
    "database-articles".to_string()
}
fn default_fetch_overhead() -> usize {
    5
}
fn default_fetch_timeout_secs() -> u64 {
    5
}
fn default_fetch_deadline_secs() -> u64 {
    10
}
fn default_chat_fallback() -> String {
    CHAT_FALLBACK_MESSAGE.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Section headers the model is asked to wrap its structured output in.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_json_start")]
    pub json_start: String,
    #[serde(default = "default_json_end")]
    pub json_end: String,
    #[serde(default = "default_sql_start")]
    pub sql_start: String,
    #[serde(default = "default_sql_end")]
    pub sql_end: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            json_start: default_json_start(),
            json_end: default_json_end(),
            sql_start: default_sql_start(),
            sql_end: default_sql_end(),
        }
    }
}

fn default_json_start() -> String {
    "SCHEMA CHANGES".to_string()
}
fn default_json_end() -> String {
    "END SCHEMA CHANGES".to_string()
}
fn default_sql_start() -> String {
    "SCHEMA DDL".to_string()
}
fn default_sql_end() -> String {
    "END SCHEMA DDL".to_string()
}

impl ExtractionConfig {
    pub fn markers(&self) -> MarkerSet {
        MarkerSet {
            json: MarkerPair::new(self.json_start.trim(), self.json_end.trim()),
            sql: MarkerPair::new(self.sql_start.trim(), self.sql_end.trim()),
        }
    }
}

impl Config {
    /// Defaults for every section, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in
    /// production; empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(v);
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = get("GEMINI_EMBEDDING_MODEL") {
            self.gemini.embedding_model = v;
        }
        if let Some(v) = get("PINECONE_API_KEY") {
            self.pinecone.api_key = Some(v);
        }
        if let Some(v) = get("PINECONE_INDEX_NAME") {
            self.pinecone.index_name = v;
        }
        if let Some(v) = get("PINECONE_INDEX_HOST") {
            self.pinecone.host = Some(v);
        }
    }

    /// Settings handed to the request pipeline.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            default_top_k: self.retrieval.default_top_k,
            fetch_overhead: self.retrieval.fetch_overhead,
            fetch_timeout: Duration::from_secs(self.retrieval.fetch_timeout_secs),
            fetch_deadline: Duration::from_secs(self.retrieval.fetch_deadline_secs),
            late_policy: self.retrieval.late_policy,
            chat_namespace: self.retrieval.chat_namespace.clone(),
            chat_fallback: self.retrieval.chat_fallback.clone(),
            markers: self.extraction.markers(),
        }
    }
}

/// Parse and validate a config file. No environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load the config the binary runs with: the file when it exists, defaults
/// otherwise, then environment overrides, then validation.
pub fn load(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::minimal()
    };
    config.apply_overrides(|name| std::env::var(name).ok());
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate retrieval
    let r = &config.retrieval;
    if r.default_top_k == 0 {
        anyhow::bail!("retrieval.default_top_k must be >= 1");
    }
    if r.chat_top_k == 0 {
        anyhow::bail!("retrieval.chat_top_k must be >= 1");
    }
    if r.fetch_timeout_secs == 0 {
        anyhow::bail!("retrieval.fetch_timeout_secs must be > 0");
    }
    if r.fetch_deadline_secs == 0 {
        anyhow::bail!("retrieval.fetch_deadline_secs must be > 0");
    }
    if r.agent_namespace.trim().is_empty() || r.chat_namespace.trim().is_empty() {
        anyhow::bail!("retrieval namespaces must not be empty");
    }

    // Validate clients
    if config.gemini.timeout_secs == 0 {
        anyhow::bail!("gemini.timeout_secs must be > 0");
    }
    if config.pinecone.timeout_secs == 0 {
        anyhow::bail!("pinecone.timeout_secs must be > 0");
    }
    if config.pinecone.index_name.trim().is_empty() {
        anyhow::bail!("pinecone.index_name must not be empty");
    }

    // Validate extraction markers
    let e = &config.extraction;
    for (name, value) in [
        ("json_start", &e.json_start),
        ("json_end", &e.json_end),
        ("sql_start", &e.sql_start),
        ("sql_end", &e.sql_end),
    ] {
        if value.trim().is_empty() {
            anyhow::bail!("extraction.{} must not be empty", name);
        }
    }
    if e.json_start.trim().eq_ignore_ascii_case(e.json_end.trim())
        || e.sql_start.trim().eq_ignore_ascii_case(e.sql_end.trim())
    {
        anyhow::bail!("extraction start and end markers must differ");
    }

    Ok(())
}
