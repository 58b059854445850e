//! TOML configuration with environment overlay.
//!
//! Every pipeline receives a [`Config`] explicitly; nothing reads process
//! state after [`load_config`] (or [`Config::minimal`]) returns. API
//! credentials never live in the file: `OPENAI_API_KEY` is read from the
//! environment once, and `OPENAI_MODEL` overrides `rich.model`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub papers: PapersConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub windows: WindowsConfig,
    #[serde(default)]
    pub fast: FastConfig,
    #[serde(default)]
    pub rich: RichConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub lock: LockConfig,
    /// Populated from `OPENAI_API_KEY`, never from the file.
    #[serde(skip)]
    pub openai_api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/summaries.sqlite"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PapersConfig {
    #[serde(default = "default_papers_dir")]
    pub dir: PathBuf,
    /// File extension (without the dot) that marks a document.
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for PapersConfig {
    fn default() -> Self {
        Self {
            dir: default_papers_dir(),
            extension: default_extension(),
        }
    }
}

fn default_papers_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_extension() -> String {
    "pdf".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./weekly_summaries")
}

#[derive(Debug, Deserialize, Clone)]
pub struct WindowsConfig {
    #[serde(default = "default_new_hours")]
    pub new_hours: i64,
    #[serde(default = "default_week_days")]
    pub week_days: i64,
}

impl Default for WindowsConfig {
    fn default() -> Self {
        Self {
            new_hours: default_new_hours(),
            week_days: default_week_days(),
        }
    }
}

fn default_new_hours() -> i64 {
    24
}
fn default_week_days() -> i64 {
    7
}

/// Local summarization backend (Ollama).
#[derive(Debug, Deserialize, Clone)]
pub struct FastConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_fast_model")]
    pub model: String,
    /// Program and arguments spawned once when the backend is unreachable.
    #[serde(default = "default_start_command")]
    pub start_command: Vec<String>,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_fast_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FastConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_fast_model(),
            start_command: default_start_command(),
            ready_timeout_secs: default_ready_timeout_secs(),
            timeout_secs: default_fast_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_fast_model() -> String {
    "llama2:7b".to_string()
}
fn default_start_command() -> Vec<String> {
    vec!["ollama".to_string(), "serve".to_string()]
}
fn default_ready_timeout_secs() -> u64 {
    30
}
fn default_fast_timeout_secs() -> u64 {
    120
}

/// Remote completion backend (OpenAI chat completions).
#[derive(Debug, Deserialize, Clone)]
pub struct RichConfig {
    #[serde(default = "default_rich_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_rich_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RichConfig {
    fn default() -> Self {
        Self {
            model: default_rich_model(),
            base_url: default_openai_base_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_rich_timeout_secs(),
        }
    }
}

fn default_rich_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_rich_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Base URL; defaults depend on the provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_similar_k")]
    pub similar_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similar_k: default_similar_k(),
        }
    }
}

fn default_similar_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LockConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Defaults for every section, with the environment overlay applied.
    pub fn minimal() -> Self {
        let mut config = Config::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Lock file guarding a run; sits next to the database unless configured.
    pub fn lock_path(&self) -> PathBuf {
        match &self.lock.path {
            Some(p) => p.clone(),
            None => {
                let mut p = self.db.path.clone().into_os_string();
                p.push(".lock");
                PathBuf::from(p)
            }
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.openai_api_key = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty());
        if let Some(model) = lookup("OPENAI_MODEL").filter(|m| !m.is_empty()) {
            self.rich.model = model;
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content, |key| std::env::var(key).ok())
}

fn parse_config(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.apply_env(lookup);
    validate(&config)?;
    Ok(config)
}

const MAX_NEW_HOURS: i64 = 24 * 365;
const MAX_WEEK_DAYS: i64 = 3650;

fn validate(config: &Config) -> Result<()> {
    if config.papers.extension.trim_start_matches('.').is_empty() {
        bail!("papers.extension must not be empty");
    }

    if !(1..=MAX_NEW_HOURS).contains(&config.windows.new_hours) {
        bail!("windows.new_hours must be between 1 and {}", MAX_NEW_HOURS);
    }
    if !(1..=MAX_WEEK_DAYS).contains(&config.windows.week_days) {
        bail!("windows.week_days must be between 1 and {}", MAX_WEEK_DAYS);
    }

    if config.retrieval.similar_k < 1 {
        bail!("retrieval.similar_k must be >= 1");
    }

    if config.fast.start_command.is_empty() {
        bail!("fast.start_command must name a program");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
