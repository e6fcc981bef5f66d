use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How many top-ranked records are included in the chat context.
    #[serde(default = "default_context_records")]
    pub context_records: i64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            context_records: default_context_records(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "granite3.3:2b".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_context_records() -> i64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    /// How many top-ranked records the read boundary returns.
    #[serde(default = "default_display_limit")]
    pub display_limit: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            display_limit: default_display_limit(),
        }
    }
}

fn default_display_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScoringConfig {
    /// Seed for the random-score fallback (rows with no numeric columns).
    /// Unset means OS-seeded, i.e. a different ranking per ingestion.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.ranking.display_limit < 1 {
        anyhow::bail!("ranking.display_limit must be >= 1");
    }

    if config.llm.context_records < 1 {
        anyhow::bail!("llm.context_records must be >= 1");
    }

    if config.llm.timeout_secs == 0 {
        anyhow::bail!("llm.timeout_secs must be > 0");
    }

    if config.llm.endpoint.is_empty() {
        anyhow::bail!("llm.endpoint must not be empty");
    }

    if config.llm.model.is_empty() {
        anyhow::bail!("llm.model must not be empty");
    }

    Ok(config)
}
