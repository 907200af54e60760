use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::converter::LocalePolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub contributors: ContributorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_build_fingerprint")]
    pub build_fingerprint: String,
    #[serde(default)]
    pub locale_policy: LocalePolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            build_fingerprint: default_build_fingerprint(),
            locale_policy: LocalePolicy::default(),
        }
    }
}

fn default_locale() -> String {
    "en_US".to_string()
}
fn default_build_fingerprint() -> String {
    "dev".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectorConfig {
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Packages trusted without a platform signature.
    #[serde(default)]
    pub allowlist: Vec<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            max_concurrent: default_max_concurrent(),
            allowlist: Vec::new(),
        }
    }
}

impl CollectorConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

fn default_query_timeout_ms() -> u64 {
    5000
}
fn default_max_concurrent() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContributorsConfig {
    #[serde(default = "default_contributors_root")]
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for ContributorsConfig {
    fn default() -> Self {
        Self {
            root: default_contributors_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_contributors_root() -> PathBuf {
    PathBuf::from("./contributors")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/contributor.toml".to_string()]
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate index
    if config.index.locale.trim().is_empty() {
        anyhow::bail!("index.locale must not be empty");
    }

    // Validate collector
    if config.collector.query_timeout_ms == 0 {
        anyhow::bail!("collector.query_timeout_ms must be > 0");
    }
    if config.collector.max_concurrent == 0 {
        anyhow::bail!("collector.max_concurrent must be > 0");
    }

    // Validate contributors
    if config.contributors.include_globs.is_empty() {
        anyhow::bail!("contributors.include_globs must name at least one pattern");
    }

    Ok(config)
}
