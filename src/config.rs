//! Run configuration.
//!
//! Everything here can be set in a JSON file passed with `--config`; the
//! matching command-line flags win over the file.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Maximum edit distance for a block to count as a question match.
pub const DEFAULT_MATCH_THRESHOLD: usize = 10;
pub const DEFAULT_FETCH_WORKERS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    pub schema_version: u32,
    pub match_threshold: usize,
    pub fetch_workers: usize,
    /// Markdown prefix for synthesized question headings.
    pub heading_prefix: String,
    /// Markdown prefix for per-submission labels in attributed output.
    pub label_prefix: String,
    pub http_timeout_secs: u64,
    pub cache_dir: Option<PathBuf>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            heading_prefix: "##".to_string(),
            label_prefix: "####".to_string(),
            http_timeout_secs: 30,
            cache_dir: None,
        }
    }
}

impl HarvestConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Per-user cache location, e.g. `~/.cache/nbharvest` on Linux.
pub fn default_cache_dir() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join("nbharvest"))
        .ok_or_else(|| anyhow!("no user cache directory on this platform; pass --cache-dir"))
}

/// Parse a config file. Validation waits until command-line overrides have
/// been applied.
pub fn load_config(path: &Path) -> Result<HarvestConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    serde_json::from_slice(&bytes).context("parse harvest config JSON")
}

pub fn load_config_optional(path: Option<&Path>) -> Result<HarvestConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(HarvestConfig::default()),
    }
}

pub fn validate_config(config: &HarvestConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.fetch_workers == 0 {
        return Err(anyhow!("fetch_workers must be at least 1"));
    }
    if config.http_timeout_secs == 0 {
        return Err(anyhow!("http_timeout_secs must be at least 1"));
    }
    Ok(())
}
