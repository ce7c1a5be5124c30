//! Engine configuration
//!
//! Stored as `vellum.json` next to the database. A missing file yields the
//! defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_FILE: &str = "vellum.json";

/// Tunables shared by every repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling on bound parameters per statement. IN-lists are chunked to
    /// stay under it; statements that cannot be chunked fail instead.
    #[serde(default = "default_max_parameter_count")]
    pub max_parameter_count: usize,
    /// Fail property loading when one version id yields several row sets,
    /// instead of logging a warning.
    #[serde(default)]
    pub strict_property_loading: bool,
    /// Page size used when a caller passes zero.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// SQLite journal mode.
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
    /// Content types kept in the schema cache.
    #[serde(default = "default_content_type_cache_capacity")]
    pub content_type_cache_capacity: usize,
}

fn default_max_parameter_count() -> usize {
    2000
}

fn default_page_size() -> u64 {
    100
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_content_type_cache_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parameter_count: default_max_parameter_count(),
            strict_property_loading: false,
            default_page_size: default_page_size(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
            content_type_cache_capacity: default_content_type_cache_capacity(),
        }
    }
}

impl EngineConfig {
    /// Defaults with strict property loading turned on.
    pub fn strict() -> Self {
        Self {
            strict_property_loading: true,
            ..Self::default()
        }
    }

    /// Load config from a directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read engine config from {:?}", config_path))?;
        let config: EngineConfig =
            serde_json::from_str(&data).with_context(|| "Failed to parse engine config JSON")?;
        Ok(config)
    }

    /// Save config to a directory.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let config_path = dir.join(CONFIG_FILE);
        let tmp_path = config_path.with_extension("tmp");
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &config_path)?;
        Ok(())
    }
}
