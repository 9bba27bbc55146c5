use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::GraphError;
use crate::model::ENGINE_PROVENANCE;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LEXIGRAPH_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Nodes visited (normalize) or edges inserted (augment) between flushes.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Provenance tag written on edges the engine derives.
    #[serde(default = "default_provenance")]
    pub provenance: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            provenance: default_provenance(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// # Errors
    ///
    /// `InvalidArgument` for a zero batch size or an empty provenance tag.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.batch_size == 0 {
            return Err(GraphError::InvalidArgument(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.provenance.trim().is_empty() {
            return Err(GraphError::InvalidArgument(
                "provenance must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load a config file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read, parsed or
/// validated.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<EngineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config in {}", path.display()))?;
    Ok(config)
}

/// Resolve the config from `$LEXIGRAPH_CONFIG`, then
/// `<config dir>/lexigraph/config.toml`, then the defaults.
///
/// # Errors
///
/// Returns an error if the resolved file cannot be loaded.
pub fn discover_config() -> Result<EngineConfig> {
    match config_path(env::var_os(CONFIG_ENV).map(PathBuf::from)) {
        Some(path) => load_config(&path),
        None => Ok(EngineConfig::default()),
    }
}

fn config_path(from_env: Option<PathBuf>) -> Option<PathBuf> {
    from_env.or_else(|| dirs::config_dir().map(|dir| dir.join("lexigraph/config.toml")))
}

const fn default_batch_size() -> usize {
    20
}

fn default_provenance() -> String {
    ENGINE_PROVENANCE.to_string()
}
