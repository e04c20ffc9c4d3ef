//! Service configuration: built-in ERA5 defaults, an optional YAML file, then
//! environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use reanalysis_profile::{ArchiveConfig, LookupConfig};
use serde::{Deserialize, Serialize};

/// Full service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Pressure-level archive.
    #[serde(default = "ArchiveConfig::era5_isobaric")]
    pub isobaric: ArchiveConfig,

    /// Hybrid model-level archive.
    #[serde(default = "ArchiveConfig::era5_native")]
    pub native: ArchiveConfig,

    #[serde(default)]
    pub lookup: LookupConfig,

    /// Replacement for the embedded vertical coefficient table.
    #[serde(default)]
    pub vertical_table: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            isobaric: ArchiveConfig::era5_isobaric(),
            native: ArchiveConfig::era5_native(),
            lookup: LookupConfig::default(),
            vertical_table: None,
        }
    }
}

impl ApiConfig {
    /// Load the layered configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file. Missing sections keep their ERA5 defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ERA5_ISOBARIC_URL") {
            self.isobaric.url = url;
        }
        if let Ok(url) = std::env::var("ERA5_NATIVE_URL") {
            self.native.url = url;
        }
        if let Ok(val) = std::env::var("ERA5_POOL_SIZE") {
            match val.parse() {
                Ok(size) => {
                    self.isobaric.pool_size = size;
                    self.native.pool_size = size;
                }
                Err(_) => tracing::warn!(value = %val, "Ignoring unparseable ERA5_POOL_SIZE"),
            }
        }
        if let Ok(path) = std::env::var("ERA5_VERTICAL_TABLE") {
            self.vertical_table = Some(PathBuf::from(path));
        }
        self.lookup.apply_env();
    }

    pub fn validate(&self) -> Result<()> {
        self.isobaric.validate()?;
        self.native.validate()?;
        self.lookup.validate()?;
        if !self
            .isobaric
            .variables
            .iter()
            .any(|v| v == "surface_pressure")
        {
            anyhow::bail!(
                "archive '{}' must serve surface_pressure for native profiles",
                self.isobaric.name
            );
        }
        Ok(())
    }
}
