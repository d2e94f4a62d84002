//! Engine configuration file support.
//!
//! This module provides utilities for reading engine configuration from
//! TOML configuration files.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::algorithms::AlignmentKind;
use crate::error::{Error, Result};

/// Environment variable pointing at an explicit configuration file.
pub const CONFIG_ENV_VAR: &str = "SCHEDULE_ENGINE_CONFIG";

/// Engine configuration from file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub naming: NamingSettings,
    #[serde(default)]
    pub blocks: BlockSettings,
    #[serde(default)]
    pub display: DisplaySettings,
}

/// Prefixes for automatically generated names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingSettings {
    #[serde(default = "default_schedule_prefix")]
    pub schedule_prefix: String,
    #[serde(default = "default_block_prefix")]
    pub block_prefix: String,
}

/// Defaults for new deferred programs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSettings {
    #[serde(default = "default_alignment")]
    pub default_alignment: String,
}

/// Text rendering settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(default = "default_max_instructions")]
    pub max_instructions: usize,
}

fn default_schedule_prefix() -> String {
    "sched".to_string()
}

fn default_block_prefix() -> String {
    "block".to_string()
}

fn default_alignment() -> String {
    "left".to_string()
}

fn default_max_instructions() -> usize {
    50
}

impl Default for NamingSettings {
    fn default() -> Self {
        Self {
            schedule_prefix: default_schedule_prefix(),
            block_prefix: default_block_prefix(),
        }
    }
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self {
            default_alignment: default_alignment(),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_instructions: default_max_instructions(),
        }
    }
}

impl EngineConfig {
    /// Load engine configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(EngineConfig)` if successful
    /// * `Err(Error::Config)` if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded engine configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Parse engine configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
        config.default_alignment()?;
        Ok(config)
    }

    /// Load engine configuration from the default location.
    ///
    /// Uses the file named by `SCHEDULE_ENGINE_CONFIG` when set, otherwise
    /// searches for `schedule_engine.toml` in:
    /// 1. Current directory
    /// 2. `config/` directory
    /// 3. Parent directory
    ///
    /// # Returns
    /// * `Ok(EngineConfig)` if found and parsed successfully
    /// * `Err(Error::Config)` if no config file found or parse error
    pub fn from_default_location() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(path);
        }

        let search_paths = [
            PathBuf::from("schedule_engine.toml"),
            PathBuf::from("config/schedule_engine.toml"),
            PathBuf::from("../schedule_engine.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(Error::Config(
            "No schedule_engine.toml found in standard locations".to_string(),
        ))
    }

    /// Load from the default location, falling back to defaults.
    pub fn load_or_default() -> Self {
        match Self::from_default_location() {
            Ok(config) => config,
            Err(e) => {
                warn!("{}; using default engine configuration", e);
                Self::default()
            }
        }
    }

    /// Alignment given to new deferred programs.
    pub fn default_alignment(&self) -> Result<AlignmentKind> {
        self.blocks.default_alignment.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[naming]
schedule_prefix = "prog"
block_prefix = "ctx"

[blocks]
default_alignment = "sequential"

[display]
max_instructions = 10
"#;

        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.naming.schedule_prefix, "prog");
        assert_eq!(config.naming.block_prefix, "ctx");
        assert_eq!(config.default_alignment().unwrap(), AlignmentKind::Sequential);
        assert_eq!(config.display.max_instructions, 10);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = EngineConfig::from_toml_str("[naming]\nblock_prefix = \"b\"\n").unwrap();
        assert_eq!(config.naming.schedule_prefix, "sched");
        assert_eq!(config.naming.block_prefix, "b");
        assert_eq!(config.default_alignment().unwrap(), AlignmentKind::Left);
        assert_eq!(config.display, DisplaySettings::default());
    }

    #[test]
    fn test_invalid_alignment_rejected() {
        let err = EngineConfig::from_toml_str("[blocks]\ndefault_alignment = \"diagonal\"\n")
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(EngineConfig::from_toml_str("[display\nmax_instructions = 3").is_err());
    }
}
