//! Repository configuration (`<meta>/plumb.toml`)

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the metadata directory at the worktree root
pub const META_DIR: &str = ".git";

/// Name of the config file inside the metadata directory
pub const CONFIG_FILE: &str = "plumb.toml";

/// Repository configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub build: BuildOptions,

    #[serde(default)]
    pub exclude: ExcludeConfig,
}

/// Object store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// zlib compression level, 0-9 (default: 6)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression_level: default_compression_level(),
        }
    }
}

/// Tree builder settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildOptions {
    /// Record executable files as `100755` instead of `100644`
    #[serde(default)]
    pub record_executable: bool,

    /// Store symlinks as `120000` blobs holding the link target
    #[serde(default)]
    pub record_symlinks: bool,

    /// Traverse symlinks as if they were the entry they point at
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// Exclude policy settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
    /// Extra names skipped at any depth, in addition to the metadata directory
    #[serde(default)]
    pub reserved: Vec<String>,

    /// Apply `<root>/.gitignore`
    #[serde(default)]
    pub use_gitignore: bool,

    /// Extra gitignore-style patterns
    #[serde(default)]
    pub patterns: Vec<String>,
}

fn default_compression_level() -> u32 {
    6
}

impl Config {
    /// Load config from `path`, falling back to defaults if the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let config: Config = toml::from_str(&text).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate().map_err(|reason| Error::Config {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(config)
    }

    /// Write config to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.store.compression_level > 9 {
            return Err(format!(
                "store.compression_level must be 0-9, got {}",
                self.store.compression_level
            ));
        }
        if let Some(bad) = self
            .exclude
            .reserved
            .iter()
            .find(|name| name.is_empty() || name.contains('/'))
        {
            return Err(format!("exclude.reserved entry '{}' is not a plain name", bad));
        }
        Ok(())
    }
}
