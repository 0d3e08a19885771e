//! Configuration loading and resolution
//!
//! earmark reads a single TOML bootstrap file. Resolution order:
//! 1. Command-line argument (highest priority)
//! 2. `EARMARK_CONFIG` environment variable
//! 3. `<config_dir>/earmark/earmark.toml`
//! 4. Compiled defaults (fallback)
//!
//! A missing or unparseable file never stops startup: a warning is logged and
//! compiled defaults are used instead.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "EARMARK_CONFIG";

/// Config file name looked up under the platform config directory
pub const CONFIG_FILE_NAME: &str = "earmark.toml";

/// Top-level bootstrap configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub logging: LoggingConfig,
    pub table: TableConfig,
    pub cache: CacheConfig,
    pub paths: PathsConfig,
    pub tags: TagsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Table paging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Rows exposed per materialization request
    pub page_size: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

/// Decode cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of decoded files kept
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

/// Path normalization configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Local alias under which network shares are mounted
    pub network_mount_alias: String,

    /// Prefix identifying local (non-network) absolute paths.
    /// Defaults to the user's home directory.
    pub home_prefix: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            network_mount_alias: "/smb/".to_string(),
            home_prefix: None,
        }
    }
}

impl PathsConfig {
    /// Home prefix as a forward-slash string
    pub fn home_prefix(&self) -> String {
        self.home_prefix
            .clone()
            .or_else(dirs::home_dir)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default()
    }
}

/// Tag side-store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TagsConfig {
    /// File name of the tag store kept next to imported data
    pub store_file_name: String,

    /// Identity recorded on tag entries. Defaults to the login name.
    pub tagger: Option<String>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            store_file_name: "audiotagdb3".to_string(),
            tagger: None,
        }
    }
}

impl TagsConfig {
    /// Resolved tagger identity
    pub fn tagger(&self) -> String {
        if let Some(tagger) = &self.tagger {
            return tagger.clone();
        }
        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Find the config file to load, if any
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    dirs::config_dir()
        .map(|d| d.join("earmark").join(CONFIG_FILE_NAME))
        .filter(|p| p.exists())
}

/// Parse a config file
pub fn load_config_file(path: &Path) -> Result<ReviewConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Load configuration, falling back to compiled defaults on any failure
pub fn load_config(cli_arg: Option<&Path>) -> ReviewConfig {
    // Priority 4: compiled defaults
    let Some(path) = resolve_config_path(cli_arg) else {
        info!("No config file found, using compiled defaults");
        return ReviewConfig::default();
    };

    match load_config_file(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring config file {}: {}", path.display(), e);
            ReviewConfig::default()
        }
    }
}
