//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\rip-minder\config.toml
//! - macOS: ~/Library/Application Support/rip-minder/config.toml
//! - Linux: ~/.config/rip-minder/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded at
//! startup; command-line flags override individual values for a single run.
//! The transfer password is never part of the config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ripping tool and staging area settings
    pub ripper: RipperConfig,

    /// Push destination settings
    pub transfer: TransferConfig,
}

/// Ripping tool and staging area settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RipperConfig {
    /// Ripping tool executable
    pub command: String,

    /// Directory the ripping tool writes albums into (the staging area)
    pub output_dir: PathBuf,

    /// Staging snapshot file, relative to `output_dir` unless absolute
    pub staging_file: PathBuf,

    /// Persist the staging snapshot after every staging mutation, not only on shutdown
    pub persist_on_change: bool,

    /// Create the ripping tool's own config file before drive configuration
    pub write_tool_config: bool,
}

impl Default for RipperConfig {
    fn default() -> Self {
        Self {
            command: "whipper".to_string(),
            output_dir: PathBuf::from("output"),
            staging_file: PathBuf::from("staging.json"),
            persist_on_change: true,
            write_tool_config: true,
        }
    }
}

impl RipperConfig {
    /// Full path of the staging snapshot file.
    pub fn staging_path(&self) -> PathBuf {
        if self.staging_file.is_absolute() {
            self.staging_file.clone()
        } else {
            self.output_dir.join(&self.staging_file)
        }
    }
}

/// Push destination settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Local path (`/music`, `~/Music`) or SMB share (`//nas/music[/path]`)
    pub share: Option<String>,

    /// SMB user name (only used for `//` shares)
    pub user: Option<String>,

    /// SMB client executable
    pub smb_command: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            share: None,
            user: None,
            smb_command: "smbclient".to_string(),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("rip-minder"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location
///
/// Returns default config if file doesn't exist or can't be parsed.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit path
///
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)
}

/// Save configuration to an explicit path
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
