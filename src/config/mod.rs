//! config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order, first existing file wins:
//! 1. `$CREDBRIDGE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/credbridge/config.toml`
//! 3. `~/.credbridge/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use credbridge::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("ask timeout: {:?}", config.ask_timeout());
//! println!("isolate helpers: {}", config.isolate_credential_helpers());
//! ```

pub mod schema;

pub use schema::{CredentialHelpersConfig, GlobalConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::auth::DEFAULT_ASK_TIMEOUT;
use crate::auth::controller::DEFAULT_POLL_INTERVAL;
use crate::git::DEFAULT_LOCK_TIMEOUT;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CREDBRIDGE_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Effective configuration.
///
/// Accessors apply defaults for anything the file leaves unset.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// File contents
    pub global: GlobalConfig,
    /// Where it was loaded from, if anywhere
    loaded_from: Option<PathBuf>,
}

impl Config {
    /// Load from the first existing standard location.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        for path in Self::candidate_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let global: GlobalConfig = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        global.validate()?;

        Ok(Self {
            global,
            loaded_from: Some(path.to_path_buf()),
        })
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            paths.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            paths.push(PathBuf::from(xdg_home).join("credbridge/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".credbridge/config.toml"));
        }
        paths
    }

    /// Canonical write location: `~/.credbridge/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".credbridge/config.toml"))
    }

    /// Where `config set` writes when no file was loaded: `$CREDBRIDGE_CONFIG`
    /// if set, otherwise [`Config::default_path`].
    pub fn write_path() -> Result<PathBuf, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => Self::default_path(),
        }
    }

    /// Set `key` to `value` in `config`, validating the result.
    ///
    /// Keys use dotted table paths, e.g. `credential_helpers.isolate`.
    pub fn set_value(config: &mut GlobalConfig, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "interactive" => config.interactive = Some(parse_bool(key, value)?),
            "ask_timeout_secs" => config.ask_timeout_secs = Some(parse_u64(key, value)?),
            "poll_interval_ms" => config.poll_interval_ms = Some(parse_u64(key, value)?),
            "credential_helpers.isolate" => {
                config.credential_helpers.get_or_insert_with(Default::default).isolate =
                    Some(parse_bool(key, value)?)
            }
            "credential_helpers.use_helpers" => {
                config.credential_helpers.get_or_insert_with(Default::default).use_helpers =
                    Some(parse_bool(key, value)?)
            }
            "credential_helpers.lock_timeout_secs" => {
                config
                    .credential_helpers
                    .get_or_insert_with(Default::default)
                    .lock_timeout_secs = Some(parse_u64(key, value)?)
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        config.validate()
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed. Writes to a temp file in the
    /// same directory and renames it into place.
    pub fn write(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Whether to prompt by default. Defaults to `true`.
    pub fn interactive(&self) -> bool {
        self.global.interactive.unwrap_or(true)
    }

    /// Bound on each credential request. Defaults to 30 seconds.
    pub fn ask_timeout(&self) -> Duration {
        self.global
            .ask_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ASK_TIMEOUT)
    }

    /// Controller polling interval. Defaults to 100ms.
    pub fn poll_interval(&self) -> Duration {
        self.global
            .poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// Whether to clear credential helpers during a clone. Defaults to `false`.
    pub fn isolate_credential_helpers(&self) -> bool {
        self.global
            .credential_helpers
            .as_ref()
            .and_then(|h| h.isolate)
            .unwrap_or(false)
    }

    /// Whether helpers may answer before prompting. Defaults to `false`.
    pub fn use_credential_helpers(&self) -> bool {
        self.global
            .credential_helpers
            .as_ref()
            .and_then(|h| h.use_helpers)
            .unwrap_or(false)
    }

    /// How long to wait for the isolation lock. Defaults to 10 seconds.
    pub fn lock_timeout(&self) -> Duration {
        self.global
            .credential_helpers
            .as_ref()
            .and_then(|h| h.lock_timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LOCK_TIMEOUT)
    }

    /// Path the configuration was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.loaded_from.as_deref()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!(
            "{} expects a boolean, got '{}'",
            key, value
        ))),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| {
        ConfigError::InvalidValue(format!("{} expects a whole number, got '{}'", key, value))
    })
}
