//! config::schema
//!
//! Configuration file schema.
//!
//! # Validation
//!
//! Values are validated after parsing: timeouts and intervals must be
//! positive, and unknown keys are rejected.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Contents of `config.toml`.
///
/// # Example
///
/// ```toml
/// interactive = true
/// ask_timeout_secs = 30
/// poll_interval_ms = 100
///
/// [credential_helpers]
/// isolate = true
/// use_helpers = false
/// lock_timeout_secs = 10
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Prompt for credentials when stdin is a terminal
    pub interactive: Option<bool>,

    /// Bound on each blocking credential request
    pub ask_timeout_secs: Option<u64>,

    /// How often the controller checks on the clone
    pub poll_interval_ms: Option<u64>,

    /// Credential-helper handling
    pub credential_helpers: Option<CredentialHelpersConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ask_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "ask_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if let Some(helpers) = &self.credential_helpers {
            helpers.validate()?;
        }
        Ok(())
    }
}

/// `[credential_helpers]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialHelpersConfig {
    /// Clear system/global `credential.helper` for the duration of a clone
    pub isolate: Option<bool>,

    /// Let configured helpers answer before prompting
    pub use_helpers: Option<bool>,

    /// How long to wait for another run's isolation window
    pub lock_timeout_secs: Option<u64>,
}

impl CredentialHelpersConfig {
    /// Validate the table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.isolate == Some(true) && self.use_helpers == Some(true) {
            return Err(ConfigError::InvalidValue(
                "credential_helpers.isolate and credential_helpers.use_helpers are mutually exclusive"
                    .to_string(),
            ));
        }
        if self.lock_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "credential_helpers.lock_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
