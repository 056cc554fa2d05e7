//! git::config_store
//!
//! Access to the ambient git configuration at a given scope.
//!
//! # Scopes
//!
//! [`ConfigScope`] orders scopes by precedence, lowest first:
//! `System < Global`. Capture and restore walk scopes in this order.
//!
//! # Implementations
//!
//! - [`GitConfigStore`] runs the `git config` binary. Its
//!   `with_config_files` constructor points the system and global scopes at
//!   explicit files (`GIT_CONFIG_SYSTEM` / `GIT_CONFIG_GLOBAL`) so callers
//!   can work against a sandbox.
//! - [`MemoryConfigStore`] keeps values in memory and can be told to fail
//!   specific operations.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Mutex;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// The config key credential helpers live under.
pub const CREDENTIAL_HELPER_KEY: &str = "credential.helper";

/// `git config --get-all` exit status when the key has no value.
const EXIT_KEY_MISSING: i32 = 1;

/// `git config --unset-all` exit status when there is nothing to unset.
const EXIT_NOTHING_TO_UNSET: i32 = 5;

/// A configuration precedence level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    /// Machine-wide configuration (lowest precedence).
    System,
    /// Per-user configuration.
    Global,
}

impl ConfigScope {
    /// All scopes, lowest precedence first.
    pub const ALL: [ConfigScope; 2] = [ConfigScope::System, ConfigScope::Global];

    /// The `git config` flag selecting this scope.
    pub fn flag(&self) -> &'static str {
        match self {
            ConfigScope::System => "--system",
            ConfigScope::Global => "--global",
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigScope::System => "system",
            ConfigScope::Global => "global",
        }
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from a config store.
#[derive(Debug, Error)]
pub enum ConfigStoreError {
    /// `git` could not be started.
    #[error("failed to run git config: {0}")]
    Spawn(#[source] std::io::Error),

    /// `git config` exited with an unexpected status.
    #[error("git config {args} failed ({status}): {stderr}")]
    Command {
        /// The arguments after `config`
        args: String,
        /// Exit status description
        status: String,
        /// Trimmed stderr
        stderr: String,
    },

    /// A store refused the operation.
    #[error("{operation} {key} at {scope} scope failed: {message}")]
    Rejected {
        /// Which operation
        operation: &'static str,
        /// The scope
        scope: ConfigScope,
        /// The key
        key: String,
        /// Why
        message: String,
    },
}

/// The external configuration store interface.
///
/// Implementations must be usable from any thread.
pub trait ConfigStore: Send + Sync {
    /// All values of `key` at `scope`, in file order. Empty if unset.
    fn read_all(&self, scope: ConfigScope, key: &str) -> Result<Vec<String>, ConfigStoreError>;

    /// Remove every value of `key` at `scope`. Succeeds if already unset.
    fn unset_all(&self, scope: ConfigScope, key: &str) -> Result<(), ConfigStoreError>;

    /// Replace `key` at `scope` with the single `value`.
    fn set(&self, scope: ConfigScope, key: &str, value: &str) -> Result<(), ConfigStoreError>;

    /// Append another value for multi-valued `key` at `scope`.
    fn add(&self, scope: ConfigScope, key: &str, value: &str) -> Result<(), ConfigStoreError>;
}

/// [`ConfigStore`] backed by the `git config` command.
#[derive(Debug, Clone, Default)]
pub struct GitConfigStore {
    git: Option<PathBuf>,
    system_file: Option<PathBuf>,
    global_file: Option<PathBuf>,
}

impl GitConfigStore {
    /// Use the `git` on `PATH` and the real system/global files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirect the system and global scopes to the given files.
    pub fn with_config_files(system: impl Into<PathBuf>, global: impl Into<PathBuf>) -> Self {
        Self {
            git: None,
            system_file: Some(system.into()),
            global_file: Some(global.into()),
        }
    }

    /// Use a specific git executable.
    pub fn with_git_binary(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = Some(git.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = match &self.git {
            Some(path) => Command::new(path),
            None => Command::new("git"),
        };
        if let Some(system) = &self.system_file {
            cmd.env("GIT_CONFIG_SYSTEM", system);
            cmd.env_remove("GIT_CONFIG_NOSYSTEM");
        }
        if let Some(global) = &self.global_file {
            cmd.env("GIT_CONFIG_GLOBAL", global);
        }
        cmd
    }

    /// Run `git config <args>`; statuses in `tolerated` count as success.
    fn run(&self, args: &[&str], tolerated: &[i32]) -> Result<(i32, String), ConfigStoreError> {
        let output = self
            .command()
            .arg("config")
            .args(args)
            .output()
            .map_err(ConfigStoreError::Spawn)?;

        let code = output.status.code().unwrap_or(-1);
        if output.status.success() || tolerated.contains(&code) {
            debug!(args = ?args, code, "git config");
            return Ok((code, String::from_utf8_lossy(&output.stdout).into_owned()));
        }

        Err(ConfigStoreError::Command {
            args: args.join(" "),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl ConfigStore for GitConfigStore {
    fn read_all(&self, scope: ConfigScope, key: &str) -> Result<Vec<String>, ConfigStoreError> {
        let (code, stdout) = self.run(&[scope.flag(), "--get-all", key], &[EXIT_KEY_MISSING])?;
        if code == EXIT_KEY_MISSING {
            return Ok(Vec::new());
        }
        Ok(stdout.lines().map(str::to_string).collect())
    }

    fn unset_all(&self, scope: ConfigScope, key: &str) -> Result<(), ConfigStoreError> {
        self.run(&[scope.flag(), "--unset-all", key], &[EXIT_NOTHING_TO_UNSET])?;
        Ok(())
    }

    fn set(&self, scope: ConfigScope, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        self.run(&[scope.flag(), "--replace-all", key, value], &[])?;
        Ok(())
    }

    fn add(&self, scope: ConfigScope, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        self.run(&[scope.flag(), "--add", key, value], &[])?;
        Ok(())
    }
}

/// Which [`MemoryConfigStore`] operation to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    /// `read_all`
    Read,
    /// `unset_all`
    Unset,
    /// `set` and `add`
    Write,
}

impl StoreOperation {
    fn as_str(&self) -> &'static str {
        match self {
            StoreOperation::Read => "read",
            StoreOperation::Unset => "unset",
            StoreOperation::Write => "write",
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    values: BTreeMap<(ConfigScope, String), Vec<String>>,
    failures: HashSet<(ConfigScope, StoreOperation)>,
}

/// In-memory [`ConfigStore`].
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    state: Mutex<MemoryState>,
}

impl MemoryConfigStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `values` for `key` at `scope`.
    pub fn with_values(self, scope: ConfigScope, key: &str, values: &[&str]) -> Self {
        {
            let mut state = self.lock();
            state.values.insert(
                (scope, key.to_string()),
                values.iter().map(|v| v.to_string()).collect(),
            );
        }
        self
    }

    /// Make `operation` at `scope` fail from now on.
    pub fn fail_on(&self, scope: ConfigScope, operation: StoreOperation) {
        self.lock().failures.insert((scope, operation));
    }

    /// Let `operation` at `scope` succeed again.
    pub fn clear_failure(&self, scope: ConfigScope, operation: StoreOperation) {
        self.lock().failures.remove(&(scope, operation));
    }

    /// Current values, without going through the trait.
    pub fn values(&self, scope: ConfigScope, key: &str) -> Vec<String> {
        self.lock()
            .values
            .get(&(scope, key.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn check(
        state: &MemoryState,
        scope: ConfigScope,
        operation: StoreOperation,
        key: &str,
    ) -> Result<(), ConfigStoreError> {
        if state.failures.contains(&(scope, operation)) {
            return Err(ConfigStoreError::Rejected {
                operation: operation.as_str(),
                scope,
                key: key.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn read_all(&self, scope: ConfigScope, key: &str) -> Result<Vec<String>, ConfigStoreError> {
        let state = self.lock();
        Self::check(&state, scope, StoreOperation::Read, key)?;
        Ok(state
            .values
            .get(&(scope, key.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    fn unset_all(&self, scope: ConfigScope, key: &str) -> Result<(), ConfigStoreError> {
        let mut state = self.lock();
        Self::check(&state, scope, StoreOperation::Unset, key)?;
        state.values.remove(&(scope, key.to_string()));
        Ok(())
    }

    fn set(&self, scope: ConfigScope, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        let mut state = self.lock();
        Self::check(&state, scope, StoreOperation::Write, key)?;
        state
            .values
            .insert((scope, key.to_string()), vec![value.to_string()]);
        Ok(())
    }

    fn add(&self, scope: ConfigScope, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        let mut state = self.lock();
        Self::check(&state, scope, StoreOperation::Write, key)?;
        state
            .values
            .entry((scope, key.to_string()))
            .or_default()
            .push(value.to_string());
        Ok(())
    }
}
