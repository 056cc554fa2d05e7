//! git::isolation
//!
//! Temporarily clear `credential.helper` so a credential store cannot answer
//! on the user's behalf.
//!
//! # Lifecycle
//!
//! ```text
//! acquire (lock, capture) -> protected operation -> release (restore, unlock)
//! ```
//!
//! [`with_isolated_credential_helpers`] is the usual entry point: restore
//! runs on every exit path, including errors and panics in the protected
//! operation. [`CredentialHelperIsolation`] is the guard behind it, for
//! callers that need to keep the isolation open across a scope.
//!
//! # Capture
//!
//! All scopes are read before any is cleared, so a failed read changes
//! nothing. If clearing a scope fails, the scopes already cleared are put
//! back before the error is returned.
//!
//! # Restore
//!
//! Every scope is attempted even if an earlier one fails. Non-blank captured
//! values are re-applied verbatim, in their original order; scopes that had
//! no helper are left unset. Failures are collected into one
//! [`IsolationError::Restore`].
//!
//! Restoring "no helper" cannot tell an unset key from one explicitly set to
//! an empty value; both come back unset.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use super::config_store::{ConfigScope, ConfigStore, ConfigStoreError, CREDENTIAL_HELPER_KEY};
use super::lock::{HelperLock, LockError};

/// One scope that could not be put back.
#[derive(Debug)]
pub struct RestoreFailure {
    /// The scope
    pub scope: ConfigScope,
    /// Why
    pub error: ConfigStoreError,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.error)
    }
}

fn join_failures(failures: &[RestoreFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors isolating credential helpers.
#[derive(Debug, Error)]
pub enum IsolationError {
    /// Reading or clearing a scope failed during capture.
    #[error("failed to capture credential helpers at {scope} scope: {source}")]
    Capture {
        /// The scope
        scope: ConfigScope,
        /// Underlying store error
        source: ConfigStoreError,
        /// Scopes that could not be rolled back after a failed clear
        rollback_failures: Vec<RestoreFailure>,
    },

    /// One or more scopes could not be restored.
    #[error("failed to restore credential helpers: {}", join_failures(failures))]
    Restore {
        /// Every scope that failed
        failures: Vec<RestoreFailure>,
    },

    /// The isolation lock could not be taken.
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl IsolationError {
    /// Scopes whose original helpers may not be in place.
    pub fn unrestored_scopes(&self) -> Vec<ConfigScope> {
        match self {
            IsolationError::Capture {
                rollback_failures, ..
            } => rollback_failures.iter().map(|f| f.scope).collect(),
            IsolationError::Restore { failures } => failures.iter().map(|f| f.scope).collect(),
            IsolationError::Lock(_) => Vec::new(),
        }
    }
}

/// The protected operation's error, plus any restore failure after it.
#[derive(Debug, Error)]
pub enum IsolatedError<E> {
    /// Capture failed; the operation never ran.
    #[error(transparent)]
    Isolation(IsolationError),

    /// The operation failed; restore succeeded.
    #[error(transparent)]
    Operation(E),

    /// The operation failed and restore failed too.
    #[error("{operation} (and {restore})")]
    Both {
        /// The operation's error
        operation: E,
        /// The restore error
        restore: IsolationError,
    },
}

/// Captured `credential.helper` values per scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialHelperSnapshot {
    values: BTreeMap<ConfigScope, Vec<String>>,
}

impl CredentialHelperSnapshot {
    /// Values captured at `scope` (empty if none or not captured).
    pub fn values(&self, scope: ConfigScope) -> &[String] {
        self.values.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Captured scopes, lowest precedence first.
    pub fn scopes(&self) -> impl Iterator<Item = ConfigScope> + '_ {
        self.values.keys().copied()
    }

    /// Whether any scope had a helper configured.
    pub fn has_helpers(&self) -> bool {
        self.values.values().any(|v| v.iter().any(|s| !s.trim().is_empty()))
    }
}

/// Read and clear `credential.helper` at each of `scopes`.
///
/// # Errors
///
/// [`IsolationError::Capture`] naming the first scope that failed. Nothing
/// stays cleared after a failed capture unless listed in
/// `rollback_failures`.
pub fn capture(
    store: &dyn ConfigStore,
    scopes: &[ConfigScope],
) -> Result<CredentialHelperSnapshot, IsolationError> {
    let mut ordered = scopes.to_vec();
    ordered.sort();
    ordered.dedup();

    let mut snapshot = CredentialHelperSnapshot::default();
    for &scope in &ordered {
        let values = store
            .read_all(scope, CREDENTIAL_HELPER_KEY)
            .map_err(|source| IsolationError::Capture {
                scope,
                source,
                rollback_failures: Vec::new(),
            })?;
        debug!(%scope, count = values.len(), "captured credential helpers");
        snapshot.values.insert(scope, values);
    }

    let mut cleared = CredentialHelperSnapshot::default();
    for &scope in &ordered {
        if let Err(source) = store.unset_all(scope, CREDENTIAL_HELPER_KEY) {
            let rollback_failures = restore_each(store, &cleared);
            return Err(IsolationError::Capture {
                scope,
                source,
                rollback_failures,
            });
        }
        cleared
            .values
            .insert(scope, snapshot.values(scope).to_vec());
    }

    Ok(snapshot)
}

/// Put the captured values back.
///
/// # Errors
///
/// [`IsolationError::Restore`] listing every scope that failed; all scopes
/// were attempted.
pub fn restore(
    store: &dyn ConfigStore,
    snapshot: &CredentialHelperSnapshot,
) -> Result<(), IsolationError> {
    let failures = restore_each(store, snapshot);
    if failures.is_empty() {
        Ok(())
    } else {
        Err(IsolationError::Restore { failures })
    }
}

fn restore_each(store: &dyn ConfigStore, snapshot: &CredentialHelperSnapshot) -> Vec<RestoreFailure> {
    let mut failures = Vec::new();
    for (&scope, values) in &snapshot.values {
        if let Err(error) = restore_scope(store, scope, values) {
            warn!(%scope, error = %error, "failed to restore credential helpers");
            failures.push(RestoreFailure { scope, error });
        }
    }
    failures
}

fn restore_scope(
    store: &dyn ConfigStore,
    scope: ConfigScope,
    values: &[String],
) -> Result<(), ConfigStoreError> {
    let mut values = values.iter().filter(|v| !v.trim().is_empty());
    let Some(first) = values.next() else {
        return Ok(());
    };
    store.set(scope, CREDENTIAL_HELPER_KEY, first)?;
    for value in values {
        store.add(scope, CREDENTIAL_HELPER_KEY, value)?;
    }
    debug!(%scope, "restored credential helpers");
    Ok(())
}

/// Guard that keeps credential helpers cleared until it is finished or
/// dropped.
pub struct CredentialHelperIsolation<'a> {
    store: &'a dyn ConfigStore,
    snapshot: Option<CredentialHelperSnapshot>,
    _lock: Option<HelperLock>,
}

impl fmt::Debug for CredentialHelperIsolation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHelperIsolation")
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

impl<'a> CredentialHelperIsolation<'a> {
    /// Capture and clear `scopes` without taking the process lock.
    pub fn acquire(
        store: &'a dyn ConfigStore,
        scopes: &[ConfigScope],
    ) -> Result<Self, IsolationError> {
        let snapshot = capture(store, scopes)?;
        Ok(Self {
            store,
            snapshot: Some(snapshot),
            _lock: None,
        })
    }

    /// Take the lock at `lock_path`, then capture and clear `scopes`.
    pub fn acquire_locked(
        store: &'a dyn ConfigStore,
        scopes: &[ConfigScope],
        lock_path: &Path,
        lock_timeout: Duration,
    ) -> Result<Self, IsolationError> {
        let lock = HelperLock::acquire(lock_path, lock_timeout)?;
        let snapshot = capture(store, scopes)?;
        Ok(Self {
            store,
            snapshot: Some(snapshot),
            _lock: Some(lock),
        })
    }

    /// What was captured.
    pub fn snapshot(&self) -> Option<&CredentialHelperSnapshot> {
        self.snapshot.as_ref()
    }

    /// Restore now and report the outcome.
    pub fn finish(mut self) -> Result<(), IsolationError> {
        match self.snapshot.take() {
            Some(snapshot) => restore(self.store, &snapshot),
            None => Ok(()),
        }
    }
}

impl Drop for CredentialHelperIsolation<'_> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            // Nobody to report to here; restore_each already logged.
            let _ = restore(self.store, &snapshot);
        }
    }
}

/// Run `operation` with credential helpers cleared at `scopes`.
///
/// Restore runs whether `operation` succeeds, fails, or panics; a panic is
/// resumed after the guard has restored.
///
/// # Example
///
/// ```
/// use credbridge::git::{
///     with_isolated_credential_helpers, ConfigScope, ConfigStore, MemoryConfigStore,
///     CREDENTIAL_HELPER_KEY,
/// };
///
/// let store = MemoryConfigStore::new()
///     .with_values(ConfigScope::Global, CREDENTIAL_HELPER_KEY, &["cache"]);
///
/// let seen = with_isolated_credential_helpers(&store, &ConfigScope::ALL, || {
///     store.read_all(ConfigScope::Global, CREDENTIAL_HELPER_KEY)
/// })
/// .unwrap();
///
/// assert!(seen.is_empty());
/// assert_eq!(store.values(ConfigScope::Global, CREDENTIAL_HELPER_KEY), vec!["cache"]);
/// ```
pub fn with_isolated_credential_helpers<T, E>(
    store: &dyn ConfigStore,
    scopes: &[ConfigScope],
    operation: impl FnOnce() -> Result<T, E>,
) -> Result<T, IsolatedError<E>> {
    let guard = CredentialHelperIsolation::acquire(store, scopes).map_err(IsolatedError::Isolation)?;
    run_guarded(guard, operation)
}

/// Like [`with_isolated_credential_helpers`], holding the process lock at
/// `lock_path` for the whole window.
pub fn with_locked_isolation<T, E>(
    store: &dyn ConfigStore,
    scopes: &[ConfigScope],
    lock_path: &Path,
    lock_timeout: Duration,
    operation: impl FnOnce() -> Result<T, E>,
) -> Result<T, IsolatedError<E>> {
    let guard = CredentialHelperIsolation::acquire_locked(store, scopes, lock_path, lock_timeout)
        .map_err(IsolatedError::Isolation)?;
    run_guarded(guard, operation)
}

fn run_guarded<T, E>(
    guard: CredentialHelperIsolation<'_>,
    operation: impl FnOnce() -> Result<T, E>,
) -> Result<T, IsolatedError<E>> {
    // If `operation` panics, unwinding drops `guard`, which restores.
    let result = operation();
    let restored = guard.finish();

    match (result, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(restore)) => Err(IsolatedError::Isolation(restore)),
        (Err(operation), Ok(())) => Err(IsolatedError::Operation(operation)),
        (Err(operation), Err(restore)) => Err(IsolatedError::Both { operation, restore }),
    }
}
