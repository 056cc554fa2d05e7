//! Integration tests for credential-helper isolation against real git config.
//!
//! The system and global scopes are redirected to files in a temp dir, so
//! these tests never touch the machine's configuration.

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use credbridge::git::{
    capture, restore, with_isolated_credential_helpers, with_locked_isolation, ConfigScope,
    ConfigStore, GitConfigStore, HelperLock, IsolatedError, IsolationError,
    CREDENTIAL_HELPER_KEY,
};

/// Sandboxed system and global config files.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn system_file(&self) -> PathBuf {
        self.dir.path().join("gitconfig-system")
    }

    fn global_file(&self) -> PathBuf {
        self.dir.path().join("gitconfig-global")
    }

    fn store(&self) -> GitConfigStore {
        GitConfigStore::with_config_files(self.system_file(), self.global_file())
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.path().join("lock.credential-helpers")
    }
}

fn helpers(store: &GitConfigStore, scope: ConfigScope) -> Vec<String> {
    store
        .read_all(scope, CREDENTIAL_HELPER_KEY)
        .expect("read credential.helper")
}

#[test]
fn missing_key_reads_as_empty() {
    let sandbox = Sandbox::new();
    let store = sandbox.store();
    assert!(helpers(&store, ConfigScope::System).is_empty());
    assert!(helpers(&store, ConfigScope::Global).is_empty());
}

#[test]
fn unset_missing_key_is_not_an_error() {
    let sandbox = Sandbox::new();
    let store = sandbox.store();
    store
        .unset_all(ConfigScope::Global, CREDENTIAL_HELPER_KEY)
        .unwrap();
}

#[test]
fn set_and_add_build_multi_valued_key() {
    let sandbox = Sandbox::new();
    let store = sandbox.store();

    store
        .set(ConfigScope::Global, CREDENTIAL_HELPER_KEY, "cache --timeout=900")
        .unwrap();
    store
        .add(ConfigScope::Global, CREDENTIAL_HELPER_KEY, "store")
        .unwrap();

    assert_eq!(
        helpers(&store, ConfigScope::Global),
        vec!["cache --timeout=900", "store"]
    );
    assert!(helpers(&store, ConfigScope::System).is_empty());
}

#[test]
fn capture_clears_and_restore_puts_back() {
    let sandbox = Sandbox::new();
    let store = sandbox.store();
    store
        .set(ConfigScope::System, CREDENTIAL_HELPER_KEY, "manager")
        .unwrap();
    store
        .set(ConfigScope::Global, CREDENTIAL_HELPER_KEY, "cache")
        .unwrap();
    store
        .add(ConfigScope::Global, CREDENTIAL_HELPER_KEY, "store")
        .unwrap();

    let snapshot = capture(&store, &ConfigScope::ALL).unwrap();
    assert!(snapshot.has_helpers());
    assert!(helpers(&store, ConfigScope::System).is_empty());
    assert!(helpers(&store, ConfigScope::Global).is_empty());

    restore(&store, &snapshot).unwrap();
    assert_eq!(helpers(&store, ConfigScope::System), vec!["manager"]);
    assert_eq!(helpers(&store, ConfigScope::Global), vec!["cache", "store"]);
}

#[test]
fn scoped_isolation_restores_after_operation_error() {
    let sandbox = Sandbox::new();
    let store = sandbox.store();
    store
        .set(ConfigScope::Global, CREDENTIAL_HELPER_KEY, "cache")
        .unwrap();

    let result: Result<(), IsolatedError<String>> =
        with_isolated_credential_helpers(&store, &ConfigScope::ALL, || {
            assert!(helpers(&store, ConfigScope::Global).is_empty());
            Err("clone failed".to_string())
        });

    assert!(matches!(result, Err(IsolatedError::Operation(ref m)) if m == "clone failed"));
    assert_eq!(helpers(&store, ConfigScope::Global), vec!["cache"]);
}

#[test]
fn missing_git_fails_capture_without_running_operation() {
    let sandbox = Sandbox::new();
    let store = sandbox
        .store()
        .with_git_binary(sandbox.dir.path().join("no-such-git"));

    let mut ran = false;
    let result: Result<(), IsolatedError<String>> =
        with_isolated_credential_helpers(&store, &ConfigScope::ALL, || {
            ran = true;
            Ok(())
        });

    assert!(!ran);
    assert!(matches!(
        result,
        Err(IsolatedError::Isolation(IsolationError::Capture {
            scope: ConfigScope::System,
            ..
        }))
    ));
}

#[test]
fn locked_isolation_holds_lock_for_window() {
    let sandbox = Sandbox::new();
    let store = sandbox.store();
    let lock_path = sandbox.lock_path();

    let held = with_locked_isolation(
        &store,
        &ConfigScope::ALL,
        &lock_path,
        Duration::from_secs(5),
        || Ok::<_, String>(HelperLock::try_acquire(&lock_path).unwrap().is_none()),
    )
    .unwrap();
    assert!(held);

    // Released afterwards.
    assert!(HelperLock::try_acquire(&lock_path).unwrap().is_some());
}
