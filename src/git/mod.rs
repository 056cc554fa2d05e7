//! git
//!
//! Everything that touches git: the HTTP clone transport, the ambient git
//! configuration, and credential-helper isolation.
//!
//! # Architecture
//!
//! No other module imports `git2` or runs the `git` binary directly.
//!
//! - [`transport`] - Clone over HTTP with credentials from an authenticator
//! - [`config_store`] - Read/unset/set config values at a scope
//! - [`isolation`] - Capture, clear, and restore `credential.helper`
//! - [`lock`] - Cross-process lock for the isolation window
//! - [`url`] - Clone target parsing

pub mod config_store;
pub mod isolation;
pub mod lock;
pub mod transport;
pub mod url;

pub use config_store::{
    ConfigScope, ConfigStore, ConfigStoreError, GitConfigStore, MemoryConfigStore,
    StoreOperation, CREDENTIAL_HELPER_KEY,
};
pub use isolation::{
    capture, restore, with_isolated_credential_helpers, with_locked_isolation,
    CredentialHelperIsolation, CredentialHelperSnapshot, IsolatedError, IsolationError,
    RestoreFailure,
};
pub use lock::{HelperLock, LockError, DEFAULT_LOCK_TIMEOUT};
pub use transport::{
    clone_repository, spawn_clone, CloneError, CloneHandle, CloneOptions, CloneReport,
    CredentialNegotiator, HttpCredentials,
};
pub use url::CloneUrl;
