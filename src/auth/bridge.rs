//! auth::bridge
//!
//! The credential bridge: a [`GitHttpAuthenticator`] whose ask-methods block
//! the transport worker until a controller supplies the value.
//!
//! # Roles
//!
//! - The **worker** (the transport's thread) calls `ask_username` /
//!   `ask_password` and the save/forget hooks.
//! - The **controller** calls `wait_until_*_asked`, `supply_*`, `cancel`, and
//!   the non-blocking queries.
//!
//! One bridge serves one in-flight operation. Share it between the two
//! threads with an `Arc`.
//!
//! # Example
//!
//! ```
//! use credbridge::auth::{CredentialBridge, GitHttpAuthenticator};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! let bridge = Arc::new(CredentialBridge::new());
//! let worker = {
//!     let bridge = Arc::clone(&bridge);
//!     thread::spawn(move || bridge.ask_password("http://host/repo.git"))
//! };
//!
//! assert!(bridge.wait_until_password_asked(Duration::from_secs(10)));
//! bridge.supply_password("gitpassword").unwrap();
//! assert_eq!(worker.join().unwrap().unwrap(), "gitpassword");
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::debug;

use super::challenge::Challenge;
use super::errors::{AuthError, CredentialField};
use super::GitHttpAuthenticator;

/// Default bound on a blocking ask (30 seconds).
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Thread-crossing request/response bridge for HTTP credentials.
#[derive(Debug)]
pub struct CredentialBridge {
    username: Challenge,
    password: Challenge,
    cancelled: AtomicBool,
    auth_data_saved: AtomicBool,
    forget_count: AtomicUsize,
    ask_timeout: Duration,
}

impl Default for CredentialBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialBridge {
    /// Create a bridge with [`DEFAULT_ASK_TIMEOUT`].
    pub fn new() -> Self {
        Self::with_ask_timeout(DEFAULT_ASK_TIMEOUT)
    }

    /// Create a bridge whose ask-methods give up after `ask_timeout`.
    pub fn with_ask_timeout(ask_timeout: Duration) -> Self {
        Self {
            username: Challenge::new(CredentialField::Username),
            password: Challenge::new(CredentialField::Password),
            cancelled: AtomicBool::new(false),
            auth_data_saved: AtomicBool::new(false),
            forget_count: AtomicUsize::new(0),
            ask_timeout,
        }
    }

    /// The bound applied to each ask.
    pub fn ask_timeout(&self) -> Duration {
        self.ask_timeout
    }

    fn challenge(&self, field: CredentialField) -> &Challenge {
        match field {
            CredentialField::Username => &self.username,
            CredentialField::Password => &self.password,
        }
    }

    fn ask(&self, field: CredentialField, url: &str) -> Result<String, AuthError> {
        debug!(%field, url, "credential requested");
        let result = self.challenge(field).ask(self.ask_timeout, &self.cancelled);
        match &result {
            Ok(_) => debug!(%field, "credential handed to transport"),
            Err(e) => debug!(%field, error = %e, "credential request ended without a value"),
        }
        result
    }

    /// Supply the username, releasing a blocked or future `ask_username`.
    ///
    /// # Errors
    ///
    /// [`AuthError::AlreadySupplied`] if a username was already supplied.
    pub fn supply_username(&self, value: impl Into<String>) -> Result<(), AuthError> {
        self.supply(CredentialField::Username, value.into())
    }

    /// Supply the password, releasing a blocked or future `ask_password`.
    ///
    /// # Errors
    ///
    /// [`AuthError::AlreadySupplied`] if a password was already supplied.
    pub fn supply_password(&self, value: impl Into<String>) -> Result<(), AuthError> {
        self.supply(CredentialField::Password, value.into())
    }

    /// Supply a value for `field`.
    pub fn supply(&self, field: CredentialField, value: String) -> Result<(), AuthError> {
        self.challenge(field).supply(value)?;
        debug!(%field, "credential supplied");
        Ok(())
    }

    /// Block the calling (controller) thread until the username is asked.
    pub fn wait_until_username_asked(&self, timeout: Duration) -> bool {
        self.username.wait_until_asked(timeout)
    }

    /// Block the calling (controller) thread until the password is asked.
    pub fn wait_until_password_asked(&self, timeout: Duration) -> bool {
        self.password.wait_until_asked(timeout)
    }

    /// Block until `field` is asked.
    pub fn wait_until_asked(&self, field: CredentialField, timeout: Duration) -> bool {
        self.challenge(field).wait_until_asked(timeout)
    }

    /// Has the username been asked?
    pub fn was_username_asked(&self) -> bool {
        self.username.was_asked()
    }

    /// Has the password been asked?
    pub fn was_password_asked(&self) -> bool {
        self.password.was_asked()
    }

    /// Has `field` been asked?
    pub fn was_asked(&self, field: CredentialField) -> bool {
        self.challenge(field).was_asked()
    }

    /// Has a value for `field` been supplied?
    pub fn is_supplied(&self, field: CredentialField) -> bool {
        self.challenge(field).is_supplied()
    }

    /// Abandon the flow: every blocked and future ask returns
    /// [`AuthError::Cancelled`] promptly.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.username.wake();
        self.password.wake();
        debug!("credential flow cancelled");
    }

    /// Did the transport report a successful authentication?
    pub fn auth_data_saved(&self) -> bool {
        self.auth_data_saved.load(Ordering::Acquire)
    }

    /// How many times the transport reported rejected credentials.
    pub fn forget_count(&self) -> usize {
        self.forget_count.load(Ordering::Acquire)
    }
}

impl GitHttpAuthenticator for CredentialBridge {
    fn ask_username(&self, url: &str) -> Result<String, AuthError> {
        self.ask(CredentialField::Username, url)
    }

    fn ask_password(&self, url: &str) -> Result<String, AuthError> {
        self.ask(CredentialField::Password, url)
    }

    fn save_auth_data(&self) {
        self.auth_data_saved.store(true, Ordering::Release);
        debug!("transport accepted credentials");
    }

    fn forget_password(&self) {
        self.forget_count.fetch_add(1, Ordering::AcqRel);
        debug!("transport rejected credentials");
    }

    fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
