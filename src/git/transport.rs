//! git::transport
//!
//! HTTP clone transport wired to a [`GitHttpAuthenticator`].
//!
//! # Architecture
//!
//! libgit2 asks for credentials through `RemoteCallbacks::credentials`, a
//! synchronous callback on the thread running the clone. [`clone_repository`]
//! routes that callback through a [`CredentialNegotiator`], which consults
//! the authenticator:
//!
//! 1. The username embedded in the URL is used as-is; otherwise
//!    `ask_username` is called.
//! 2. `ask_password` is called.
//! 3. If libgit2 calls back again, the server rejected the credentials:
//!    `forget_password` is called and the clone fails with
//!    [`CloneError::AuthenticationFailed`]. Retrying is left to the caller.
//!
//! On success `save_auth_data` is called. A failed clone removes the
//! destination directory if this module created it.
//!
//! [`spawn_clone`] runs the clone on a worker thread so the calling thread
//! is free to act as the controller.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::url::CloneUrl;
use crate::auth::{AuthError, GitHttpAuthenticator};

/// Errors from a clone.
#[derive(Debug, Error)]
pub enum CloneError {
    /// The clone target could not be parsed.
    #[error("invalid clone URL: {url}")]
    InvalidUrl {
        /// The target as given
        url: String,
    },

    /// The destination already exists and is not empty.
    #[error("destination path '{}' already exists and is not an empty directory", path.display())]
    DestinationExists {
        /// The destination
        path: PathBuf,
    },

    /// The server rejected the supplied credentials.
    #[error("Authentication failed for '{url}'")]
    AuthenticationFailed {
        /// The clone target
        url: String,
    },

    /// The credential exchange ended without credentials (timeout, cancel).
    #[error(transparent)]
    Auth(AuthError),

    /// The remote asked for a credential type other than username/password.
    #[error("unsupported credential type requested by {url}: {requested}")]
    UnsupportedCredential {
        /// The clone target
        url: String,
        /// What the remote allowed
        requested: String,
    },

    /// The clone worker could not be started.
    #[error("failed to start clone worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The clone worker panicked.
    #[error("clone worker panicked")]
    WorkerPanicked,

    /// Any other libgit2 failure.
    #[error("clone failed: {message}")]
    Git {
        /// The libgit2 message
        message: String,
    },
}

impl CloneError {
    /// True for wrong credentials, as opposed to no credentials.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, CloneError::AuthenticationFailed { .. })
    }

    /// True when nobody answered a credential challenge in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, CloneError::Auth(e) if e.is_timeout())
    }

    /// True when the credential flow was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CloneError::Auth(e) if e.is_cancelled())
    }
}

impl From<AuthError> for CloneError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Rejected { url } => CloneError::AuthenticationFailed { url },
            other => CloneError::Auth(other),
        }
    }
}

/// Username and password handed to the transport.
///
/// `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpCredentials {
    /// Username presented to the server
    pub username: String,
    /// Password presented to the server
    pub password: String,
}

impl fmt::Debug for HttpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Per-operation credential state machine behind the transport callback.
///
/// One negotiator serves one clone. The first call asks the authenticator;
/// any later call means the previous credentials were rejected.
#[derive(Debug)]
pub struct CredentialNegotiator {
    url: String,
    attempts: usize,
}

impl CredentialNegotiator {
    /// Negotiator for a clone of `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempts: 0,
        }
    }

    /// How many times credentials were produced.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Produce credentials for the transport's next request.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Rejected`] when called after credentials were already
    ///   produced; `forget_password` has been called.
    /// - [`AuthError::Cancelled`] / [`AuthError::Timeout`] from the
    ///   authenticator.
    pub fn next_credentials(
        &mut self,
        authenticator: &dyn GitHttpAuthenticator,
        username_from_url: Option<&str>,
    ) -> Result<HttpCredentials, AuthError> {
        if self.attempts > 0 {
            authenticator.forget_password();
            return Err(AuthError::Rejected {
                url: self.url.clone(),
            });
        }

        let username = match username_from_url.filter(|u| !u.is_empty()) {
            Some(user) => user.to_string(),
            None => authenticator.ask_username(&self.url)?,
        };
        let password = authenticator.ask_password(&self.url)?;

        self.attempts += 1;
        Ok(HttpCredentials { username, password })
    }

    /// Report a completed operation to the authenticator.
    pub fn finish(&self, authenticator: &dyn GitHttpAuthenticator) {
        if self.attempts > 0 {
            authenticator.save_auth_data();
        }
    }
}

/// Clone behaviour switches.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Try configured git credential helpers before asking the authenticator.
    pub use_credential_helpers: bool,
}

/// What a successful clone did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneReport {
    /// Where the repository was cloned
    pub path: PathBuf,
    /// Whether the authenticator was consulted
    pub challenged: bool,
    /// Whether a credential helper supplied the credentials
    pub used_credential_helper: bool,
}

enum CallbackFailure {
    Auth(AuthError),
    Unsupported(String),
}

/// Clone `url` into `dest`, asking `authenticator` for HTTP credentials.
///
/// Blocks the calling thread, including while the authenticator waits for
/// answers. Use [`spawn_clone`] to keep the caller free.
#[instrument(skip(authenticator, options), fields(url = %url, dest = %dest.display()))]
pub fn clone_repository(
    url: &CloneUrl,
    dest: &Path,
    authenticator: &dyn GitHttpAuthenticator,
    options: &CloneOptions,
) -> Result<CloneReport, CloneError> {
    let dest_existed = dest.exists();
    if dest_existed && !is_empty_dir(dest) {
        return Err(CloneError::DestinationExists {
            path: dest.to_path_buf(),
        });
    }

    let negotiator = RefCell::new(CredentialNegotiator::new(url.as_str()));
    let failure: RefCell<Option<CallbackFailure>> = RefCell::new(None);
    let helper = RefCell::new(HelperState::new(options.use_credential_helpers));

    let result = {
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(|cb_url, username_from_url, allowed| {
            if !allowed.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
                let requested = format!("{:?}", allowed);
                *failure.borrow_mut() = Some(CallbackFailure::Unsupported(requested.clone()));
                return Err(git2::Error::from_str(&format!(
                    "unsupported credential type {}",
                    requested
                )));
            }

            if let Some(cred) = helper.borrow_mut().try_next(cb_url, username_from_url) {
                return Ok(cred);
            }

            let next = negotiator
                .borrow_mut()
                .next_credentials(authenticator, username_from_url);
            match next {
                Ok(creds) => git2::Cred::userpass_plaintext(&creds.username, &creds.password),
                Err(e) => {
                    let message = e.to_string();
                    *failure.borrow_mut() = Some(CallbackFailure::Auth(e));
                    Err(git2::Error::new(
                        git2::ErrorCode::Auth,
                        git2::ErrorClass::Http,
                        message,
                    ))
                }
            }
        });

        let mut fetch = git2::FetchOptions::new();
        fetch.remote_callbacks(callbacks);

        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(fetch);
        builder.clone(url.as_str(), dest)
    };

    match result {
        Ok(_repo) => {
            let negotiator = negotiator.into_inner();
            negotiator.finish(authenticator);
            let helper = helper.into_inner();
            debug!(attempts = negotiator.attempts(), "clone succeeded");
            Ok(CloneReport {
                path: dest.to_path_buf(),
                challenged: negotiator.attempts() > 0,
                used_credential_helper: helper.used && negotiator.attempts() == 0,
            })
        }
        Err(err) => {
            if !dest_existed {
                remove_partial_clone(dest);
            }
            Err(match failure.into_inner() {
                Some(CallbackFailure::Auth(e)) => CloneError::from(e),
                Some(CallbackFailure::Unsupported(requested)) => {
                    CloneError::UnsupportedCredential {
                        url: url.to_string(),
                        requested,
                    }
                }
                None if err.code() == git2::ErrorCode::Auth => CloneError::AuthenticationFailed {
                    url: url.to_string(),
                },
                None => CloneError::Git {
                    message: err.message().to_string(),
                },
            })
        }
    }
}

/// A clone running on a worker thread.
#[derive(Debug)]
pub struct CloneHandle {
    handle: JoinHandle<Result<CloneReport, CloneError>>,
}

impl CloneHandle {
    /// Has the worker finished (successfully or not)?
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return its result.
    pub fn join(self) -> Result<CloneReport, CloneError> {
        self.handle.join().unwrap_or(Err(CloneError::WorkerPanicked))
    }
}

/// Run [`clone_repository`] on a worker thread.
///
/// # Errors
///
/// [`CloneError::Spawn`] if the thread cannot be created.
pub fn spawn_clone<A>(
    url: CloneUrl,
    dest: PathBuf,
    authenticator: Arc<A>,
    options: CloneOptions,
) -> Result<CloneHandle, CloneError>
where
    A: GitHttpAuthenticator + 'static,
{
    let handle = thread::Builder::new()
        .name("credbridge-clone".to_string())
        .spawn(move || clone_repository(&url, &dest, authenticator.as_ref(), &options))
        .map_err(CloneError::Spawn)?;
    Ok(CloneHandle { handle })
}

/// Credential-helper lookups, tried once before the authenticator.
struct HelperState {
    config: Option<git2::Config>,
    tried: bool,
    used: bool,
}

impl HelperState {
    fn new(enabled: bool) -> Self {
        let config = if enabled {
            git2::Config::open_default()
                .map_err(|e| debug!(error = %e, "git config unavailable; skipping helpers"))
                .ok()
        } else {
            None
        };
        Self {
            config,
            tried: false,
            used: false,
        }
    }

    fn try_next(&mut self, url: &str, username: Option<&str>) -> Option<git2::Cred> {
        if self.tried {
            return None;
        }
        self.tried = true;
        let config = self.config.as_ref()?;
        match git2::Cred::credential_helper(config, url, username) {
            Ok(cred) => {
                debug!("credential helper supplied credentials");
                self.used = true;
                Some(cred)
            }
            Err(e) => {
                debug!(error = %e, "no credentials from helpers");
                None
            }
        }
    }
}

fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

fn remove_partial_clone(dest: &Path) {
    if dest.exists() {
        if let Err(e) = fs::remove_dir_all(dest) {
            warn!(path = %dest.display(), error = %e, "failed to remove partial clone");
        }
    }
}
