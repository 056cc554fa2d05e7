//! auth - Interactive HTTP credential bridge
//!
//! A transport such as libgit2 asks for credentials through a synchronous
//! callback on its worker thread and expects the value as the return. The
//! value can only come from a separate actor (a person at a prompt, a test
//! harness) running on its own schedule. This module bridges the two.
//!
//! # Components
//!
//! - [`GitHttpAuthenticator`] - The capability set a transport invokes
//! - [`CredentialBridge`] - Blocking implementation plus the controller API
//! - [`Challenge`] - One-shot rendezvous cell behind each field
//! - [`Controller`] - Answers challenges from a [`CredentialSource`]
//!
//! # Security
//!
//! Credential values never appear in logs or error messages.

mod bridge;
mod challenge;
pub mod controller;
mod errors;

pub use bridge::{CredentialBridge, DEFAULT_ASK_TIMEOUT};
pub use challenge::Challenge;
pub use controller::{Controller, ControllerOutcome, CredentialSource, ScriptedSource};
pub use errors::{AuthError, CredentialField};

/// The authentication capability set a credential-challenging transport
/// invokes against a registered authenticator.
///
/// Implementations are called from the transport's worker thread and must be
/// `Send + Sync`.
///
/// # Contract
///
/// - `ask_username` / `ask_password` may block, but must return within a
///   bound, with an error rather than an empty value on timeout or
///   cancellation.
/// - `save_auth_data` and `forget_password` must not block.
/// - `was_cancelled` is a cheap, non-blocking query.
pub trait GitHttpAuthenticator: Send + Sync {
    /// Ask for the username to present to `url`.
    fn ask_username(&self, url: &str) -> Result<String, AuthError>;

    /// Ask for the password to present to `url`.
    fn ask_password(&self, url: &str) -> Result<String, AuthError>;

    /// The transport authenticated successfully with the last credentials.
    fn save_auth_data(&self);

    /// The transport's server rejected the last credentials.
    fn forget_password(&self);

    /// Has the flow been abandoned?
    fn was_cancelled(&self) -> bool;
}
