//! auth::errors
//!
//! Error types for the credential bridge.
//!
//! # Design
//!
//! Error messages MUST NOT contain credential values. Variants carry the
//! challenged field and, where useful, the target URL, never the username or
//! password that was supplied.
//!
//! # Example
//!
//! ```
//! use credbridge::auth::{AuthError, CredentialField};
//! use std::time::Duration;
//!
//! let err = AuthError::Timeout {
//!     field: CredentialField::Password,
//!     waited: Duration::from_secs(30),
//! };
//! assert!(err.to_string().contains("password"));
//! assert!(err.is_timeout());
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The credential field a challenge is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialField {
    /// The username challenge.
    Username,
    /// The password challenge.
    Password,
}

impl CredentialField {
    /// Lowercase name used in messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialField::Username => "username",
            CredentialField::Password => "password",
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from credential challenges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// A blocking ask or wait exceeded its bound.
    #[error("{field} was not supplied within {}s", waited.as_secs_f64())]
    Timeout {
        /// The challenged field
        field: CredentialField,
        /// How long the caller waited
        waited: Duration,
    },

    /// The flow was abandoned while a challenge was outstanding.
    #[error("{field} request was cancelled")]
    Cancelled {
        /// The challenged field
        field: CredentialField,
    },

    /// A value was already supplied for this challenge.
    #[error("{field} has already been supplied")]
    AlreadySupplied {
        /// The challenged field
        field: CredentialField,
    },

    /// The transport rejected the supplied credentials.
    #[error("authentication failed for '{url}'")]
    Rejected {
        /// The URL the credentials were presented to
        url: String,
    },
}

impl AuthError {
    /// True when nobody answered within the bound ("never answered").
    pub fn is_timeout(&self) -> bool {
        matches!(self, AuthError::Timeout { .. })
    }

    /// True when the controller gave up ("gave up").
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AuthError::Cancelled { .. })
    }

    /// True when the credentials reached the server and were refused.
    pub fn is_rejected(&self) -> bool {
        matches!(self, AuthError::Rejected { .. })
    }

    /// The field this error concerns, if any.
    pub fn field(&self) -> Option<CredentialField> {
        match self {
            AuthError::Timeout { field, .. }
            | AuthError::Cancelled { field }
            | AuthError::AlreadySupplied { field } => Some(*field),
            AuthError::Rejected { .. } => None,
        }
    }
}
