//! credbridge - Clone git repositories over HTTP with credentials answered on demand
//!
//! A clone runs on a worker thread. When the server asks for credentials, the
//! worker blocks on a [`auth::CredentialBridge`] until a controller (usually
//! the terminal) supplies the username or password, or until a bounded wait
//! expires. Optionally, system- and user-level `credential.helper` settings
//! are cleared for the duration of the clone and restored afterwards.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, wires the pieces)
//! - [`auth`] - Credential rendezvous between the clone worker and a controller
//! - [`git`] - Clone transport, git config access, helper isolation
//! - [`config`] - Configuration file schema and loading
//! - [`logging`] - Diagnostic logging setup
//! - [`ui`] - Prompts and output
//!
//! # Correctness Invariants
//!
//! 1. A credential request never blocks longer than its timeout
//! 2. A rejected credential is reported as an authentication failure, never
//!    as a timeout
//! 3. Credential helpers cleared for a clone are restored on every exit path,
//!    including panics

pub mod auth;
pub mod cli;
pub mod config;
pub mod git;
pub mod logging;
pub mod ui;
