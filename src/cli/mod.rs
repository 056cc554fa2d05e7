//! cli
//!
//! Command-line interface layer for credbridge.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Initialize logging and load configuration
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Clone orchestration lives in [`crate::git`] and
//! [`crate::auth`]; handlers here only wire them to the terminal.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::config::Config;
use crate::logging;
use crate::ui::output::Verbosity;

/// Per-invocation settings shared by every command.
#[derive(Debug)]
pub struct Context {
    /// Working directory override
    pub cwd: Option<PathBuf>,
    /// Debug output enabled
    pub debug: bool,
    /// Minimal output
    pub quiet: bool,
    /// Prompts allowed
    pub interactive: bool,
    /// Effective configuration
    pub config: Config,
}

impl Context {
    /// Output verbosity for this run.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// The directory commands resolve relative paths against.
    pub fn cwd(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(cwd) => Ok(cwd.clone()),
            None => std::env::current_dir().context("cannot determine current directory"),
        }
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    logging::init(cli.debug);

    let config = Config::load()?;
    let ctx = Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
        interactive: cli.interactive(config.interactive()),
        config,
    };

    commands::dispatch(cli.command, &ctx)
}
