//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls into `git`/`auth` to do the work
//! 3. Formats and displays output

mod clone;
mod completion;
mod config_cmd;
mod helpers;

pub use clone::{clone, CloneArgs, TerminalSource};
pub use completion::completion;

use crate::cli::args::{Command, ConfigAction, HelpersAction};
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Clone {
            url,
            directory,
            timeout,
            username,
            isolate_credential_helpers,
            use_credential_helpers,
        } => clone::clone(
            ctx,
            CloneArgs {
                url,
                directory,
                timeout,
                username,
                isolate_credential_helpers,
                use_credential_helpers,
            },
        ),
        Command::Helpers { action } => match action {
            HelpersAction::List { json } => helpers::list(ctx, json),
        },
        Command::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(ctx),
            ConfigAction::Set { key, value } => config_cmd::set(ctx, &key, &value),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}
