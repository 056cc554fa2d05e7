//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--interactive` / `--no-interactive`: Control prompts
//! - `--quiet` / `-q`: Minimal output

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// credbridge - clone over HTTP with credentials answered on demand
#[derive(Parser, Debug)]
#[command(name = "credbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if credbridge was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable interactive prompts
    #[arg(
        long = "interactive",
        global = true,
        conflicts_with = "no_interactive"
    )]
    pub interactive_flag: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Determine if interactive mode is enabled.
    ///
    /// Returns true if:
    /// - `--interactive` was explicitly set, OR
    /// - Neither `--no-interactive` nor `--quiet` was set AND stdin is a TTY
    ///   AND the config file does not disable prompts
    pub fn interactive(&self, config_default: bool) -> bool {
        if self.interactive_flag {
            true
        } else if self.no_interactive || self.quiet {
            false
        } else {
            config_default && std::io::stdin().is_terminal()
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone a repository, prompting for HTTP credentials if the server asks
    Clone {
        /// Repository URL (http, https, ssh, git, file or a local path)
        url: String,

        /// Destination directory (defaults to the repository name)
        directory: Option<PathBuf>,

        /// Seconds to wait for each credential answer
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Username to offer when the server asks for one
        #[arg(long, short)]
        username: Option<String>,

        /// Clear system and global credential.helper for the duration of the clone
        #[arg(long, conflicts_with = "use_credential_helpers")]
        isolate_credential_helpers: bool,

        /// Let configured credential helpers answer before prompting
        #[arg(long)]
        use_credential_helpers: bool,
    },

    /// Inspect configured git credential helpers
    Helpers {
        #[command(subcommand)]
        action: HelpersAction,
    },

    /// Get or set configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Helper inspection actions.
#[derive(Subcommand, Debug, Clone)]
pub enum HelpersAction {
    /// List credential.helper values per scope
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Configuration actions.
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Value to set
        value: String,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
