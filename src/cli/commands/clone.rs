//! clone command - Clone a repository, answering credential requests from the terminal

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::debug;

use crate::auth::{
    Controller, ControllerOutcome, CredentialBridge, CredentialField, CredentialSource,
};
use crate::cli::Context;
use crate::git::{
    spawn_clone, with_locked_isolation, CloneError, CloneOptions, CloneReport, CloneUrl,
    ConfigScope, GitConfigStore, HelperLock, IsolatedError,
};
use crate::ui::output;
use crate::ui::prompts::{self, PromptError};

/// Arguments for [`clone`].
#[derive(Debug, Clone, Default)]
pub struct CloneArgs {
    pub url: String,
    pub directory: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub username: Option<String>,
    pub isolate_credential_helpers: bool,
    pub use_credential_helpers: bool,
}

/// Answers credential requests by prompting on the terminal.
#[derive(Debug, Clone, Copy)]
pub struct TerminalSource {
    interactive: bool,
}

impl TerminalSource {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }
}

impl CredentialSource for TerminalSource {
    fn provide(&mut self, field: CredentialField, url: &str) -> Result<Option<String>, PromptError> {
        match field {
            CredentialField::Username => {
                prompts::input(&format!("Username for '{}'", url), self.interactive)
            }
            CredentialField::Password => {
                prompts::password(&format!("Password for '{}'", url), self.interactive)
            }
        }
    }
}

/// Clone a repository.
pub fn clone(ctx: &Context, args: CloneArgs) -> Result<()> {
    let url = CloneUrl::parse(&args.url).ok_or_else(|| CloneError::InvalidUrl {
        url: args.url.clone(),
    })?;

    let dest = match &args.directory {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => ctx.cwd()?.join(dir),
        None => ctx.cwd()?.join(url.directory_name()),
    };

    let ask_timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.ask_timeout());
    if ask_timeout.is_zero() {
        return Err(anyhow!("--timeout must be at least 1 second"));
    }

    let isolate = args.isolate_credential_helpers
        || (ctx.config.isolate_credential_helpers() && !args.use_credential_helpers);
    let options = CloneOptions {
        use_credential_helpers: !isolate
            && (args.use_credential_helpers || ctx.config.use_credential_helpers()),
    };

    let bridge = Arc::new(CredentialBridge::with_ask_timeout(ask_timeout));
    if let Some(username) = args.username {
        if url.username().is_some() {
            output::warn(
                "--username ignored: the URL already names a user",
                ctx.verbosity(),
            );
        } else {
            bridge.supply_username(username)?;
        }
    }

    if !url.is_http() {
        debug!(scheme = url.scheme(), "not an HTTP URL; no credential prompts expected");
    }

    output::print(
        format!("Cloning into '{}'...", dest.display()),
        ctx.verbosity(),
    );

    let mut prompt_failure = None;
    let result = if isolate {
        let store = GitConfigStore::new();
        with_locked_isolation(
            &store,
            &ConfigScope::ALL,
            &HelperLock::default_path(),
            ctx.config.lock_timeout(),
            || run_clone(ctx, &url, &dest, &bridge, options, &mut prompt_failure),
        )
        .map_err(isolated_to_anyhow)
    } else {
        run_clone(ctx, &url, &dest, &bridge, options, &mut prompt_failure).map_err(Into::into)
    };

    match (result, prompt_failure) {
        (Ok(report), _) => {
            report_success(ctx, &report);
            Ok(())
        }
        (Err(err), Some(prompt)) => Err(err.context(format!("credentials unavailable: {}", prompt))),
        (Err(err), None) => Err(err),
    }
}

fn run_clone(
    ctx: &Context,
    url: &CloneUrl,
    dest: &Path,
    bridge: &Arc<CredentialBridge>,
    options: CloneOptions,
    prompt_failure: &mut Option<PromptError>,
) -> Result<CloneReport, CloneError> {
    let handle = spawn_clone(url.clone(), dest.to_path_buf(), Arc::clone(bridge), options)?;

    let outcome = Controller::new(bridge, TerminalSource::new(ctx.interactive))
        .with_poll_interval(ctx.config.poll_interval())
        .run(url.as_str(), || handle.is_finished());

    match outcome {
        Ok(ControllerOutcome::Finished { answered }) => debug!(answered, "controller finished"),
        Ok(ControllerOutcome::Cancelled) => debug!("credential request declined"),
        Err(e) => *prompt_failure = Some(e),
    }

    handle.join()
}

fn isolated_to_anyhow(err: IsolatedError<CloneError>) -> anyhow::Error {
    match err {
        IsolatedError::Operation(e) => e.into(),
        IsolatedError::Isolation(e) => {
            let scopes = e.unrestored_scopes();
            let err = anyhow::Error::from(e);
            if scopes.is_empty() {
                err
            } else {
                err.context(restore_hint(&scopes))
            }
        }
        IsolatedError::Both { operation, restore } => {
            let hint = restore_hint(&restore.unrestored_scopes());
            anyhow::Error::from(operation).context(format!("{} ({})", hint, restore))
        }
    }
}

fn restore_hint(scopes: &[ConfigScope]) -> String {
    let names: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
    format!(
        "credential.helper could not be restored for: {}; check `git config --{} --get-all credential.helper`",
        names.join(", "),
        names.first().copied().unwrap_or("global")
    )
}

fn report_success(ctx: &Context, report: &CloneReport) {
    let verbosity = ctx.verbosity();
    if report.used_credential_helper {
        output::print("Credentials supplied by a git credential helper.", verbosity);
    } else if report.challenged {
        output::print("Authenticated.", verbosity);
    }
    output::print(format!("Cloned into '{}'.", report.path.display()), verbosity);
}
