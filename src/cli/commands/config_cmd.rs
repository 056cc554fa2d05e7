//! config command - Show or set configuration values

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::config::Config;
use crate::ui::output;

/// Show the effective configuration, defaults included.
pub fn show(ctx: &Context) -> Result<()> {
    let verbosity = ctx.verbosity();
    match ctx.config.loaded_from() {
        Some(path) => output::print(format!("# {}", path.display()), verbosity),
        None => output::print("# defaults (no config file found)", verbosity),
    }
    for line in effective_lines(&ctx.config) {
        println!("{}", line);
    }
    Ok(())
}

/// Set a configuration value in the loaded file, or the write location.
pub fn set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let path = match ctx.config.loaded_from() {
        Some(path) => path.to_path_buf(),
        None => Config::write_path()?,
    };

    let mut global = ctx.config.global.clone();
    Config::set_value(&mut global, key, value)?;
    Config::write(&path, &global)
        .with_context(|| format!("Failed to save config to {}", path.display()))?;

    output::print(format!("Set {} = {}", key, value), ctx.verbosity());
    Ok(())
}

fn effective_lines(config: &Config) -> Vec<String> {
    vec![
        format!("interactive = {}", config.interactive()),
        format!("ask_timeout_secs = {}", config.ask_timeout().as_secs()),
        format!("poll_interval_ms = {}", config.poll_interval().as_millis()),
        format!(
            "credential_helpers.isolate = {}",
            config.isolate_credential_helpers()
        ),
        format!(
            "credential_helpers.use_helpers = {}",
            config.use_credential_helpers()
        ),
        format!(
            "credential_helpers.lock_timeout_secs = {}",
            config.lock_timeout().as_secs()
        ),
    ]
}
