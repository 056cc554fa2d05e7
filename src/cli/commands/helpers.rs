//! helpers command - Show configured git credential helpers

use std::collections::BTreeMap;

use anyhow::{Context as _, Result};

use crate::cli::Context;
use crate::git::{ConfigScope, ConfigStore, GitConfigStore, CREDENTIAL_HELPER_KEY};
use crate::ui::output;

/// List `credential.helper` at the system and global scopes.
pub fn list(ctx: &Context, json: bool) -> Result<()> {
    let store = GitConfigStore::new();
    let helpers = collect(&store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&helpers)?);
        return Ok(());
    }

    let verbosity = ctx.verbosity();
    for (scope, values) in &helpers {
        output::print(output::format_helpers(scope, values), verbosity);
    }
    Ok(())
}

fn collect(store: &dyn ConfigStore) -> Result<BTreeMap<ConfigScope, Vec<String>>> {
    ConfigScope::ALL
        .iter()
        .map(|&scope| {
            store
                .read_all(scope, CREDENTIAL_HELPER_KEY)
                .with_context(|| format!("cannot read {} credential helpers", scope))
                .map(|values| (scope, values))
        })
        .collect()
}
