//! Put a label on the current state

use crate::repo::Repo;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(name: &str, path: Option<&Path>) -> Result<()> {
    let mut repo = Repo::find()?;
    let scope = path.map(|p| repo.history_path(p)).transpose()?;
    if let Some(scope) = &scope {
        if !repo.vcs.has_entry(scope) {
            anyhow::bail!("{} is not in history yet; run 'lh snapshot' first", scope);
        }
    }

    let label = repo
        .vcs
        .put_user_label(name, scope.as_deref())
        .context("Failed to put label")?;
    repo.vcs.save().context("Failed to save history")?;

    print!("{} {}", "Labeled".green().bold(), label.name.cyan());
    if let Some(scope) = &label.scope {
        print!(" on {}", scope);
    }
    println!();
    Ok(())
}
