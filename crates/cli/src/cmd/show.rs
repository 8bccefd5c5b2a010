//! Print a file as it was at a label or revision

use crate::diff_utils;
use crate::repo::Repo;
use anyhow::{Context, Result};
use lh_journal::LabelScope;
use owo_colors::OwoColorize;
use std::io::Write;
use std::path::Path;

/// Which state of the file to show
#[derive(Debug, Clone, Copy)]
pub enum Selector<'a> {
    Current,
    Label(&'a str),
    ChangeSet(i64),
}

pub fn run(
    path: &Path,
    label: Option<&str>,
    at: Option<i64>,
    show_diff: bool,
    context: usize,
) -> Result<()> {
    let repo = Repo::find()?;
    let history_path = repo.history_path(path)?;
    let selector = match (label, at) {
        (Some(name), _) => Selector::Label(name),
        (None, Some(id)) => Selector::ChangeSet(id),
        (None, None) => Selector::Current,
    };

    let bytes = select(&repo, &history_path, selector)?;

    if show_diff {
        let current = repo
            .vcs
            .current_content(&history_path)
            .with_context(|| format!("No current revision of {}", history_path))?;
        let diff = diff_utils::render_diff(bytes.as_deref(), current.as_deref(), &history_path, context);
        if diff.is_empty() {
            println!("{}", "No differences".dimmed());
        } else {
            print!("{}", diff);
        }
        return Ok(());
    }

    match bytes {
        Some(bytes) if diff_utils::is_binary(&bytes) => {
            println!("{}", format!("Binary file {} ({} bytes)", history_path, bytes.len()).dimmed());
        }
        Some(bytes) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
        None => println!("{}", "(content not available)".dimmed()),
    }
    Ok(())
}

/// Bytes of `history_path` in the chosen state; `None` when the content was
/// not kept
pub fn select(repo: &Repo, history_path: &str, selector: Selector<'_>) -> Result<Option<Vec<u8>>> {
    match selector {
        Selector::Current => repo
            .vcs
            .current_content(history_path)
            .with_context(|| format!("Cannot read {}", history_path)),
        Selector::Label(name) => {
            let scope = LabelScope::Path(history_path);
            let case = repo.vcs.root().case();
            repo.vcs
                .find_label(name)
                .ok_or_else(|| anyhow::anyhow!("Label not found: {}", name))?;
            let label = repo
                .vcs
                .labels()
                .into_iter()
                .find(|l| l.name == name && scope.sees(l.scope.as_deref(), case))
                .ok_or_else(|| anyhow::anyhow!("Label '{}' does not cover {}", name, history_path))?;
            let content = repo
                .vcs
                .label_content(&label, history_path)
                .with_context(|| format!("{} did not exist at label '{}'", history_path, name))?;
            if content.is_directory {
                anyhow::bail!("{} was a directory at label '{}'", history_path, name);
            }
            Ok(content.bytes)
        }
        Selector::ChangeSet(id) => {
            let revisions = repo
                .vcs
                .revisions_for(history_path)
                .with_context(|| format!("No history for {}", history_path))?;
            let revision = revisions
                .iter()
                .find(|r| r.change_set_id == id)
                .ok_or_else(|| anyhow::anyhow!("No revision {} of {}", id, history_path))?;
            if revision.entry.is_directory() {
                anyhow::bail!("{} is a directory", history_path);
            }
            Ok(revision.content(repo.vcs.content_storage())?)
        }
    }
}
