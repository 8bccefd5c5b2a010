//! Show the revisions of one file or directory

use crate::repo::Repo;
use crate::util;
use anyhow::{Context, Result};
use lh_core::Content;
use lh_journal::LabelScope;
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    let repo = Repo::find()?;
    let history_path = repo.history_path(path)?;
    let revisions = repo
        .vcs
        .revisions_in_scope(&history_path, LabelScope::Path(&history_path))
        .with_context(|| format!("No history for {}", path.display()))?;

    println!("{} {}", "History of".bold(), history_path.cyan());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if revisions.is_empty() {
        println!("{}", "No revisions recorded".dimmed());
        return Ok(());
    }

    for revision in &revisions {
        let name = revision.name.as_deref().unwrap_or("(unnamed)");
        print!(
            "{:>6}  {} ({})  {}",
            revision.change_set_id.to_string().yellow(),
            util::format_relative_time(revision.timestamp),
            util::format_absolute_time(revision.timestamp).dimmed(),
            name
        );
        if let Some(label) = &revision.label {
            print!("  {}", format!("[{}]", label).cyan());
        }
        println!();

        match revision.entry.content() {
            Some(Content::Unavailable) => println!("        {}", "content not kept".dimmed()),
            Some(content) => {
                if let Some(len) = content.len() {
                    println!("        {}", util::format_size(len).dimmed());
                }
            }
            None => {}
        }
        if revision.path != history_path {
            println!("        {} {}", "was".dimmed(), revision.path);
        }
    }
    println!();
    println!(
        "{}",
        "Tip: Print a revision with 'lh show <path> --at <id>'".dimmed()
    );
    Ok(())
}
