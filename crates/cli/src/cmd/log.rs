//! Show change sets, newest first

use crate::repo::Repo;
use crate::util;
use anyhow::Result;
use lh_core::DifferenceKind;
use lh_journal::ChangeSet;
use owo_colors::OwoColorize;

pub fn run(limit: Option<usize>, recent: bool) -> Result<()> {
    let repo = Repo::find()?;
    let limit = limit.unwrap_or(20);

    if recent {
        return show_recent(&repo, limit);
    }

    let sets: Vec<&ChangeSet> = repo.vcs.change_sets().take(limit).collect();
    if sets.is_empty() {
        println!("{}", "No change sets yet".dimmed());
        println!("  {}", "Tip: Record one with 'lh snapshot'".dimmed());
        return Ok(());
    }

    println!("{}", "Change Sets".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for set in sets {
        let labels: Vec<&str> = set
            .changes
            .iter()
            .filter_map(|c| c.label().map(|(name, _)| name))
            .collect();
        let name = set.name.as_deref().unwrap_or("(unnamed)");

        print!(
            "{:>6}  {}  {}",
            set.id.to_string().yellow(),
            util::format_relative_time(set.timestamp).dimmed(),
            name
        );
        if !labels.is_empty() {
            print!("  {}", format!("[{}]", labels.join(", ")).cyan());
        }
        println!();
        if !set.is_labels_only() {
            println!("        {} changes", set.changes.len());
        }
    }
    Ok(())
}

fn show_recent(repo: &Repo, limit: usize) -> Result<()> {
    let recent = repo.vcs.recent_changes()?;
    if recent.is_empty() {
        println!("{}", "No recent changes".dimmed());
        return Ok(());
    }

    println!("{}", "Recent Changes".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for change in recent.iter().take(limit) {
        println!(
            "{}  {} ({})",
            change.name().cyan(),
            util::format_relative_time(change.timestamp()),
            util::format_absolute_time(change.timestamp()).dimmed()
        );
        for difference in change.differences() {
            let line = match difference.kind {
                DifferenceKind::Created => format!("  + {}", difference.path).green().to_string(),
                DifferenceKind::Deleted => format!("  - {}", difference.path).red().to_string(),
                DifferenceKind::Modified => format!("  ~ {}", difference.path).yellow().to_string(),
            };
            println!("{}", line);
        }
        println!();
    }
    Ok(())
}
