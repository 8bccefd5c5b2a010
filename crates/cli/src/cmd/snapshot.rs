//! Record the working tree as one change set

use crate::repo::Repo;
use crate::snapshot;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

/// Paths listed per kind before the rest is summarized
const SHOWN_PATHS: usize = 10;

pub fn run(message: &str) -> Result<()> {
    let mut repo = Repo::find()?;
    let work_dir = repo.root().to_path_buf();
    let root_name = repo.root_name().to_string();

    let rules = snapshot::ignore_rules(&work_dir)?;
    let report = snapshot::snapshot(&mut repo.vcs, &work_dir, &root_name, &rules, message)
        .context("Failed to record snapshot")?;

    // Saving happens as part of the purge
    let period = repo.vcs.config().purge_period_millis();
    let purged = repo
        .vcs
        .purge_obsolete_and_save(period)
        .context("Failed to save history")?;

    if report.is_empty() {
        println!("{}", "Nothing changed since the last snapshot".dimmed());
    } else {
        println!("{} {}", "Recorded".green().bold(), message.cyan());
        print_paths("+", &report.created);
        print_paths("~", &report.modified);
        print_paths("-", &report.deleted);
        println!();
        println!(
            "{} created, {} modified, {} deleted",
            report.created.len(),
            report.modified.len(),
            report.deleted.len()
        );
    }
    if purged.removed_change_sets > 0 {
        println!(
            "{}",
            format!("Purged {} old change sets", purged.removed_change_sets).dimmed()
        );
    }
    Ok(())
}

fn print_paths(marker: &str, paths: &[String]) {
    for path in paths.iter().take(SHOWN_PATHS) {
        let line = format!("  {} {}", marker, path);
        match marker {
            "+" => println!("{}", line.green()),
            "-" => println!("{}", line.red()),
            _ => println!("{}", line.yellow()),
        }
    }
    if paths.len() > SHOWN_PATHS {
        println!("    ... and {} more", paths.len() - SHOWN_PATHS);
    }
}
