//! Drop old change sets

use crate::repo::Repo;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

pub fn run(days: Option<u32>) -> Result<()> {
    let mut repo = Repo::find()?;
    let period = match days {
        Some(days) => i64::from(days) * DAY_MILLIS,
        None => repo.vcs.config().purge_period_millis(),
    };

    println!("{}", "Purging history...".bold());
    let before = repo.vcs.change_sets().count();
    let report = repo
        .vcs
        .purge_obsolete_and_save(period)
        .context("Failed to purge history")?;

    println!();
    println!("{}", "Purge complete".green().bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Change sets removed:  {}", report.removed_change_sets);
    println!("Change sets kept:     {}", before - report.removed_change_sets);
    println!("Contents reclaimed:   {}", report.removed_contents.len());
    Ok(())
}
