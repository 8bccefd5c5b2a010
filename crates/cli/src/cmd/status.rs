//! Show history status

use crate::repo::Repo;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run() -> Result<()> {
    let repo = Repo::find()?;
    let vcs = &repo.vcs;

    let set_count = vcs.change_sets().count();
    let labels = vcs.labels();
    let mut entry_count = 0usize;
    vcs.root().walk(&mut |_, _| entry_count += 1);
    let total_size = util::dir_size(repo.store.lh_dir())?;

    println!("{}", "History Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("Repository:    {}", repo.root().display().to_string().cyan());
    println!("History root:  {}", repo.root_name());
    println!();

    println!("Latest change set:");
    match vcs.change_sets().next() {
        Some(set) => {
            println!("  ID:          {}", set.id.to_string().yellow());
            println!(
                "  Time:        {} ({})",
                util::format_relative_time(set.timestamp),
                util::format_absolute_time(set.timestamp).dimmed()
            );
            println!("  Name:        {}", set.name.as_deref().unwrap_or("(unnamed)"));
            println!("  Changes:     {}", set.changes.len());
        }
        None => println!("  {}", "No change sets yet".dimmed()),
    }
    println!();

    if !labels.is_empty() {
        println!("Labels:");
        for label in labels.iter().take(5) {
            match &label.scope {
                Some(scope) => println!("  {} {}", label.name.cyan(), format!("({})", scope).dimmed()),
                None => println!("  {}", label.name.cyan()),
            }
        }
        if labels.len() > 5 {
            println!("  ... and {} more", labels.len() - 5);
        }
        println!();
    }

    println!("Storage:");
    println!("  Change sets: {}", set_count);
    println!("  Entries:     {}", entry_count);
    println!("  Total size:  {}", util::format_size(total_size));
    println!(
        "  Purge after: {} days",
        vcs.config().purge_period_days
    );
    println!();

    if set_count == 0 {
        println!("{}", "Tip: Record the working tree with 'lh snapshot'".dimmed());
    }
    Ok(())
}
