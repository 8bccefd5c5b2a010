//! Start keeping local history in a directory

use anyhow::{Context, Result};
use lh_core::store::{Store, HISTORY_DIR};
use lh_core::HistoryError;
use lh_journal::VcsConfig;
use owo_colors::OwoColorize;
use std::env;
use std::path::Path;

pub fn run() -> Result<()> {
    let current_dir = env::current_dir()?;
    init_at(&current_dir)?;

    println!("Initialized local history at {}", current_dir.display().to_string().cyan());
    println!();
    println!("Created {}/ directory structure:", HISTORY_DIR);
    println!("  - {}/config.toml     (history settings)", HISTORY_DIR);
    println!("  - {}/content/        (file content storage)", HISTORY_DIR);
    println!("  - {}/changes/        (change sets)", HISTORY_DIR);
    println!("  - {}/locks/          (writer lock)", HISTORY_DIR);
    println!();
    println!("Next steps:");
    println!("  - Run 'lh snapshot' to record the working tree");
    println!("  - Run 'lh status' to check history status");
    Ok(())
}

/// Create the history layout and default settings under `project_root`
pub fn init_at(project_root: &Path) -> Result<Store> {
    let store = match Store::init(project_root) {
        Ok(store) => store,
        Err(HistoryError::DuplicateEntry(_)) => anyhow::bail!(
            "Local history already initialized at {}",
            project_root.join(HISTORY_DIR).display()
        ),
        Err(e) => return Err(e).context("Failed to create history store"),
    };
    VcsConfig::default()
        .save(&store.config_path())
        .context("Failed to write default settings")?;
    tracing::info!("Initialized history in {}", project_root.display());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_default_config() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = init_at(temp_dir.path()).unwrap();
        let config = VcsConfig::load(&store.config_path()).unwrap();
        assert_eq!(config, VcsConfig::default());
    }

    #[test]
    fn test_init_twice_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        init_at(temp_dir.path()).unwrap();
        let err = init_at(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("already initialized"));
    }
}
