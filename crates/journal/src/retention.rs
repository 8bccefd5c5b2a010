//! Purging change sets past their retention period

use crate::change_list::ChangeList;
use ahash::AHashSet;
use lh_core::{ContentStorage, Result, RootEntry, StoredId};
use tracing::info;

/// What a purge removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed_change_sets: usize,
    /// Blobs no longer referenced by the live tree or surviving history
    pub removed_contents: Vec<StoredId>,
}

/// Drop change sets stamped before `cutoff` and reclaim the contents only
/// they referenced.
///
/// Candidates are the blobs the removed sets mention; a candidate survives
/// when the live tree or any remaining set still refers to it. Unavailable
/// content was never stored, so it never shows up here.
pub fn purge_obsolete(
    changes: &mut ChangeList,
    root: &RootEntry,
    content: &dyn ContentStorage,
    cutoff: i64,
) -> Result<PurgeReport> {
    let removed = changes.purge_obsolete(cutoff)?;
    if removed.is_empty() {
        return Ok(PurgeReport::default());
    }

    let mut candidates = AHashSet::new();
    for set in &removed {
        set.collect_stored_ids(&mut candidates);
    }

    let mut live = root.stored_content_ids();
    for set in changes.iter() {
        set.collect_stored_ids(&mut live);
    }

    let mut removed_contents: Vec<StoredId> = candidates.difference(&live).copied().collect();
    removed_contents.sort_unstable();
    for id in &removed_contents {
        content.remove(*id)?;
    }

    info!(
        "Purged {} change sets and {} contents",
        removed.len(),
        removed_contents.len()
    );
    Ok(PurgeReport {
        removed_change_sets: removed.len(),
        removed_contents,
    })
}
