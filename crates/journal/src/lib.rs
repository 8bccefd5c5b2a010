//! Change recording and history queries
//!
//! This crate provides:
//! - Changes and change sets, applied to and reverted on the entry tree
//! - The change list, persisted one change set per block (sled embedded DB)
//! - `LocalVcs`, the recording facade with nested change sets
//! - Revisions, labels, recent changes and visitors over history
//! - Retention: purging old change sets and the contents only they used

pub mod change;
pub mod change_list;
pub mod change_set;
pub mod clock;
pub mod config;
pub mod journal;
pub mod label;
pub mod retention;
pub mod revision;
pub mod storage;
pub mod vcs;
pub mod visitor;

// Re-exports
pub use change::{Change, ChangeId, ChangeKind};
pub use change_list::ChangeList;
pub use change_set::{ChangeSet, LabelScope};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VcsConfig;
pub use journal::{ChangeListStorage, InMemoryChangeListStorage, SledChangeListStorage};
pub use label::{ByteContent, Label};
pub use retention::PurgeReport;
pub use revision::{RecentChange, Revision};
pub use storage::Storage;
pub use vcs::LocalVcs;
pub use visitor::ChangeVisitor;
