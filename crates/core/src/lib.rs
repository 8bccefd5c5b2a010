//! Core types for local history
//!
//! This crate provides:
//! - Entry ids and id paths
//! - Forward-slash path helpers with configurable case sensitivity
//! - File content values and content-addressed blob storage (blake3 + zstd)
//! - The in-memory entry tree and snapshot differences
//! - The on-disk `.lh/` layout and the saved memento

pub mod blob;
pub mod content;
pub mod error;
pub mod hash;
pub mod id_path;
pub mod paths;
pub mod store;
pub mod tree;

// Re-exports
pub use blob::{ContentStorage, FileContentStorage, MemoryContentStorage, StoredId};
pub use content::{Content, ContentFactory};
pub use error::HistoryError;
pub use hash::ContentHash;
pub use id_path::{EntryId, IdPath};
pub use paths::CaseSensitivity;
pub use store::{Memento, Store};
pub use tree::{Difference, DifferenceKind, Entry, EntryKind, RootEntry};

/// Result type for history operations
pub type Result<T> = std::result::Result<T, HistoryError>;
