//! Workflow integration tests
//!
//! Complete workflows that exercise several commands against a real
//! project directory.

pub mod edge_cases;
pub mod labels_purge;
pub mod snapshot_history;
