//! CLI command implementations

pub mod history;
pub mod init;
pub mod label;
pub mod log;
pub mod purge;
pub mod show;
pub mod snapshot;
pub mod status;
