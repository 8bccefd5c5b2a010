//! The `lh` command line front end over a project's local history

pub mod cmd;
pub mod diff_utils;
pub mod locks;
pub mod repo;
pub mod snapshot;
pub mod util;
