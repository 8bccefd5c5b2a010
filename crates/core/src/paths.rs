//! Forward-slash path helpers
//!
//! History paths are plain strings joined with `/`. Whether two names are the
//! same depends on the case sensitivity of the file system being recorded,
//! which each tree carries as a [`CaseSensitivity`] value.

use serde::{Deserialize, Serialize};

pub const DELIMITER: char = '/';

/// How path segments are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    /// Default for the platform we are running on
    pub fn platform_default() -> Self {
        if cfg!(any(target_os = "windows", target_os = "macos")) {
            Self::Insensitive
        } else {
            Self::Sensitive
        }
    }

    pub fn from_flag(case_sensitive: bool) -> Self {
        if case_sensitive {
            Self::Sensitive
        } else {
            Self::Insensitive
        }
    }

    pub fn names_equal(self, a: &str, b: &str) -> bool {
        match self {
            Self::Sensitive => a == b,
            Self::Insensitive => a.to_lowercase() == b.to_lowercase(),
        }
    }

    /// True when `path` equals `prefix` or lies underneath it
    pub fn starts_with(self, path: &str, prefix: &str) -> bool {
        if prefix.is_empty() {
            return true;
        }
        if path.len() < prefix.len() || !path.is_char_boundary(prefix.len()) {
            return false;
        }
        let (head, tail) = path.split_at(prefix.len());
        if !self.names_equal(head, prefix) {
            return false;
        }
        tail.is_empty() || tail.starts_with(DELIMITER) || prefix.ends_with(DELIMITER)
    }
}

impl Default for CaseSensitivity {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Parent part of `path`, `None` for a single segment
pub fn parent_of(path: &str) -> Option<&str> {
    match path.rfind(DELIMITER) {
        Some(0) if path.len() > 1 => Some(&path[..1]),
        Some(0) | None => None,
        Some(i) => Some(&path[..i]),
    }
}

/// Why `name` cannot name a single entry, if it cannot
pub fn name_problem(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("name is empty")
    } else if name.contains(DELIMITER) {
        Some("contains a path delimiter")
    } else if name == "." || name == ".." {
        Some("reserved name")
    } else {
        None
    }
}

/// Last segment of `path`
pub fn name_of(path: &str) -> &str {
    match path.rfind(DELIMITER) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

pub fn appended(path: &str, name: &str) -> String {
    if path.is_empty() {
        return name.to_string();
    }
    if path.ends_with(DELIMITER) {
        format!("{path}{name}")
    } else {
        format!("{path}{DELIMITER}{name}")
    }
}

/// `path` with its last segment replaced by `new_name`
pub fn renamed(path: &str, new_name: &str) -> String {
    match parent_of(path) {
        Some(parent) => appended(parent, new_name),
        None => new_name.to_string(),
    }
}

pub fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split(DELIMITER).filter(|s| !s.is_empty())
}

/// Remainder of `path` below `prefix`, if `path` is underneath it
pub fn relative<'a>(path: &'a str, prefix: &str, case: CaseSensitivity) -> Option<&'a str> {
    if !case.starts_with(path, prefix) {
        return None;
    }
    Some(path[prefix.len()..].trim_start_matches(DELIMITER))
}

/// Normalise separators coming from the host (`\` to `/`, no trailing slash)
pub fn normalize(path: &str) -> String {
    let mut result = path.replace('\\', "/");
    while result.len() > 1 && result.ends_with(DELIMITER) {
        result.pop();
    }
    result
}
