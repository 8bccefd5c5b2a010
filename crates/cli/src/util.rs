//! Path and formatting helpers shared by the commands

use anyhow::{Context, Result};
use lh_core::store::HISTORY_DIR;
use std::path::{Component, Path, PathBuf};

/// Find repository root by walking up from cwd to find .lh/
pub fn find_repo_root() -> Result<PathBuf> {
    let current = std::env::current_dir().context("Failed to get current directory")?;
    find_repo_root_from(&current)
}

pub fn find_repo_root_from(start: &Path) -> Result<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(HISTORY_DIR).is_dir() {
            return Ok(current);
        }
        match current.parent() {
            Some(parent) => current = parent.into(),
            None => anyhow::bail!("Not a local history repository (no {} directory found)", HISTORY_DIR),
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem, so paths of
/// deleted files still resolve
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Forward-slash form of a path relative to the repository root
pub fn relative_slash_path(repo_root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(repo_root)
        .with_context(|| format!("{} is outside the repository", path.display()))?;
    let segments: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(segments.join("/"))
}

/// Units for [`format_relative_time`], largest first
const RELATIVE_UNITS: [(i64, &str); 4] = [
    (7 * 24 * 3600, "weeks"),
    (24 * 3600, "days"),
    (3600, "hours"),
    (60, "minutes"),
];

/// Age of a millisecond timestamp in words ("2 hours ago")
pub fn format_relative_time(ts_ms: i64) -> String {
    let now_ms = lh_journal::Clock::now(&lh_journal::SystemClock);
    let age = (now_ms - ts_ms) / 1000;
    if age < 0 {
        return "in the future".to_string();
    }
    RELATIVE_UNITS
        .iter()
        .find(|(unit, _)| age >= *unit)
        .map(|(unit, name)| format!("{} {} ago", age / unit, name))
        .unwrap_or_else(|| format!("{} seconds ago", age))
}

/// UTC calendar time of a millisecond timestamp ("2024-01-03 14:30:00")
pub fn format_absolute_time(ts_ms: i64) -> String {
    let secs = ts_ms.max(0) / 1000;
    let (year, month, day) = civil_from_days(secs / 86400);
    let time_of_day = secs % 86400;
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02}",
        time_of_day / 3600,
        time_of_day / 60 % 60,
        time_of_day % 60
    )
}

/// Days since 1970-01-01 to a (year, month, day) date, after
/// http://howardhinnant.github.io/date_algorithms.html
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// Byte count with a binary unit ("1.50 KB")
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = None;
    for name in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = Some(name);
    }
    match unit {
        Some(name) => format!("{:.2} {}", value, name),
        None => format!("{} B", bytes),
    }
}

/// Total size of the files below `dir`
pub fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
        assert_eq!(format_size(1 << 30), "1.00 GB");
    }

    #[test]
    fn test_format_absolute_time() {
        assert_eq!(format_absolute_time(0), "1970-01-01 00:00:00");
        assert_eq!(format_absolute_time(1_704_292_200_000), "2024-01-03 14:30:00");
    }

    #[test]
    fn test_relative_time_picks_largest_unit() {
        let now_ms = lh_journal::Clock::now(&lh_journal::SystemClock);
        assert!(format_relative_time(now_ms).contains("seconds ago"));
        assert!(format_relative_time(now_ms - 3600 * 1000).contains("hour"));
        assert!(format_relative_time(now_ms - 86400 * 1000).contains("day"));
        assert!(format_relative_time(now_ms - 14 * 86400 * 1000).starts_with("2 weeks"));
        assert_eq!(format_relative_time(now_ms + 60_000), "in the future");
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
    }

    #[test]
    fn test_relative_slash_path() {
        let root = Path::new("/repo");
        assert_eq!(
            relative_slash_path(root, Path::new("/repo/src/main.rs")).unwrap(),
            "src/main.rs"
        );
        assert_eq!(relative_slash_path(root, root).unwrap(), "");
        assert!(relative_slash_path(root, Path::new("/other")).is_err());
    }

    #[test]
    fn test_find_repo_root_from_subdirectory() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(temp_dir.path().join(HISTORY_DIR)).unwrap();
        let nested = temp_dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_repo_root_from(&nested).unwrap(), temp_dir.path());
    }
}
