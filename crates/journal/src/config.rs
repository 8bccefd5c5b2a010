//! History settings, read from `.lh/config.toml`

use lh_core::{CaseSensitivity, HistoryError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcsConfig {
    /// Files longer than this are recorded without their content
    #[serde(default = "default_max_content_length")]
    pub max_content_length: u64,
    /// Overrides the platform's case rule for path lookups
    #[serde(default)]
    pub case_sensitive: Option<bool>,
    /// Age after which change sets are purged
    #[serde(default = "default_purge_period_days")]
    pub purge_period_days: u32,
    #[serde(default = "default_recent_changes_limit")]
    pub recent_changes_limit: usize,
}

fn default_max_content_length() -> u64 {
    1024 * 1024
}

fn default_purge_period_days() -> u32 {
    3
}

fn default_recent_changes_limit() -> usize {
    20
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            max_content_length: default_max_content_length(),
            case_sensitive: None,
            purge_period_days: default_purge_period_days(),
            recent_changes_limit: default_recent_changes_limit(),
        }
    }
}

impl VcsConfig {
    /// Load settings from `path`; a missing file means defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text).map_err(|e| {
            HistoryError::BrokenStorage(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| HistoryError::BrokenStorage(format!("cannot encode config: {e}")))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.recent_changes_limit == 0 {
            return Err(HistoryError::BrokenStorage(
                "recent_changes_limit must be at least 1".into(),
            ));
        }
        if self.purge_period_days == 0 {
            return Err(HistoryError::BrokenStorage(
                "purge_period_days must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn case(&self) -> CaseSensitivity {
        self.case_sensitive
            .map_or_else(CaseSensitivity::platform_default, CaseSensitivity::from_flag)
    }

    pub fn purge_period_millis(&self) -> i64 {
        i64::from(self.purge_period_days) * DAY_MILLIS
    }
}
