//! tribal.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TribalConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the embedded database.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Canonical timezone for recurring trigger expressions
    /// (e.g. "America/New_York"). DST comes from the tz database,
    /// never from ambient system time.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Cron expression (seconds field first) for the recurring draft
    /// reminder digest.
    #[serde(default = "default_reminder")]
    pub draft_reminder: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/tribal")
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_reminder() -> String {
    // Monday mornings, 9am in the canonical timezone.
    "0 0 9 * * Mon".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            draft_reminder: default_reminder(),
        }
    }
}

impl Default for TribalConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl TribalConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TribalConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
