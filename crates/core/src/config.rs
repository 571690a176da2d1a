//! Engine configuration
//!
//! Loaded from TOML, e.g.:
//!
//! ```toml
//! [database]
//! path = "/var/lib/beachbook/beachbook.db"
//! busy_timeout_ms = 5000
//! journal_mode = "wal"
//!
//! [states]
//! releasing = ["cancelled", "no_show", "expired", "completed"]
//!
//! [[furniture]]
//! number = "A-01"
//! zone = "front_row"
//! furniture_type = "sunbed"
//! capacity = 2
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{NewFurniture, ReservationState};

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub states: StatesConfig,
    /// Catalog seeded by `beachbook init`
    #[serde(default)]
    pub furniture: Vec<NewFurniture>,
}

/// SQLite settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file; defaults to the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// How long `BEGIN IMMEDIATE` waits for a competing writer
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub journal_mode: JournalMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
        }
    }
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Readers never block the writer
    #[default]
    Wal,
    /// Classic rollback journal
    Delete,
}

impl JournalMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
        }
    }
}

/// Lifecycle state catalog overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatesConfig {
    /// States that free their furniture. Unset keeps the catalog as migrated.
    #[serde(default)]
    pub releasing: Option<Vec<ReservationState>>,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(releasing) = &self.states.releasing {
            if releasing.contains(&ReservationState::Confirmed) {
                return Err(Error::Validation(
                    "'confirmed' cannot be a releasing state".to_string(),
                ));
            }
        }
        let mut numbers: Vec<&str> = self.furniture.iter().map(|f| f.number.as_str()).collect();
        numbers.sort_unstable();
        if let Some(pair) = numbers.windows(2).find(|w| w[0] == w[1]) {
            return Err(Error::Validation(format!(
                "furniture number '{}' listed twice",
                pair[0]
            )));
        }
        Ok(())
    }

    /// Database file to open
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("beachbook.db")),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }
}

/// Default location of the configuration file
pub fn default_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "onyx", "beachbook").ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine data directory",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = EngineConfig::from_toml("").unwrap();
        assert!(config.database.path.is_none());
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.database.journal_mode, JournalMode::Wal);
        assert!(config.states.releasing.is_none());
        assert!(config.furniture.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[database]
path = "/tmp/beach.db"
busy_timeout_ms = 250
journal_mode = "delete"

[states]
releasing = ["cancelled", "no_show"]

[[furniture]]
number = "A-01"
zone = "front_row"
furniture_type = "sunbed"

[[furniture]]
number = "B-01"
zone = "back_row"
furniture_type = "balinese_bed"
capacity = 4
active = false
"#;
        let config = EngineConfig::from_toml(toml).unwrap();
        assert_eq!(config.database_path().unwrap(), PathBuf::from("/tmp/beach.db"));
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.database.journal_mode, JournalMode::Delete);
        assert_eq!(
            config.states.releasing,
            Some(vec![ReservationState::Cancelled, ReservationState::NoShow])
        );
        assert_eq!(config.furniture.len(), 2);
        assert_eq!(config.furniture[0].capacity, 2);
        assert!(config.furniture[0].active);
        assert_eq!(config.furniture[1].capacity, 4);
        assert!(!config.furniture[1].active);
    }

    #[test]
    fn test_unknown_state_rejected() {
        let err = EngineConfig::from_toml("[states]\nreleasing = [\"vanished\"]").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_confirmed_cannot_release() {
        let err = EngineConfig::from_toml("[states]\nreleasing = [\"confirmed\"]").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_duplicate_furniture_rejected() {
        let toml = r#"
[[furniture]]
number = "A-01"
zone = "front_row"
furniture_type = "sunbed"

[[furniture]]
number = "A-01"
zone = "back_row"
furniture_type = "sunbed"
"#;
        let err = EngineConfig::from_toml(toml).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
