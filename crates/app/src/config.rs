use std::fmt;
use std::path::{Path, PathBuf};

use lexi_core::EngineSettings;
use serde::Deserialize;

pub const DEFAULT_DB_URL: &str = "sqlite://lexi.sqlite3";
pub const DEFAULT_USER_ID: &str = "local";

/// Contents of the optional TOML config file.
///
/// ```toml
/// database_url = "sqlite://lexi.sqlite3"
/// user_id = "ada"
///
/// [engine.session]
/// initial_lives = 3
///
/// [engine.scheduler]
/// batch_cap = 15
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub database_url: Option<String>,
    pub user_id: Option<String>,
    pub engine: EngineSettings,
}

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "cannot read config {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl FileConfig {
    /// Load `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_keeps_engine_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.engine, EngineSettings::default());
    }

    #[test]
    fn partial_tables_override_single_fields() {
        let config = FileConfig::parse(
            r#"
            user_id = "ada"

            [engine.session]
            initial_lives = 2

            [engine.scheduler]
            batch_cap = 12
            "#,
        )
        .unwrap();
        assert_eq!(config.user_id.as_deref(), Some("ada"));
        assert_eq!(config.engine.session.initial_lives(), 2);
        assert_eq!(config.engine.scheduler.batch_cap(), 12);
        assert_eq!(
            config.engine.mastery,
            lexi_core::MasterySettings::default()
        );
        assert!(config.engine.validate().is_ok());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = FileConfig::load(Some(Path::new("/nonexistent/lexi.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
