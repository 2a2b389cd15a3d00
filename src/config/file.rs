//! Configuration file discovery and loading

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::AppConfig;
use crate::discovery::OrderError;
use crate::filter::FilterError;

/// Searched in order; the first existing file wins
const CONFIG_LOCATIONS: &[&str] = &[
    "./bdd-report.yaml",
    "./bdd-report.yml",
    "./bdd-report.json",
    "./.bdd-report.yaml",
    "./.bdd-report/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Unknown log level '{0}'. Should be one of trace, debug, info, warn, error")]
    LogLevel(String),

    #[error("Channel capacity must be at least 1")]
    ChannelCapacity,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub app: AppConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
        }
    }
}

impl ConfigFile {
    /// Project-local locations first, then the user config directory
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .chain(user_config_path())
            .find(|path| path.exists())
    }

    /// Load the first config file found, or defaults when there is none
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::find() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let parsed = if is_yaml_file(path) {
            serde_yaml::from_str::<Self>(&content).map_err(|e| e.to_string())
        } else {
            serde_json::from_str::<Self>(&content).map_err(|e| e.to_string())
        };
        let config = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(ConfigError::UnsupportedVersion(self.version.clone()));
        }
        self.app.validate()
    }

    /// Starting point written by `config init`
    pub fn example() -> Self {
        Self {
            version: default_version(),
            app: AppConfig {
                order: "random".to_string(),
                tags: "not @wip".to_string(),
                log_level: "info".to_string(),
                ..Default::default()
            },
        }
    }
}

/// `<config dir>/bdd-report/config.yaml`
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bdd-report").join("config.yaml"))
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_default() {
        let config = ConfigFile::default();
        assert_eq!(config.version, "1.0");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_save_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let config = ConfigFile::example();

        for name in ["config.yaml", "nested/config.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            let loaded = ConfigFile::load(&path).unwrap();
            assert_eq!(loaded, config);
        }
    }

    #[test]
    fn test_load_rejects_unsupported_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "version: \"9.9\"\n").unwrap();
        assert!(matches!(
            ConfigFile::load(&path),
            Err(ConfigError::UnsupportedVersion(v)) if v == "9.9"
        ));
    }

    #[test]
    fn test_load_rejects_invalid_app_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "app:\n  order: sideways\n").unwrap();
        let err = ConfigFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("Unrecognized order type 'sideways'"));
    }

    #[test]
    fn test_load_reports_parse_and_read_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(ConfigFile::load(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(
            ConfigFile::load(dir.path().join("missing.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_user_config_path() {
        if let Some(path) = user_config_path() {
            assert!(path.ends_with("bdd-report/config.yaml"));
        }
    }
}
