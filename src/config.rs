use crate::storage::{project_dirs, StorageError};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("utc offset out of range: {0} minutes")]
    Offset(i32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// YAML note file; `None` uses the platform data directory.
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
    },
    Http {
        base_url: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_id: String,
    pub log_level: String,
    pub utc_offset_minutes: i32,
    pub reconcile_delay_secs: u64,
    pub backend: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            user_id: "local".into(),
            log_level: "info".into(),
            utc_offset_minutes: 0,
            reconcile_delay_secs: 3,
            backend: BackendConfig::File { path: None },
        }
    }
}

/// Command-line values that win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub board: Option<PathBuf>,
    pub user: Option<String>,
}

impl Config {
    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .ok_or(ConfigError::Offset(self.utc_offset_minutes))
    }

    pub fn reconcile_delay(&self) -> Duration {
        Duration::from_secs(self.reconcile_delay_secs)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(user) = overrides.user {
            self.user_id = user;
        }
        if let Some(url) = overrides.url {
            self.backend = BackendConfig::Http { base_url: url };
        } else if let Some(board) = overrides.board {
            self.backend = BackendConfig::File { path: Some(board) };
        }
    }
}

pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    Ok(project_dirs()?.config_dir().join("config.yml"))
}

/// Reads the config at `path`, writing the defaults first when it is missing.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if path.exists() {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return serde_yaml::from_str(&data).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        });
    }
    let config = Config::default();
    save_config(path, &config)?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let serialized = serde_yaml::to_string(config).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, serialized).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let config = load_config(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(
            &path,
            "user_id: alice\nbackend:\n  kind: http\n  base_url: http://localhost:8080\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.user_id, "alice");
        assert_eq!(config.log_level, "info");
        assert_eq!(
            config.backend,
            BackendConfig::Http {
                base_url: "http://localhost:8080".into()
            }
        );
    }

    #[test]
    fn url_override_beats_board_override() {
        let mut config = Config::default();
        config.apply(Overrides {
            url: Some("http://api".into()),
            board: Some(PathBuf::from("/tmp/notes.yml")),
            user: Some("bob".into()),
        });
        assert_eq!(config.user_id, "bob");
        assert!(matches!(config.backend, BackendConfig::Http { .. }));
    }

    #[test]
    fn offset_is_validated() {
        let mut config = Config::default();
        config.utc_offset_minutes = 120;
        assert_eq!(config.offset().unwrap().local_minus_utc(), 7200);
        config.utc_offset_minutes = 60 * 30;
        assert!(config.offset().is_err());
    }
}
