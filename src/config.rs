//! Persisted configuration
//!
//! The configuration is a JSON document in the platform's config directory.
//! A missing file is created with defaults; a file that can't be read or
//! parsed is replaced by the defaults.

use crate::batch::EngineSettings;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the configuration file
const CONFIG_FILE: &str = "config.json";

/// Errors that can occur while loading, saving or editing the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine the config directory location
    #[error("Failed to determine config directory location")]
    ConfigDirectoryNotFound,

    /// Failed to write the config file
    #[error("Failed to write config file {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to serialize the configuration
    #[error("Failed to serialize config: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// A setting name that doesn't exist
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// A value that doesn't fit the setting
    #[error("Invalid value '{value}' for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root folder for downloads
    pub download_dir: PathBuf,
    /// Automatic re-attempts of a failed transfer within one round
    pub max_retries: u32,
    /// Read/write chunk size in bytes
    pub chunk_size: usize,
    /// HTTP timeout in seconds, 0 for none
    pub timeout_seconds: u64,
    /// Parallel downloads per round
    pub max_parallel_workers: usize,
    /// Quality picked without asking when available, e.g. "1080p"
    pub preferred_quality: Option<String>,
    /// Part of a translator name picked without asking when it matches
    pub preferred_translator: Option<String>,
    /// Take the only available option without asking
    pub auto_select_single_option: bool,
    /// Return to the main menu after a URL is processed
    pub auto_reload: bool,
    /// Base URL of the content resolver service
    pub resolver_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("Videos"),
            max_retries: 3,
            chunk_size: 8192,
            timeout_seconds: 30,
            max_parallel_workers: 1,
            preferred_quality: None,
            preferred_translator: None,
            auto_select_single_option: true,
            auto_reload: true,
            resolver_url: "http://127.0.0.1:8765".to_string(),
        }
    }
}

/// Platform directories of the application.
pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "rezka-grabber", "rezka_grabber")
}

impl Config {
    /// Names of all settings, in menu order.
    pub const FIELDS: &'static [&'static str] = &[
        "download_dir",
        "max_retries",
        "chunk_size",
        "timeout_seconds",
        "max_parallel_workers",
        "preferred_quality",
        "preferred_translator",
        "auto_select_single_option",
        "auto_reload",
        "resolver_url",
    ];

    /// Default location of the config file
    ///
    /// - Linux: ~/.config/rezka_grabber/config.json
    /// - macOS: ~/Library/Application Support/org.rezka-grabber.rezka_grabber/config.json
    /// - Windows: %APPDATA%\rezka-grabber\rezka_grabber\config\config.json
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = project_dirs().ok_or(ConfigError::ConfigDirectoryNotFound)?;
        Ok(dirs.config_dir().join(CONFIG_FILE))
    }

    /// Loads the configuration at `path`, creating or repairing the file
    pub fn load_or_init(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            tracing::info!("created default config at {}", path.display());
            return Ok(config);
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<Self>(&content).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(config) => Ok(config),
            Err(reason) => {
                tracing::warn!(
                    "config at {} is unusable ({}), replacing it with defaults",
                    path.display(),
                    reason
                );
                let config = Self::default();
                config.save(path)?;
                Ok(config)
            }
        }
    }

    /// Writes the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Current value of a setting as text, for display.
    pub fn get_field(&self, name: &str) -> Result<String, ConfigError> {
        let value = match name {
            "download_dir" => self.download_dir.display().to_string(),
            "max_retries" => self.max_retries.to_string(),
            "chunk_size" => self.chunk_size.to_string(),
            "timeout_seconds" => self.timeout_seconds.to_string(),
            "max_parallel_workers" => self.max_parallel_workers.to_string(),
            "preferred_quality" => self.preferred_quality.clone().unwrap_or_default(),
            "preferred_translator" => self.preferred_translator.clone().unwrap_or_default(),
            "auto_select_single_option" => self.auto_select_single_option.to_string(),
            "auto_reload" => self.auto_reload.to_string(),
            "resolver_url" => self.resolver_url.clone(),
            other => return Err(ConfigError::UnknownSetting(other.to_string())),
        };
        Ok(value)
    }

    /// Parses `value` and applies it to the setting `name`
    ///
    /// An empty value clears the optional preferences.
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match name {
            "download_dir" => {
                if value.is_empty() {
                    return Err(invalid("must not be empty"));
                }
                self.download_dir = PathBuf::from(value);
            }
            "max_retries" => {
                self.max_retries = value.parse().map_err(|_| invalid("expected a number"))?;
            }
            "chunk_size" => {
                self.chunk_size = parse_positive(value).ok_or_else(|| invalid("expected a number above 0"))?;
            }
            "timeout_seconds" => {
                self.timeout_seconds = value.parse().map_err(|_| invalid("expected a number"))?;
            }
            "max_parallel_workers" => {
                self.max_parallel_workers =
                    parse_positive(value).ok_or_else(|| invalid("expected a number above 0"))?;
            }
            "preferred_quality" => self.preferred_quality = optional(value),
            "preferred_translator" => self.preferred_translator = optional(value),
            "auto_select_single_option" => {
                self.auto_select_single_option =
                    parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
            }
            "auto_reload" => {
                self.auto_reload = parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
            }
            "resolver_url" => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(invalid("expected an http:// or https:// URL"));
                }
                self.resolver_url = value.to_string();
            }
            other => return Err(ConfigError::UnknownSetting(other.to_string())),
        }

        Ok(())
    }

    /// HTTP timeout, `None` when disabled.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_retries: self.max_retries,
            workers: self.max_parallel_workers.max(1),
        }
    }
}

fn parse_positive(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|n| *n > 0)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = Config::default();
        assert_eq!(config.download_dir, PathBuf::from("Videos"));
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(config.max_parallel_workers, 1);
        assert!(config.auto_select_single_option);
        assert!(config.preferred_quality.is_none());
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config, Config::default());

        let written: Config = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, Config::default());
    }

    #[test]
    fn test_corrupt_file_replaced_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config, Config::default());

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"download_dir\""));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"preferred_quality": "1080p", "max_parallel_workers": 3}"#).unwrap();

        let config = Config::load_or_init(&path).unwrap();
        assert_eq!(config.preferred_quality.as_deref(), Some("1080p"));
        assert_eq!(config.max_parallel_workers, 3);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.resolver_url, "http://127.0.0.1:8765");
    }

    #[test]
    fn test_set_field() {
        let mut config = Config::default();

        config.set_field("preferred_translator", " LostFilm ").unwrap();
        assert_eq!(config.preferred_translator.as_deref(), Some("LostFilm"));
        config.set_field("preferred_translator", "").unwrap();
        assert!(config.preferred_translator.is_none());

        config.set_field("auto_reload", "no").unwrap();
        assert!(!config.auto_reload);

        config.set_field("timeout_seconds", "0").unwrap();
        assert_eq!(config.timeout(), None);

        assert!(matches!(
            config.set_field("chunk_size", "0"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set_field("max_retries", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set_field("resolver_url", "ftp://x"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set_field("colour", "red"),
            Err(ConfigError::UnknownSetting(_))
        ));
    }

    #[test]
    fn test_every_field_is_readable() {
        let config = Config::default();
        for name in Config::FIELDS {
            assert!(config.get_field(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_engine_settings_clamps_workers() {
        let mut config = Config::default();
        config.max_parallel_workers = 0;
        assert_eq!(config.engine_settings().workers, 1);
    }
}
