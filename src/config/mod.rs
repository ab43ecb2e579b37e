//! Configuration management for snapwatch

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Capture loop configuration
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Snapshot storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// X11 connection configuration
    #[serde(default)]
    pub x11: X11Config,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Delay between ticks in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// 1-based monitor index to capture
    #[serde(default = "default_target")]
    pub target: usize,

    /// Begin capturing as soon as the process starts
    #[serde(default = "default_autostart")]
    pub autostart: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            target: default_target(),
            autostart: default_autostart(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Snapshot directory, relative to the working directory
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct X11Config {
    /// X display, e.g. ":0"; `$DISPLAY` when unset
    #[serde(default)]
    pub display: Option<String>,

    /// Use MIT-SHM for grabs when available
    #[serde(default = "default_use_shm")]
    pub use_shm: bool,
}

impl Default for X11Config {
    fn default() -> Self {
        Self {
            display: None,
            use_shm: default_use_shm(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture.interval_ms == 0 {
            return Err(ConfigError::Invalid("Capture interval must be non-zero"));
        }

        if self.capture.target == 0 {
            return Err(ConfigError::Invalid("Capture target index is 1-based"));
        }

        if self.storage.directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Snapshot directory must not be empty"));
        }

        Ok(())
    }
}

fn default_interval_ms() -> u64 {
    100
}

fn default_target() -> usize {
    1
}

fn default_autostart() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from("screenshots")
}

fn default_use_shm() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/snapwatch.toml")).expect("defaults");
        assert_eq!(cfg.capture.interval_ms, 100);
        assert_eq!(cfg.capture.target, 1);
        assert_eq!(cfg.storage.directory, PathBuf::from("screenshots"));
        assert!(cfg.x11.use_shm);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [capture]
            target = 2

            [x11]
            display = ":1"
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.capture.target, 2);
        assert_eq!(cfg.capture.interval_ms, 100);
        assert_eq!(cfg.x11.display.as_deref(), Some(":1"));
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut cfg = Config::default();
        cfg.capture.interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_target() {
        let mut cfg = Config::default();
        cfg.capture.target = 0;
        assert!(cfg.validate().is_err());
    }
}
