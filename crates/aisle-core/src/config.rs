//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/aisle/config.toml)
//! 3. Environment variables (AISLE_* prefix)
//!
//! Environment variables take precedence over config file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix
const ENV_PREFIX: &str = "AISLE";

/// Default pause between an import committing and its completion events
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Errors raised while loading or saving configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown config key '{0}'. Valid keys: data_dir, sync_path, settle_delay_ms, log_file")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (Automerge doc, SQLite db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Shared document file that `sync` merges with (optional)
    #[serde(default)]
    pub sync_path: Option<PathBuf>,

    /// Milliseconds to wait after an import before announcing it
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Write logs here instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sync_path: None,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            log_file: None,
        }
    }
}

impl Config {
    /// Configuration rooted at `data_dir` with everything else defaulted
    ///
    /// The settle delay is zero so callers (tests, scripts) don't wait.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            settle_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (AISLE_DATA_DIR, AISLE_SYNC_PATH, ...)
    /// 2. Config file (~/.config/aisle/config.toml or AISLE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self, ConfigError> {
        let mut config: Config =
            toml::from_str(toml_content).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<string>"),
                source,
            })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty string clears it
        if let Ok(val) = std::env::var(format!("{}_SYNC_PATH", ENV_PREFIX)) {
            self.sync_path = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        if let Ok(val) = std::env::var(format!("{}_SETTLE_DELAY_MS", ENV_PREFIX)) {
            match val.parse() {
                Ok(ms) => self.settle_delay_ms = ms,
                Err(_) => tracing::warn!(value = %val, "ignoring invalid AISLE_SETTLE_DELAY_MS"),
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Set a single key by name, as `aisle config set` does
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let optional_path = |value: &str| {
            if value.is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            }
        };

        match key {
            "data_dir" => self.data_dir = PathBuf::from(value),
            "sync_path" => self.sync_path = optional_path(value),
            "log_file" => self.log_file = optional_path(value),
            "settle_delay_ms" => {
                self.settle_delay_ms = value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with AISLE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aisle")
            .join("config.toml")
    }

    /// Get the path to the Automerge document file
    pub fn automerge_path(&self) -> PathBuf {
        self.data_dir.join("shopping.automerge")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("shopping.db")
    }

    /// Settle delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aisle")
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "AISLE_DATA_DIR",
        "AISLE_SYNC_PATH",
        "AISLE_SETTLE_DELAY_MS",
        "AISLE_LOG_FILE",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.sync_path.is_none());
        assert!(config.log_file.is_none());
        assert_eq!(config.settle_delay_ms, 500);
        assert!(config.data_dir.ends_with("aisle"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::with_data_dir("/data/aisle");
        assert!(config.automerge_path().ends_with("shopping.automerge"));
        assert!(config.sqlite_path().ends_with("shopping.db"));
        assert_eq!(config.settle_delay(), Duration::ZERO);
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("AISLE_DATA_DIR", "/tmp/aisle-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/aisle-test"));
    }

    #[test]
    fn test_env_override_sync_path() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("AISLE_SYNC_PATH", "/mnt/shared/shopping.automerge");
        config.apply_env_overrides();
        assert_eq!(
            config.sync_path,
            Some(PathBuf::from("/mnt/shared/shopping.automerge"))
        );

        env::set_var("AISLE_SYNC_PATH", "");
        config.apply_env_overrides();
        assert!(config.sync_path.is_none());
    }

    #[test]
    fn test_env_override_settle_delay() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("AISLE_SETTLE_DELAY_MS", "25");
        config.apply_env_overrides();
        assert_eq!(config.settle_delay_ms, 25);

        // Garbage leaves the previous value alone
        env::set_var("AISLE_SETTLE_DELAY_MS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.settle_delay_ms, 25);
    }

    #[test]
    fn test_set_keys() {
        let mut config = Config::default();

        config.set("sync_path", "/shared/list.automerge").unwrap();
        assert_eq!(
            config.sync_path,
            Some(PathBuf::from("/shared/list.automerge"))
        );

        config.set("settle_delay_ms", "0").unwrap();
        assert_eq!(config.settle_delay_ms, 0);

        assert!(matches!(
            config.set("settle_delay_ms", "-1"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("favorite_aisle", "3"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::with_data_dir("/data/aisle");
        config.log_file = Some(PathBuf::from("/var/log/aisle.log"));
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, PathBuf::from("/data/aisle"));
        assert_eq!(loaded.log_file, config.log_file);
        assert_eq!(loaded.settle_delay_ms, 0);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            sync_path = "/shared/shopping.automerge"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(
            config.sync_path,
            Some(PathBuf::from("/shared/shopping.automerge"))
        );
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
    }

    #[test]
    fn test_load_from_str_rejects_bad_toml() {
        let _guard = EnvGuard::new(ENV_VARS);
        assert!(matches!(
            Config::load_from_str("data_dir = ["),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(config.sync_path.is_none());
        assert_eq!(config.settle_delay_ms, DEFAULT_SETTLE_DELAY_MS);
    }
}
