use super::Result;
use crate::error::{ConfigError, StorageError};
use dirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_CACHE_WINDOWS: usize = 8;
pub const DEFAULT_SQL_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_CELL_WIDTH: usize = 40;
pub const DEFAULT_TEXT_SAMPLE_BYTES: usize = 1024;
pub const DEFAULT_BLOB_PREVIEW_BYTES: usize = 16;
pub const DEFAULT_SQL_MAX_ROWS: usize = 1000;

const TIMEOUT_ENV: &str = "SQV_SQL_TIMEOUT_MS";

/// How total row counts are obtained for the status line.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RowCountStrategy {
    /// Cheap metadata lookup, falling back to unknown.
    #[default]
    Estimate,
    /// `COUNT(*)` honouring the active filter.
    Exact,
    /// Never count; show "≥ N" from what has been fetched.
    None,
}

/// On-disk configuration. Every key is optional.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub page_size: Option<u32>,
    pub cache_windows: Option<usize>,
    pub sql_timeout_ms: Option<u64>,
    pub max_cell_width: Option<usize>,
    pub text_sample_bytes: Option<usize>,
    pub blob_preview_bytes: Option<usize>,
    pub sql_max_rows: Option<usize>,
    pub row_count: Option<RowCountStrategy>,
}

/// Resolved, validated settings used by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub page_size: u32,
    pub cache_windows: usize,
    pub sql_timeout_ms: u64,
    pub max_cell_width: usize,
    pub text_sample_bytes: usize,
    pub blob_preview_bytes: usize,
    pub sql_max_rows: usize,
    pub row_count: RowCountStrategy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_windows: DEFAULT_CACHE_WINDOWS,
            sql_timeout_ms: DEFAULT_SQL_TIMEOUT_MS,
            max_cell_width: DEFAULT_MAX_CELL_WIDTH,
            text_sample_bytes: DEFAULT_TEXT_SAMPLE_BYTES,
            blob_preview_bytes: DEFAULT_BLOB_PREVIEW_BYTES,
            sql_max_rows: DEFAULT_SQL_MAX_ROWS,
            row_count: RowCountStrategy::default(),
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields an empty config.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => Self::config_file_path()?,
        };

        if !config_path.exists() {
            log::debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|source| StorageError::FileIo {
            path: config_path.to_string_lossy().to_string(),
            source,
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|e| StorageError::ConfigParseError {
                message: format!("{}: {}", config_path.display(), e),
            })?;

        Ok(config)
    }

    pub fn save(&self, path: Option<PathBuf>) -> Result<()> {
        let config_path = match path {
            Some(p) => p,
            None => Self::config_file_path()?,
        };

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::FileIo {
                path: parent.to_string_lossy().to_string(),
                source,
            })?;
        }

        let toml_content = toml::to_string(self).map_err(|e| StorageError::ConfigParseError {
            message: e.to_string(),
        })?;

        fs::write(&config_path, toml_content).map_err(|source| StorageError::FileIo {
            path: config_path.to_string_lossy().to_string(),
            source,
        })?;

        Ok(())
    }

    /// `config.toml` inside `dir`.
    pub fn file_in(dir: &Path) -> PathBuf {
        dir.join("config.toml")
    }

    fn config_file_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().ok_or(StorageError::ConfigDirNotFound)?;
        Ok(Self::file_in(&home_dir.join(".config").join("sqv")))
    }

    /// Resolve to concrete settings, applying the environment override for
    /// the SQL timeout when the file leaves it unset.
    pub fn settings(&self) -> std::result::Result<Settings, ConfigError> {
        let env_timeout = std::env::var(TIMEOUT_ENV).ok();
        self.settings_with_env(env_timeout.as_deref())
    }

    fn settings_with_env(
        &self,
        env_timeout: Option<&str>,
    ) -> std::result::Result<Settings, ConfigError> {
        let defaults = Settings::default();

        let page_size = self.page_size.unwrap_or(defaults.page_size);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(invalid(
                "page_size",
                page_size,
                &format!("must be between 1 and {}", MAX_PAGE_SIZE),
            ));
        }

        let cache_windows = self.cache_windows.unwrap_or(defaults.cache_windows);
        if cache_windows == 0 {
            return Err(invalid("cache_windows", cache_windows, "must be at least 1"));
        }

        let sql_timeout_ms = match (self.sql_timeout_ms, env_timeout) {
            (Some(ms), _) => ms,
            (None, Some(raw)) => raw.trim().parse::<u64>().map_err(|_| {
                invalid(TIMEOUT_ENV, raw, "must be a whole number of milliseconds")
            })?,
            (None, None) => defaults.sql_timeout_ms,
        };
        if sql_timeout_ms == 0 {
            return Err(invalid("sql_timeout_ms", sql_timeout_ms, "must be at least 1"));
        }

        let max_cell_width = self.max_cell_width.unwrap_or(defaults.max_cell_width);
        if max_cell_width < 4 {
            return Err(invalid("max_cell_width", max_cell_width, "must be at least 4"));
        }

        let text_sample_bytes = self.text_sample_bytes.unwrap_or(defaults.text_sample_bytes);
        if text_sample_bytes == 0 {
            return Err(invalid(
                "text_sample_bytes",
                text_sample_bytes,
                "must be at least 1",
            ));
        }

        let sql_max_rows = self.sql_max_rows.unwrap_or(defaults.sql_max_rows);
        if sql_max_rows == 0 {
            return Err(invalid("sql_max_rows", sql_max_rows, "must be at least 1"));
        }

        Ok(Settings {
            page_size,
            cache_windows,
            sql_timeout_ms,
            max_cell_width,
            text_sample_bytes,
            blob_preview_bytes: self.blob_preview_bytes.unwrap_or(defaults.blob_preview_bytes),
            sql_max_rows,
            row_count: self.row_count.unwrap_or(defaults.row_count),
        })
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default_resolves_to_default_settings() {
        let config = Config::default();
        let settings = config
            .settings_with_env(None)
            .expect("defaults are valid");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.page_size, 200);
        assert_eq!(settings.cache_windows, 8);
        assert_eq!(settings.row_count, RowCountStrategy::Estimate);
    }

    #[test]
    fn test_config_load_save() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config_path = Config::file_in(&temp_dir.path().join("nested"));

        let config = Config {
            page_size: Some(50),
            cache_windows: Some(2),
            row_count: Some(RowCountStrategy::Exact),
            ..Config::default()
        };

        config
            .save(Some(config_path.clone()))
            .expect("Failed to save config");

        let loaded_config = Config::load(Some(config_path)).expect("Failed to load config");
        assert_eq!(loaded_config, config);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = Config::load(Some(temp_dir.path().join("missing.toml")))
            .expect("Failed to load default config");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_parses_partial_toml() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "page_size = 25\nrow_count = \"none\"\n").expect("write");

        let config = Config::load(Some(path)).expect("load");
        assert_eq!(config.page_size, Some(25));
        assert_eq!(config.row_count, Some(RowCountStrategy::None));
        assert_eq!(config.cache_windows, None);
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "page_size = [oops").expect("write");

        let err = Config::load(Some(path)).unwrap_err();
        assert!(matches!(err, StorageError::ConfigParseError { .. }));
    }

    #[test]
    fn test_settings_validation() {
        let too_big = Config {
            page_size: Some(MAX_PAGE_SIZE + 1),
            ..Config::default()
        };
        assert!(too_big.settings_with_env(None).is_err());

        let zero_cache = Config {
            cache_windows: Some(0),
            ..Config::default()
        };
        match zero_cache.settings_with_env(None) {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "cache_windows"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_timeout_env_override() {
        let config = Config::default();
        let settings = config.settings_with_env(Some("750")).expect("settings");
        assert_eq!(settings.sql_timeout_ms, 750);

        let explicit = Config {
            sql_timeout_ms: Some(100),
            ..Config::default()
        };
        let settings = explicit.settings_with_env(Some("750")).expect("settings");
        assert_eq!(settings.sql_timeout_ms, 100);

        assert!(config.settings_with_env(Some("soon")).is_err());
    }
}
