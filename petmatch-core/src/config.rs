use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum score a candidate needs to be returned
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Requested limits above this are clamped
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Maximum number of stored records scored per query
    #[serde(default = "default_candidate_cap")]
    pub candidate_cap: usize,
}

fn default_threshold() -> f64 {
    0.7
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    50
}

fn default_candidate_cap() -> usize {
    1000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            limit: default_limit(),
            max_limit: default_max_limit(),
            candidate_cap: default_candidate_cap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    // Used when the metadata provider reports nothing (or zero)
    #[serde(default = "default_dimension")]
    pub default_width: u32,
    #[serde(default = "default_dimension")]
    pub default_height: u32,
    #[serde(default = "default_channels")]
    pub default_channels: u8,
}

fn default_dimension() -> u32 {
    100
}

fn default_channels() -> u8 {
    3
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_width: default_dimension(),
            default_height: default_dimension(),
            default_channels: default_channels(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("/var/lib/petmatch/pets")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain:
    /// 1. /etc/petmatch/petmatch.toml (system-wide)
    /// 2. ~/.config/petmatch/petmatch.toml (user)
    /// 3. Compiled defaults
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(config) = Self::load_from_path("/etc/petmatch/petmatch.toml") {
            config.validate()?;
            return Ok(config);
        }

        if let Some(home) = std::env::var_os("HOME") {
            let user_config = PathBuf::from(home)
                .join(".config")
                .join("petmatch")
                .join("petmatch.toml");
            if let Ok(config) = Self::load_from_path(&user_config) {
                config.validate()?;
                return Ok(config);
            }
        }

        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from an explicit file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_path(path)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string (not validated)
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.search.threshold) {
            return Err(ConfigError::Validation(
                "Search threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.search.limit == 0 || self.search.max_limit == 0 {
            return Err(ConfigError::Validation(
                "Search limits must be greater than 0".to_string(),
            ));
        }

        if self.search.limit > self.search.max_limit {
            return Err(ConfigError::Validation(format!(
                "Default limit {} exceeds max limit {}",
                self.search.limit, self.search.max_limit
            )));
        }

        if self.search.candidate_cap == 0 {
            return Err(ConfigError::Validation(
                "Candidate cap must be greater than 0".to_string(),
            ));
        }

        if self.extraction.default_width == 0
            || self.extraction.default_height == 0
            || self.extraction.default_channels == 0
        {
            return Err(ConfigError::Validation(
                "Extraction defaults must be non-zero".to_string(),
            ));
        }

        if self.storage.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "Database path cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.threshold, 0.7);
        assert_eq!(config.search.limit, 10);
        assert_eq!(config.search.max_limit, 50);
        assert_eq!(config.search.candidate_cap, 1000);
        assert_eq!(config.extraction.default_width, 100);
        assert_eq!(config.extraction.default_channels, 3);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [search]
            threshold = 0.5

            [storage]
            database_path = "/tmp/pets"
            "#,
        )
        .unwrap();

        assert_eq!(config.search.threshold, 0.5);
        assert_eq!(config.search.limit, 10);
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/pets"));
        assert_eq!(config.extraction.default_height, 100);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.search.threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_rejects_limit_above_max() {
        let mut config = Config::default();
        config.search.limit = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_extraction_default() {
        let mut config = Config::default();
        config.extraction.default_height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("petmatch.toml");
        std::fs::write(&path, "[search]\nlimit = 5\n").unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.search.limit, 5);

        std::fs::write(&path, "[search]\nlimit = 0\n").unwrap();
        assert!(Config::load_file(&path).is_err());
    }
}
