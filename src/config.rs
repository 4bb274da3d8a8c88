use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use crate::errors::HvcError;

// ========== Database Configuration ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file (defaults to ~/.hvcatalog/data.db3)
    pub path: Option<String>,

    /// Refuse databases written by a newer schema version
    #[serde(default = "default_check_version")]
    pub check_version: bool,
}

fn default_check_version() -> bool {
    true
}

impl DatabaseConfig {
    /// Configured database file, or `data.db3` in the data directory
    pub fn resolve_path(&self) -> Result<PathBuf, HvcError> {
        match &self.path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Ok(Config::data_dir()?.join("data.db3")),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            check_version: true,
        }
    }
}

// ========== Log Configuration ==========

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter directive, overridden by LOG_LEVEL
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ========== Root Configuration ==========

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when it is absent
    pub fn load_from(path: &Path) -> Result<Self, HvcError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| HvcError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Directory holding the configuration file and the default database
    pub fn data_dir() -> Result<PathBuf, HvcError> {
        let (var, sub) = match std::env::consts::OS {
            "windows" => ("LOCALAPPDATA", "hvcatalog"),
            "linux" | "macos" => ("HOME", ".hvcatalog"),
            other => return Err(HvcError::UnsupportedOS(other.to_string())),
        };
        let base = std::env::var(var)
            .map_err(|_| HvcError::UnavailableEnvVariable(var.to_string()))?;

        let dir = PathBuf::from(base).join(sub);
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .map_err(|_| HvcError::PathCreationFailed(dir.display().to_string()))?;
        }
        Ok(dir)
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf, HvcError> {
        Ok(Self::data_dir()?.join("config.toml"))
    }

    /// Write a sample configuration file to `path`
    pub fn create_sample(path: &Path) -> Result<(), HvcError> {
        if path.exists() {
            return Err(HvcError::Config(format!(
                "Config file already exists at {}",
                path.display()
            )));
        }

        let sample = r#"# hvcatalog Configuration File

[database]
# SQLite database file (defaults to ~/.hvcatalog/data.db3)
# path = "/home/user/.hvcatalog/data.db3"

# Refuse to start on a database migrated by a newer version
check_version = true

[log]
# Default log filter; the LOG_LEVEL environment variable takes precedence
level = "info"
"#;

        std::fs::write(path, sample)?;

        info!("Sample config created at: {}", path.display());
        Ok(())
    }
}
