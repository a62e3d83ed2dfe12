//! Configuration management for Basecoin

use crate::error::AppError;
use crate::persistence::{InMemoryPersistence, SqliteStateDb, StatePersistence};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file. Empty or `:memory:` keeps state in memory only.
    #[serde(default = "default_data_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub chain_id: String,
    /// Extra pre-genesis options, replayed through InitState in order.
    #[serde(default)]
    pub options: Vec<GenesisOption>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GenesisOption {
    pub key: String,
    pub value: String,
}

impl GenesisConfig {
    /// `base/chain_id` first (when set), then the configured options.
    pub fn init_options(&self) -> Vec<GenesisOption> {
        let mut options = Vec::with_capacity(self.options.len() + 1);
        if !self.chain_id.is_empty() {
            options.push(GenesisOption {
                key: "base/chain_id".to_string(),
                value: self.chain_id.clone(),
            });
        }
        options.extend(self.options.iter().cloned());
        options
    }
}

impl Config {
    pub fn is_in_memory(&self) -> bool {
        self.database.path.is_empty() || self.database.path == ":memory:"
    }

    pub fn open_persistence(&self) -> Result<Box<dyn StatePersistence>, AppError> {
        if self.is_in_memory() {
            return Ok(Box::new(InMemoryPersistence::new()));
        }
        if let Some(parent) = Path::new(&self.database.path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Box::new(SqliteStateDb::open(&self.database.path)?))
    }

    pub fn log_level(&self) -> Result<tracing::Level, AppError> {
        self.logging
            .level
            .parse()
            .map_err(|_| AppError::ConfigError(format!("invalid log level: {}", self.logging.level)))
    }

    fn validate(&self) -> Result<(), AppError> {
        self.log_level()?;
        for option in &self.genesis.options {
            if option.key.is_empty() {
                return Err(AppError::ConfigError(
                    "genesis.options entries need a key".to_string(),
                ));
            }
        }
        Ok(())
    }
}

pub fn parse_config(config_str: &str) -> Result<Config, AppError> {
    let config: Config = if config_str.trim().is_empty() {
        // Provide sane defaults when the file is absent or empty
        Config::default()
    } else {
        toml::from_str(config_str).map_err(|e| AppError::ConfigError(e.to_string()))?
    };
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: Option<&Path>) -> Result<Config, AppError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    let config_str = fs::read_to_string(path).unwrap_or_default();
    parse_config(&config_str)
}

fn default_data_path() -> String {
    "./data/state.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
