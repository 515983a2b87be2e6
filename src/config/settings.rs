//! TOML-based configuration for relgraph.
//!
//! Supports a config file (relgraph.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! dialect = "postgres"
//! schema = "cases"        # "" disables the qualifier
//!
//! [database]
//! driver = "sqlite"
//! path = "${RELGRAPH_DB}"
//!
//! [pool]
//! max_connections = 10
//! acquire_timeout = "2s"
//! idle_timeout = "30s"
//!
//! [execution]
//! request_timeout = "30s"
//! max_depth = 8
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::connection::{ConnectionConfig, ConnectionError, Driver, DEFAULT_SCHEMA};
use crate::executor::PoolConfig;
use crate::planner::DEFAULT_MAX_DEPTH;
use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid duration format: {0}")]
    InvalidDuration(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// SQL dialect: postgres, mysql or sqlite.
    pub dialect: String,

    /// Schema qualifier for table names. Empty disables qualification.
    pub schema: String,

    pub database: DatabaseSettings,

    pub pool: PoolSettings,

    pub execution: ExecutionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dialect: Dialect::default().to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            database: DatabaseSettings::default(),
            pool: PoolSettings::default(),
            execution: ExecutionSettings::default(),
        }
    }
}

/// Database backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database driver (sqlite is the executable backend).
    pub driver: String,

    /// Database file path (supports ${ENV_VAR} expansion).
    pub path: Option<String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            driver: "sqlite".to_string(),
            path: None,
        }
    }
}

impl DatabaseSettings {
    /// Get the driver type.
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        Driver::from_str(&self.driver)
            .map_err(|_| SettingsError::UnsupportedDriver(self.driver.clone()))
    }

    /// Get the path with environment variables expanded.
    pub fn resolved_path(&self) -> Result<Option<String>, SettingsError> {
        self.path.as_deref().map(expand_env_vars).transpose()
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Maximum number of open connections.
    pub max_connections: usize,

    /// How long to wait for a free connection (e.g., "2s", "500ms").
    pub acquire_timeout: String,

    /// How long an idle connection is kept (e.g., "30s", "1m").
    pub idle_timeout: String,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: "2s".to_string(),
            idle_timeout: "30s".to_string(),
        }
    }
}

impl PoolSettings {
    pub fn to_pool_config(&self) -> Result<PoolConfig, SettingsError> {
        if self.max_connections == 0 {
            return Err(SettingsError::InvalidConfig(
                "pool.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(PoolConfig {
            max_connections: self.max_connections,
            acquire_timeout: parse_duration(&self.acquire_timeout)?,
            idle_timeout: parse_duration(&self.idle_timeout)?,
        })
    }
}

/// Request execution settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Deadline for a whole request (e.g., "30s"). "0s" disables it.
    pub request_timeout: String,

    /// Maximum relation nesting of a selection.
    pub max_depth: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            request_timeout: "30s".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ExecutionSettings {
    pub fn request_timeout(&self) -> Result<Option<Duration>, SettingsError> {
        let timeout = parse_duration(&self.request_timeout)?;
        Ok((!timeout.is_zero()).then_some(timeout))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `RELGRAPH_CONFIG`
    /// 2. `./relgraph.toml`
    /// 3. `~/.config/relgraph/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("RELGRAPH_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("relgraph.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("relgraph").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    pub fn dialect(&self) -> Result<Dialect, SettingsError> {
        self.dialect.parse().map_err(SettingsError::InvalidConfig)
    }

    /// The schema qualifier, if enabled.
    pub fn schema(&self) -> Option<&str> {
        Some(self.schema.as_str()).filter(|s| !s.is_empty())
    }

    /// The configured database, falling back to the `DB_*` environment.
    pub fn connection(&self) -> Result<ConnectionConfig, SettingsError> {
        match self.database.resolved_path()? {
            Some(path) => {
                let driver = self.database.driver_type()?;
                if driver != Driver::Sqlite {
                    return Err(SettingsError::InvalidConfig(format!(
                        "database.path applies to sqlite, not {}",
                        driver.as_str()
                    )));
                }
                let mut config = ConnectionConfig::sqlite(path);
                config.schema = self.schema().map(String::from);
                Ok(config)
            }
            None => Ok(ConnectionConfig::from_env()?),
        }
    }
}

/// Parse a duration such as `"500ms"`, `"2s"`, `"5m"` or `"1h"`.
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, SettingsError> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let amount: u64 = digits
        .parse()
        .map_err(|_| SettingsError::InvalidDuration(s.to_string()))?;

    match unit.trim() {
        "ms" => Ok(Duration::from_millis(amount)),
        "" | "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount * 60)),
        "h" => Ok(Duration::from_secs(amount * 3600)),
        _ => Err(SettingsError::InvalidDuration(s.to_string())),
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let var_name: String = if chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut name = String::new();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                name.push(ch);
            }
            name
        } else {
            // $VAR ends at the first non-alphanumeric/underscore
            let mut name = String::new();
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                name.push(ch);
            }
            if name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
            name
        };

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
