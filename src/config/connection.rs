//! Database connection configuration.
//!
//! Supports configuration via environment variables:
//! - `DB_DRIVER`: Database driver (postgres, mysql, sqlite; default postgres)
//! - `DB_HOST`: Database server hostname
//! - `DB_PORT`: Port (optional, uses driver default)
//! - `DB_NAME`: Database name (file path for SQLite)
//! - `DB_USER`, `DB_PASS`: Credentials (optional)
//! - `SCHEMA`: Schema qualifier for table names (default `cases`)

use std::env;

use crate::sql::Dialect;

/// Schema qualifier used when `SCHEMA` is unset.
pub const DEFAULT_SCHEMA: &str = "cases";

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported driver: {0}. Supported: postgres, mysql, sqlite")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Postgres,
    MySql,
    /// SQLite (file or in-memory)
    Sqlite,
}

impl Driver {
    /// Parse driver from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "mysql" | "mariadb" => Ok(Driver::MySql),
            "sqlite" | "sqlite3" => Ok(Driver::Sqlite),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Postgres => "postgres",
            Driver::MySql => "mysql",
            Driver::Sqlite => "sqlite",
        }
    }

    /// Get the default port for this driver.
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Postgres => 5432,
            Driver::MySql => 3306,
            Driver::Sqlite => 0, // Not applicable
        }
    }

    /// SQL dialect spoken by this driver.
    pub fn dialect(&self) -> Dialect {
        match self {
            Driver::Postgres => Dialect::Postgres,
            Driver::MySql => Dialect::MySql,
            Driver::Sqlite => Dialect::Sqlite,
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub driver: Driver,
    /// Server hostname (empty for SQLite).
    pub host: String,
    /// Database name, or the file path for SQLite.
    pub database: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Schema qualifier for table names.
    pub schema: Option<String>,
}

impl ConnectionConfig {
    /// A SQLite database file, or `:memory:`.
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            driver: Driver::Sqlite,
            host: String::new(),
            database: path.into(),
            port: None,
            username: None,
            password: None,
            schema: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `DB_NAME` is always required; `DB_HOST` is required except for SQLite.
    pub fn from_env() -> Result<Self, ConnectionError> {
        let driver = match env::var("DB_DRIVER") {
            Ok(d) => Driver::from_str(&d)?,
            Err(_) => Driver::Postgres,
        };

        let database = env::var("DB_NAME")
            .map_err(|_| ConnectionError::MissingEnvVar("DB_NAME".to_string()))?;

        let host = match driver {
            Driver::Sqlite => env::var("DB_HOST").unwrap_or_default(),
            _ => env::var("DB_HOST")
                .map_err(|_| ConnectionError::MissingEnvVar("DB_HOST".to_string()))?,
        };

        let port = match env::var("DB_PORT") {
            Ok(p) => Some(p.parse().map_err(|_| {
                ConnectionError::InvalidConfig(format!("DB_PORT is not a port number: {}", p))
            })?),
            Err(_) => None,
        };

        let schema = match env::var("SCHEMA") {
            Ok(s) if s.is_empty() => None,
            Ok(s) => Some(s),
            Err(_) => Some(DEFAULT_SCHEMA.to_string()),
        };

        Ok(Self {
            driver,
            host,
            database,
            port,
            username: env::var("DB_USER").ok(),
            password: env::var("DB_PASS").ok(),
            schema,
        })
    }

    /// Build a connection URL (or file path for SQLite).
    pub fn to_connection_string(&self) -> String {
        match self.driver {
            Driver::Sqlite => {
                if self.database.is_empty() {
                    ":memory:".to_string()
                } else {
                    self.database.clone()
                }
            }
            Driver::Postgres | Driver::MySql => {
                let credentials = match (&self.username, &self.password) {
                    (Some(user), Some(pass)) => format!("{}:{}@", user, pass),
                    (Some(user), None) => format!("{}@", user),
                    _ => String::new(),
                };
                format!(
                    "{}://{}{}:{}/{}",
                    self.driver.as_str(),
                    credentials,
                    self.host,
                    self.port.unwrap_or_else(|| self.driver.default_port()),
                    self.database
                )
            }
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.driver.dialect()
    }
}
