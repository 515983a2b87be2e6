//! Configuration module for relgraph.
//!
//! Handles connection configuration, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, Driver, DEFAULT_SCHEMA};
pub use settings::{
    expand_env_vars, parse_duration, DatabaseSettings, ExecutionSettings, PoolSettings, Settings,
    SettingsError,
};
