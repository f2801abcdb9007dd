//! Configuration management utilities.
//!
//! This module provides utilities for loading and managing configuration including:
//! - Environment variable loading with type parsing
//! - Environment overrides layered on top of loaded values
//! - Configuration validation
//! - TOML/YAML/JSON config file loading
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::config::{get_env_parse_or, load_config_file};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct AppConfig {
//!     base_url: String,
//!     poll_interval_ms: u64,
//! }
//!
//! let config: AppConfig = load_config_file("relay.toml")?;
//! let retries = get_env_parse_or::<u32>("RELAY_MAX_RETRIES", 3);
//! ```

use crate::error::{Result, UtilsError};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Get an environment variable as a string.
pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|e| {
        UtilsError::Config(format!("Environment variable '{}' not found: {}", key, e))
    })
}

/// Get an environment variable if it is set and non-empty.
pub fn get_env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable and parse it to the specified type.
pub fn get_env_parse<T: std::str::FromStr>(key: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let value = get_env(key)?;
    value.trim().parse::<T>().map_err(|e| {
        UtilsError::Config(format!(
            "Failed to parse environment variable '{}': {}",
            key, e
        ))
    })
}

/// Parse an environment variable if present; `Ok(None)` when unset.
pub fn get_env_parse_opt<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match get_env_opt(key) {
        Some(_) => get_env_parse(key).map(Some),
        None => Ok(None),
    }
}

/// Get an environment variable with a default value.
pub fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable and parse it, or use a default value.
pub fn get_env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    get_env_parse(key).unwrap_or(default)
}

/// Load configuration from a TOML file.
pub fn load_toml_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = std::fs::read_to_string(path.as_ref())?;
    toml::from_str(&content).map_err(|e| {
        UtilsError::Config(format!(
            "Failed to parse TOML config from {:?}: {}",
            path.as_ref(),
            e
        ))
    })
}

/// Load configuration from a YAML file.
pub fn load_yaml_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = std::fs::read_to_string(path.as_ref())?;
    serde_yaml::from_str(&content).map_err(|e| {
        UtilsError::Config(format!(
            "Failed to parse YAML config from {:?}: {}",
            path.as_ref(),
            e
        ))
    })
}

/// Load configuration from a JSON file.
pub fn load_json_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let content = std::fs::read_to_string(path.as_ref())?;
    serde_json::from_str(&content).map_err(|e| {
        UtilsError::Config(format!(
            "Failed to parse JSON config from {:?}: {}",
            path.as_ref(),
            e
        ))
    })
}

/// Load configuration from a file (auto-detect format from extension).
pub fn load_config_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            UtilsError::Config(format!("Unable to determine file extension for {:?}", path))
        })?;

    match extension.to_lowercase().as_str() {
        "toml" => load_toml_config(path),
        "yaml" | "yml" => load_yaml_config(path),
        "json" => load_json_config(path),
        _ => Err(UtilsError::Config(format!(
            "Unsupported config file extension: {}",
            extension
        ))),
    }
}

/// Types whose fields can be overridden from environment variables.
pub trait EnvOverrides {
    /// Apply any variables starting with `prefix` on top of the current values.
    fn apply_env(&mut self, prefix: &str) -> Result<()>;
}

/// Trait for validating configuration.
pub trait ValidateConfig {
    /// Validate the configuration, returning an error if invalid.
    fn validate(&self) -> Result<()>;
}
