//! Utility functions and helpers for relay.
//!
//! This crate provides the resilient HTTP client and the configuration
//! helpers shared by the orchestrator and the command-line front end.
//!
//! # Modules
//!
//! ## Client (`client`)
//!
//! HTTP client with per-call timeouts, pooled connections, and retry with
//! capped exponential backoff for transport failures and 5xx responses:
//!
//! ```rust,ignore
//! use utils::client::{ClientConfig, HttpClient};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_max_retries(3)
//!     .with_user_agent("relay");
//!
//! let client = HttpClient::new(config)?;
//! let reply = client
//!     .post_json("http://localhost:8000/api/v1/executions", &headers, &body, None)
//!     .await?;
//! ```
//!
//! ## Config (`config`)
//!
//! Environment variable and file loading:
//!
//! ```rust,ignore
//! use utils::config::{get_env_parse_or, load_config_file};
//!
//! let config: AppConfig = load_config_file("relay.toml")?;
//! let interval = get_env_parse_or::<u64>("RELAY_POLL_INTERVAL_MS", 1000);
//! ```
//!
//! # Features
//!
//! - `client` - HTTP client (enabled by default)
//! - `config` - Configuration utilities (enabled by default)

pub mod error;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "config")]
pub mod config;

// Re-export commonly used types
pub use error::{Result, UtilsError};

#[cfg(feature = "client")]
pub use client::{truncate_chars, ClientConfig, HttpClient, HttpReply, ReplyBody};

#[cfg(feature = "config")]
pub use config::{
    get_env, get_env_opt, get_env_or, get_env_parse, get_env_parse_opt, get_env_parse_or,
    load_config_file, load_json_config, load_toml_config, load_yaml_config, EnvOverrides,
    ValidateConfig,
};
