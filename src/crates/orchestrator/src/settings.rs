//! Relay configuration schema and layered loader
//!
//! Loads configuration from, later layers winning:
//! 1. Default values
//! 2. User-level config: ~/.relay/relay.toml
//! 3. Project-level config: ./.relay/relay.toml
//! 4. An explicit file (toml, yaml or json by extension)
//! 5. `RELAY_*` environment variables

use crate::endpoint::{EndpointConfig, HeaderSet};
use crate::engine::OrchestratorOptions;
use crate::{OrchestratorError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use utils::{
    get_env_opt, get_env_parse_opt, load_config_file, ClientConfig, EnvOverrides, UtilsError,
    ValidateConfig,
};

/// Default prefix for environment overrides
pub const ENV_PREFIX: &str = "RELAY";

/// Upper bound for `polling.max_wait_secs`: one day.
pub const MAX_WAIT_CEILING_SECS: u64 = 24 * 60 * 60;

/// Main relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RelayConfig {
    /// Backend base URL and headers
    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    /// HTTP client, retry and per-call timeout settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Defaults applied to every submitted goal
    #[serde(default)]
    pub request: RequestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reply size limits
    #[serde(default)]
    pub reply: ReplyConfig,
}

/// Status polling cadence and deadlines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Overall deadline for reaching a terminal status
    pub max_wait_secs: u64,
    /// Longest run of consecutive poll failures before giving up
    pub max_poll_failure_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            max_wait_secs: 120,
            max_poll_failure_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: f32,
    pub max_retry_delay_ms: u64,
    pub create_timeout_secs: u64,
    pub status_timeout_secs: u64,
    pub result_timeout_secs: u64,
    pub health_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 500,
            backoff_multiplier: 2.0,
            max_retry_delay_ms: 8000,
            create_timeout_secs: 15,
            status_timeout_secs: 10,
            result_timeout_secs: 15,
            health_timeout_secs: 5,
            pool_max_idle_per_host: 10,
            user_agent: Some(format!("relay/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Goals longer than this many characters are trimmed before sending
    pub max_goal_len: usize,
    pub max_depth: u32,
    /// Extra fields merged into every create body
    pub extra: Map<String, Value>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_goal_len: 2000,
            max_depth: 1,
            extra: Map::new(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    pub max_reply_len: usize,
    /// Cap on backend bodies quoted inside replies
    pub max_body_len: usize,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            max_reply_len: 4000,
            max_body_len: 2000,
        }
    }
}

impl RelayConfig {
    /// HTTP client settings. The client-wide timeout is the create timeout;
    /// status, result and health calls override it per request.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new()
            .with_timeout(Duration::from_secs(self.http.create_timeout_secs))
            .with_max_retries(self.http.max_retries)
            .with_retry_delay(Duration::from_millis(self.http.retry_delay_ms))
            .with_backoff_multiplier(self.http.backoff_multiplier)
            .with_max_retry_delay(Duration::from_millis(self.http.max_retry_delay_ms))
            .with_pool_max_idle_per_host(self.http.pool_max_idle_per_host);

        if let Some(user_agent) = &self.http.user_agent {
            config = config.with_user_agent(user_agent.clone());
        }
        config
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions::new()
            .with_poll_interval(Duration::from_millis(self.polling.interval_ms))
            .with_max_wait(Duration::from_secs(self.polling.max_wait_secs))
            .with_max_poll_failure(Duration::from_secs(self.polling.max_poll_failure_secs))
            .with_create_timeout(Duration::from_secs(self.http.create_timeout_secs))
            .with_status_timeout(Duration::from_secs(self.http.status_timeout_secs))
            .with_result_timeout(Duration::from_secs(self.http.result_timeout_secs))
            .with_max_body_len(self.reply.max_body_len)
    }

    pub fn endpoint_config(&self) -> EndpointConfig {
        self.endpoint.clone()
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.http.health_timeout_secs)
    }

    /// Resolve `${VAR}` placeholders in the base URL and header values.
    ///
    /// Unset variables keep their placeholder.
    pub fn resolve_env_vars(&mut self) {
        self.endpoint.base_url = expand_env_var(&self.endpoint.base_url);
        self.endpoint.headers = self
            .endpoint
            .headers
            .iter()
            .map(|(name, value)| (name.to_string(), expand_env_var(value)))
            .collect();
    }
}

/// Expand a whole-value `${VAR_NAME}` reference.
fn expand_env_var(value: &str) -> String {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) if !var_name.is_empty() => {
            std::env::var(var_name).unwrap_or_else(|_| value.to_string())
        }
        _ => value.to_string(),
    }
}

impl EnvOverrides for RelayConfig {
    fn apply_env(&mut self, prefix: &str) -> utils::Result<()> {
        if let Some(url) = get_env_opt(&format!("{}_API_URL", prefix)) {
            self.endpoint.base_url = url.trim().to_string();
        }

        if let Some(raw) = get_env_opt(&format!("{}_HEADERS", prefix)) {
            self.endpoint.headers = HeaderSet::from_json_str(&raw).map_err(|e| {
                UtilsError::Config(format!("{}_HEADERS: {}", prefix, e))
            })?;
        }

        if let Some(interval) = get_env_parse_opt(&format!("{}_POLL_INTERVAL_MS", prefix))? {
            self.polling.interval_ms = interval;
        }

        if let Some(max_wait) = get_env_parse_opt(&format!("{}_MAX_WAIT_SECS", prefix))? {
            self.polling.max_wait_secs = max_wait;
        }

        if let Some(retries) = get_env_parse_opt(&format!("{}_MAX_RETRIES", prefix))? {
            self.http.max_retries = retries;
        }

        Ok(())
    }
}

impl ValidateConfig for RelayConfig {
    fn validate(&self) -> utils::Result<()> {
        if self.endpoint.base_url.trim().is_empty() {
            return Err(UtilsError::Config("endpoint.base_url must not be empty".to_string()));
        }
        if self.polling.interval_ms == 0 {
            return Err(UtilsError::Config("polling.interval_ms must be greater than 0".to_string()));
        }
        if self.polling.max_wait_secs == 0 {
            return Err(UtilsError::Config("polling.max_wait_secs must be greater than 0".to_string()));
        }
        if self.polling.max_wait_secs > MAX_WAIT_CEILING_SECS {
            return Err(UtilsError::Config(format!(
                "polling.max_wait_secs must be at most {}, got {}",
                MAX_WAIT_CEILING_SECS, self.polling.max_wait_secs
            )));
        }
        if Duration::from_millis(self.polling.interval_ms)
            > Duration::from_secs(self.polling.max_wait_secs)
        {
            return Err(UtilsError::Config(format!(
                "polling.interval_ms ({}) exceeds polling.max_wait_secs ({}s)",
                self.polling.interval_ms, self.polling.max_wait_secs
            )));
        }
        for (name, secs) in [
            ("http.create_timeout_secs", self.http.create_timeout_secs),
            ("http.status_timeout_secs", self.http.status_timeout_secs),
            ("http.result_timeout_secs", self.http.result_timeout_secs),
            ("http.health_timeout_secs", self.http.health_timeout_secs),
        ] {
            if secs == 0 {
                return Err(UtilsError::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.http.backoff_multiplier < 1.0 {
            return Err(UtilsError::Config(format!(
                "http.backoff_multiplier must be at least 1.0, got {}",
                self.http.backoff_multiplier
            )));
        }
        Ok(())
    }
}

/// Merge two JSON values deeply.
///
/// Objects merge key by key; for any other pair `other` replaces `base`.
pub fn deep_merge(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Object(base_map), Value::Object(other_map)) => {
            for (key, other_value) in other_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, other_value),
                    None => {
                        base_map.insert(key.clone(), other_value.clone());
                    }
                }
            }
        }
        (base, other) => {
            *base = other.clone();
        }
    }
}

/// Configuration loader for the layered relay config
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
    explicit_path: Option<PathBuf>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(".relay").join("relay.toml")),
            project_config_path: std::env::current_dir()
                .ok()
                .map(|cwd| cwd.join(".relay").join("relay.toml")),
            explicit_path: None,
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Also load `path`, which must exist, on top of the user and project files.
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    pub fn with_user_path(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }

    pub fn with_project_path(mut self, path: Option<PathBuf>) -> Self {
        self.project_config_path = path;
        self
    }

    /// Prefix for environment overrides; `None` disables them.
    pub fn with_env_prefix(mut self, prefix: Option<&str>) -> Self {
        self.env_prefix = prefix.map(str::to_string);
        self
    }

    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    pub fn project_config_path(&self) -> Option<&Path> {
        self.project_config_path.as_deref()
    }

    /// Load, merge, resolve and validate the configuration.
    pub fn load(&self) -> Result<RelayConfig> {
        let mut merged = serde_json::to_value(RelayConfig::default())
            .map_err(|e| OrchestratorError::Config(format!("Failed to encode defaults: {}", e)))?;

        for path in [&self.user_config_path, &self.project_config_path]
            .into_iter()
            .flatten()
        {
            if path.exists() {
                Self::merge_file(&mut merged, path)?;
            } else {
                debug!(path = %path.display(), "Config file not found, skipping");
            }
        }

        if let Some(path) = &self.explicit_path {
            if !path.exists() {
                return Err(OrchestratorError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            Self::merge_file(&mut merged, path)?;
        }

        let mut config: RelayConfig = serde_json::from_value(merged)
            .map_err(|e| OrchestratorError::Config(format!("Invalid configuration: {}", e)))?;

        config.resolve_env_vars();

        if let Some(prefix) = &self.env_prefix {
            config.apply_env(prefix)?;
        }

        config.validate()?;

        info!(base_url = %config.endpoint.base_url, "Configuration loaded");
        Ok(config)
    }

    fn merge_file(merged: &mut Value, path: &Path) -> Result<()> {
        let layer: Value = load_config_file(path).map_err(|e| {
            OrchestratorError::Config(format!("Failed to load {}: {}", path.display(), e))
        })?;
        deep_merge(merged, &layer);
        debug!(path = %path.display(), "Merged config file");
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn isolated_loader() -> ConfigLoader {
        ConfigLoader::new()
            .with_user_path(None)
            .with_project_path(None)
            .with_env_prefix(None)
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.endpoint.base_url, "http://localhost:8000/api/v1/executions");
        assert_eq!(config.endpoint.headers.get("content-type"), Some("application/json"));
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.polling.max_wait_secs, 120);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.http.health_timeout_secs, 5);
        assert_eq!(config.request.max_goal_len, 2000);
        assert_eq!(config.reply.max_reply_len, 4000);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_returns_defaults_when_no_files() {
        let config = isolated_loader().load().unwrap();
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_conversions() {
        let mut config = RelayConfig::default();
        config.polling.interval_ms = 250;
        config.http.status_timeout_secs = 7;
        config.reply.max_body_len = 99;

        let options = config.orchestrator_options();
        assert_eq!(options.poll_interval, Duration::from_millis(250));
        assert_eq!(options.status_timeout, Duration::from_secs(7));
        assert_eq!(options.max_body_len, 99);

        let client = config.client_config();
        assert_eq!(client.max_retries, 3);
        assert_eq!(client.retry_delay, Duration::from_millis(500));
        assert_eq!(client.max_retry_delay, Duration::from_secs(8));
        assert!(client.user_agent.unwrap().starts_with("relay/"));

        assert_eq!(config.health_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_project_overrides_user_and_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("user.toml");
        let project = temp_dir.path().join("project.toml");

        fs::write(
            &user,
            r#"
[endpoint]
base_url = "http://user-host/api/v1/executions"

[endpoint.headers]
Authorization = "Bearer user"

[polling]
interval_ms = 500
max_wait_secs = 60
"#,
        )
        .unwrap();
        fs::write(
            &project,
            r#"
[polling]
interval_ms = 200
"#,
        )
        .unwrap();

        let config = isolated_loader()
            .with_user_path(Some(user))
            .with_project_path(Some(project))
            .load()
            .unwrap();

        assert_eq!(config.endpoint.base_url, "http://user-host/api/v1/executions");
        assert_eq!(config.endpoint.headers.get("Authorization"), Some("Bearer user"));
        assert_eq!(config.endpoint.headers.get("Accept"), Some("application/json"));
        assert_eq!(config.polling.interval_ms, 200);
        assert_eq!(config.polling.max_wait_secs, 60);
        assert_eq!(config.polling.max_poll_failure_secs, 30);
        assert_eq!(config.http.max_retries, 3);
    }

    #[test]
    fn test_explicit_yaml_file_wins() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path().join("project.toml");
        let explicit = temp_dir.path().join("relay.yaml");

        fs::write(&project, "[http]\nmax_retries = 5\n").unwrap();
        fs::write(
            &explicit,
            "http:\n  max_retries: 1\nrequest:\n  extra:\n    priority: high\nlogging:\n  format: json\n",
        )
        .unwrap();

        let config = isolated_loader()
            .with_project_path(Some(project))
            .with_explicit(&explicit)
            .load()
            .unwrap();

        assert_eq!(config.http.max_retries, 1);
        assert_eq!(config.request.extra.get("priority"), Some(&json!("high")));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = isolated_loader().with_explicit("/nonexistent/relay.toml").load();
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("relay.toml");
        fs::write(&path, "[polling\ninterval_ms = ").unwrap();

        let result = isolated_loader().with_explicit(&path).load();
        assert!(matches!(result, Err(OrchestratorError::Config(_))));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("relay.json");
        fs::write(&path, r#"{"polling": {"interval_ms": 5000, "max_wait_secs": 2}}"#).unwrap();

        let result = isolated_loader().with_explicit(&path).load();
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rules() {
        let mut config = RelayConfig::default();
        config.endpoint.base_url = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.polling.interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.polling.max_wait_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.http.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_huge_max_wait_without_overflow() {
        let mut config = RelayConfig::default();
        config.polling.max_wait_secs = u64::MAX;
        assert!(config.validate().is_err());

        config.polling.max_wait_secs = MAX_WAIT_CEILING_SECS + 1;
        assert!(config.validate().is_err());

        config.polling.max_wait_secs = MAX_WAIT_CEILING_SECS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        for field in ["create", "status", "result", "health"] {
            let mut config = RelayConfig::default();
            match field {
                "create" => config.http.create_timeout_secs = 0,
                "status" => config.http.status_timeout_secs = 0,
                "result" => config.http.result_timeout_secs = 0,
                _ => config.http.health_timeout_secs = 0,
            }
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(&format!("http.{}_timeout_secs", field)));
        }
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("RELAY_SETTINGS_TEST_API_URL", "http://env-host/api/v1/executions");
        env::set_var("RELAY_SETTINGS_TEST_HEADERS", r#"{"X-Api-Key": "k1"}"#);
        env::set_var("RELAY_SETTINGS_TEST_POLL_INTERVAL_MS", "300");
        env::set_var("RELAY_SETTINGS_TEST_MAX_WAIT_SECS", "45");
        env::set_var("RELAY_SETTINGS_TEST_MAX_RETRIES", "0");

        let config = isolated_loader()
            .with_env_prefix(Some("RELAY_SETTINGS_TEST"))
            .load()
            .unwrap();

        assert_eq!(config.endpoint.base_url, "http://env-host/api/v1/executions");
        assert_eq!(config.endpoint.headers.get("X-Api-Key"), Some("k1"));
        assert_eq!(config.endpoint.headers.len(), 1);
        assert_eq!(config.polling.interval_ms, 300);
        assert_eq!(config.polling.max_wait_secs, 45);
        assert_eq!(config.http.max_retries, 0);

        for suffix in ["API_URL", "HEADERS", "POLL_INTERVAL_MS", "MAX_WAIT_SECS", "MAX_RETRIES"] {
            env::remove_var(format!("RELAY_SETTINGS_TEST_{}", suffix));
        }
    }

    #[test]
    fn test_bad_env_override_is_an_error() {
        env::set_var("RELAY_SETTINGS_BAD_MAX_RETRIES", "many");
        let result = isolated_loader()
            .with_env_prefix(Some("RELAY_SETTINGS_BAD"))
            .load();
        assert!(result.is_err());
        env::remove_var("RELAY_SETTINGS_BAD_MAX_RETRIES");
    }

    #[test]
    fn test_header_placeholders_resolve() {
        env::set_var("RELAY_SETTINGS_TOKEN", "Bearer secret");

        let mut config = RelayConfig::default();
        config.endpoint.headers.insert("Authorization", "${RELAY_SETTINGS_TOKEN}");
        config.endpoint.headers.insert("X-Missing", "${RELAY_SETTINGS_UNSET_VAR}");
        config.endpoint.headers.insert("X-Literal", "plain");
        config.resolve_env_vars();

        assert_eq!(config.endpoint.headers.get("Authorization"), Some("Bearer secret"));
        assert_eq!(config.endpoint.headers.get("X-Missing"), Some("${RELAY_SETTINGS_UNSET_VAR}"));
        assert_eq!(config.endpoint.headers.get("X-Literal"), Some("plain"));

        env::remove_var("RELAY_SETTINGS_TOKEN");
    }

    #[test]
    fn test_deep_merge() {
        let mut base = json!({"a": {"b": 1, "c": 2}, "d": [1, 2]});
        deep_merge(&mut base, &json!({"a": {"c": 3}, "d": [9], "e": true}));
        assert_eq!(base, json!({"a": {"b": 1, "c": 3}, "d": [9], "e": true}));
    }
}
