//! HTTP client utilities and helpers.
//!
//! This module provides the resilient HTTP client used for every backend call:
//! - Client configuration builders
//! - Per-call timeouts on top of a pooled `reqwest::Client`
//! - Retry with capped exponential backoff for transport failures and 5xx
//! - JSON-or-text response decoding
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::client::{ClientConfig, HttpClient};
//!
//! let config = ClientConfig::new()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_max_retries(3);
//!
//! let client = HttpClient::new(config)?;
//! let reply = client.get("http://localhost:8000/health", &[], None).await?;
//! println!("{}", reply.status);
//! ```

use crate::error::{Result, UtilsError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Request};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default per-call timeout (connect + read).
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Maximum number of retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Backoff multiplier for retry delays.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f32,

    /// Upper bound for a single retry delay.
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay: Duration,

    /// Add up to 25% random jitter to each retry delay.
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Idle connections kept per host in the pool.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// User agent string.
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Create a new client configuration with defaults.
    pub fn new() -> Self {
        Self {
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_retry_delay: default_max_retry_delay(),
            jitter: default_jitter(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            user_agent: None,
        }
    }

    /// Set the default per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the cap on a single retry delay.
    pub fn with_max_retry_delay(mut self, delay: Duration) -> Self {
        self.max_retry_delay = delay;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the number of idle pooled connections per host.
    pub fn with_pool_max_idle_per_host(mut self, max_idle: usize) -> Self {
        self.pool_max_idle_per_host = max_idle;
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Delay to wait before retry number `retry` (0-based), capped and jittered.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let base = self.retry_delay.as_secs_f64() * (self.backoff_multiplier as f64).powi(retry as i32);
        let capped = base.min(self.max_retry_delay.as_secs_f64());

        let delay = if self.jitter {
            capped + capped * 0.25 * rand::random::<f64>()
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_backoff_multiplier() -> f32 {
    2.0
}

fn default_max_retry_delay() -> Duration {
    Duration::from_secs(8)
}

fn default_jitter() -> bool {
    true
}

fn default_pool_max_idle_per_host() -> usize {
    10
}

/// Response body, decoded as JSON when possible.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    /// The body parsed as JSON.
    Json(Value),
    /// The body was not valid JSON; kept verbatim.
    Text(String),
}

/// Status code plus decoded body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: ReplyBody,
}

impl HttpReply {
    /// Build a reply from a status code and raw body text.
    pub fn from_raw(status: u16, raw: String) -> Self {
        let body = match serde_json::from_str::<Value>(&raw) {
            Ok(value) => ReplyBody::Json(value),
            Err(_) => ReplyBody::Text(raw),
        };
        Self { status, body }
    }

    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The JSON body, if the response parsed as JSON.
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ReplyBody::Json(value) => Some(value),
            ReplyBody::Text(_) => None,
        }
    }

    /// Body as display text: pretty JSON, or the raw text, truncated to `limit` chars.
    pub fn body_text(&self, limit: usize) -> String {
        let text = match &self.body {
            ReplyBody::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            ReplyBody::Text(raw) => raw.clone(),
        };
        truncate_chars(&text, limit)
    }
}

/// Cut `text` to at most `limit` characters, appending " …" when anything was dropped.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{} …", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// HTTP client with retry and configuration support.
///
/// Cloning is cheap: all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    config: ClientConfig,
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }

        let client = builder
            .build()
            .map_err(|e| UtilsError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST a JSON body. Headers are sent verbatim.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<HttpReply> {
        let header_map = build_headers(headers, false)?;
        let request = self
            .client
            .request(Method::POST, url)
            .headers(header_map)
            .json(body)
            .timeout(timeout.unwrap_or(self.config.timeout))
            .build()
            .map_err(|e| UtilsError::InvalidRequest(e.to_string()))?;

        self.send_with_retry(request).await
    }

    /// GET a URL. Any `Content-Type` entry in `headers` is dropped.
    pub async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Option<Duration>,
    ) -> Result<HttpReply> {
        let header_map = build_headers(headers, true)?;
        let request = self
            .client
            .request(Method::GET, url)
            .headers(header_map)
            .timeout(timeout.unwrap_or(self.config.timeout))
            .build()
            .map_err(|e| UtilsError::InvalidRequest(e.to_string()))?;

        self.send_with_retry(request).await
    }

    /// Send a request with retry logic.
    ///
    /// Transport failures and 5xx responses are retried up to `max_retries`
    /// times. 4xx and other statuses are returned immediately. When retries
    /// run out on a 5xx, the last response is returned as-is.
    async fn send_with_retry(&self, request: Request) -> Result<HttpReply> {
        let method = request.method().clone();
        let url = request.url().to_string();
        let mut attempts = 0;

        loop {
            let attempt_request = request
                .try_clone()
                .ok_or_else(|| UtilsError::InvalidRequest("Failed to clone request".to_string()))?;
            attempts += 1;
            let can_retry = attempts <= self.config.max_retries;

            match self.exchange(attempt_request).await {
                Ok(reply) => {
                    if !(reply.status >= 500 && can_retry) {
                        debug!(%method, url = %url, status = reply.status, attempts, "HTTP exchange completed");
                        return Ok(reply);
                    }
                    warn!(%method, url = %url, status = reply.status, attempt = attempts, "Server error, will retry");
                }
                Err(e) if e.is_builder() => {
                    return Err(UtilsError::InvalidRequest(e.to_string()));
                }
                Err(e) => {
                    if !can_retry {
                        warn!(%method, url = %url, attempts, error = %e, "Retries exhausted");
                        return Err(if e.is_timeout() {
                            UtilsError::Timeout { attempts }
                        } else {
                            UtilsError::Network {
                                attempts,
                                message: e.to_string(),
                            }
                        });
                    }
                    warn!(%method, url = %url, attempt = attempts, error = %e, "Transport error, will retry");
                }
            }

            let delay = self.config.backoff_delay(attempts - 1);
            debug!(%method, url = %url, delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::time::sleep(delay).await;
        }
    }

    /// One attempt: send, then read the whole body.
    async fn exchange(&self, request: Request) -> std::result::Result<HttpReply, reqwest::Error> {
        let response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        let raw = response.text().await?;
        Ok(HttpReply::from_raw(status, raw))
    }
}

/// Build a header map from ordered pairs, optionally dropping `Content-Type`.
pub fn build_headers(headers: &[(String, String)], strip_content_type: bool) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| UtilsError::InvalidRequest(format!("Invalid header name '{}': {}", key, e)))?;

        if strip_content_type && name == CONTENT_TYPE {
            continue;
        }

        let value = HeaderValue::from_str(value)
            .map_err(|e| UtilsError::InvalidRequest(format!("Invalid value for header '{}': {}", key, e)))?;
        map.insert(name, value);
    }

    Ok(map)
}
