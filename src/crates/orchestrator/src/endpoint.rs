//! Endpoint configuration and its shared store
//!
//! An [`EndpointConfig`] is the pair (base URL, headers) used for every backend
//! call. The [`EndpointStore`] holds the current config behind a read-write
//! lock and hands out `Arc` snapshots, so a reader always sees one complete
//! config and a writer replaces the whole value at once.

use crate::{OrchestratorError, Result};
use parking_lot::RwLock;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Default execution API root.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1/executions";

const EXECUTIONS_SEGMENT: &str = "/executions";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Ordered header set. Names compare case-insensitively; insertion order is kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderSet(Vec<(String, String)>);

impl HeaderSet {
    /// Empty header set
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// `Content-Type` and `Accept` both set to `application/json`.
    pub fn json_defaults() -> Self {
        Self::new()
            .with("Content-Type", "application/json")
            .with("Accept", "application/json")
    }

    /// Parse an admin-supplied JSON object of string values.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| {
            OrchestratorError::InvalidRequest(format!(
                "Headers must be a JSON object of string values: {}",
                e
            ))
        })
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a header, keeping the original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(entry) => *entry = (name, value),
            None => self.0.push((name, value)),
        }
    }

    /// Remove a header by name. Returns the removed value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(idx).1)
    }

    /// Look up a header value by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Headers as ordered pairs, the form the HTTP client takes.
    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.0
    }

    /// Compact JSON rendering, in insertion order.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for HeaderSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HeaderSetVisitor;

        impl<'de> Visitor<'de> for HeaderSetVisitor {
            type Value = HeaderSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<HeaderSet, A::Error> {
                let mut headers = HeaderSet::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.insert(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeaderSetVisitor)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = HeaderSet::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Base URL plus headers for the execution API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Root of the execution API, e.g. `http://host:8000/api/v1/executions`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Headers sent with every call (minus `Content-Type` on GET)
    #[serde(default = "HeaderSet::json_defaults")]
    pub headers: HeaderSet,
}

impl EndpointConfig {
    pub fn new(base_url: impl Into<String>, headers: HeaderSet) -> Self {
        Self {
            base_url: base_url.into(),
            headers,
        }
    }

    /// Same headers, different base URL.
    pub fn with_base_url(&self, base_url: impl Into<String>) -> Self {
        Self::new(base_url, self.headers.clone())
    }

    /// Same base URL, different headers.
    pub fn with_headers(&self, headers: HeaderSet) -> Self {
        Self::new(self.base_url.clone(), headers)
    }

    fn root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Base URL with a trailing `/executions` segment stripped.
    pub fn health_base(&self) -> &str {
        let root = self.root();
        root.strip_suffix(EXECUTIONS_SEGMENT).unwrap_or(root)
    }

    /// `POST` target for creating an execution.
    pub fn create_url(&self) -> String {
        self.root().to_string()
    }

    /// `GET {base}/{id}/status`
    pub fn status_url(&self, execution_id: &str) -> String {
        format!("{}/{}/status", self.root(), execution_id)
    }

    /// `GET {base}/{id}`
    pub fn result_url(&self, execution_id: &str) -> String {
        format!("{}/{}", self.root(), execution_id)
    }

    /// `GET {health_base}/health`
    pub fn health_url(&self) -> String {
        format!("{}/health", self.health_base())
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, HeaderSet::json_defaults())
    }
}

impl fmt::Display for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "URL: {}\nBase: {}\nHeaders: {}",
            self.base_url,
            self.health_base(),
            self.headers.to_json_string()
        )
    }
}

/// Shared, atomically replaceable endpoint configuration.
///
/// Clones share the same underlying slot.
#[derive(Debug, Clone)]
pub struct EndpointStore {
    current: Arc<RwLock<Arc<EndpointConfig>>>,
}

impl EndpointStore {
    pub fn new(initial: EndpointConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    /// Snapshot of the current config.
    pub fn get(&self) -> Arc<EndpointConfig> {
        self.current.read().clone()
    }

    /// Replace base URL and headers together.
    pub fn set(&self, base_url: impl Into<String>, headers: HeaderSet) -> Arc<EndpointConfig> {
        self.replace(EndpointConfig::new(base_url, headers))
    }

    /// Replace the whole config.
    pub fn replace(&self, config: EndpointConfig) -> Arc<EndpointConfig> {
        let next = Arc::new(config);
        *self.current.write() = Arc::clone(&next);
        info!(base_url = %next.base_url, headers = next.headers.len(), "Endpoint configuration replaced");
        next
    }

    /// Derive a new config from the current one and install it, under one write lock.
    pub fn update<F>(&self, f: F) -> Arc<EndpointConfig>
    where
        F: FnOnce(&EndpointConfig) -> EndpointConfig,
    {
        let mut guard = self.current.write();
        let next = Arc::new(f(&guard));
        *guard = Arc::clone(&next);
        drop(guard);
        info!(base_url = %next.base_url, headers = next.headers.len(), "Endpoint configuration replaced");
        next
    }
}

impl Default for EndpointStore {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}
