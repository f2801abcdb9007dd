//! Backend health probe

use crate::endpoint::EndpointConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use utils::HttpClient;

/// Result of one `GET {health_base}/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub url: String,
    /// `None` when the backend could not be reached at all
    pub status_code: Option<u16>,
    pub healthy: bool,
    pub response_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    /// Probe the health endpoint of `endpoint`.
    ///
    /// Never fails: an unreachable backend yields a report with `status_code: None`.
    pub async fn check(client: &HttpClient, endpoint: &EndpointConfig, timeout: Duration) -> Self {
        let url = endpoint.health_url();
        let started = Instant::now();
        let result = client
            .get(&url, endpoint.headers.as_pairs(), Some(timeout))
            .await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(reply) => {
                debug!(url = %url, status = reply.status, response_time_ms, "Health check answered");
                Self {
                    url,
                    status_code: Some(reply.status),
                    healthy: reply.is_success(),
                    response_time_ms,
                    timestamp: Utc::now(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Health check failed");
                Self {
                    url,
                    status_code: None,
                    healthy: false,
                    response_time_ms,
                    timestamp: Utc::now(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Ping-style reply text.
    pub fn render(&self) -> String {
        match (self.status_code, &self.error) {
            (Some(code), _) => format!("✅ Ping OK: GET {}\nStatus: {}", self.url, code),
            (None, Some(error)) => format!("❌ Ping failed: GET {}\n{}", self.url, error),
            (None, None) => format!("❌ Ping failed: GET {}", self.url),
        }
    }
}
