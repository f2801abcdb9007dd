//! Caller-facing facade
//!
//! [`Relay`] bundles the endpoint store, the shared HTTP client and the
//! orchestrator, and exposes the operations a transport layer needs: run a
//! goal, reconfigure the endpoint, send a raw request, ping the backend.

use crate::endpoint::{EndpointConfig, EndpointStore, HeaderSet};
use crate::engine::Orchestrator;
use crate::health::HealthReport;
use crate::job::{soft_trim, ExecutionRequest};
use crate::outcome::Outcome;
use crate::settings::RelayConfig;
use crate::{OrchestratorError, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use utils::{truncate_chars, HttpClient, HttpReply};

const RAW_BODY_LIMIT: usize = 3500;
const RAW_REPLY_LIMIT: usize = 3900;

/// Reply to one goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalReply {
    /// Set when the goal was cut before sending
    pub trim_notice: Option<String>,
    pub outcome: Outcome,
}

/// Orchestrator plus shared endpoint configuration.
///
/// Clones share the endpoint store and the connection pool.
#[derive(Debug, Clone)]
pub struct Relay {
    store: EndpointStore,
    orchestrator: Orchestrator,
    max_goal_len: usize,
    max_depth: u32,
    extra: Map<String, Value>,
    max_reply_len: usize,
    health_timeout: Duration,
}

impl Relay {
    /// Build a relay with its own HTTP client.
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let client = HttpClient::new(config.client_config())?;
        Ok(Self::with_client(client, config))
    }

    /// Build a relay around an existing client.
    pub fn with_client(client: HttpClient, config: &RelayConfig) -> Self {
        Self {
            store: EndpointStore::new(config.endpoint_config()),
            orchestrator: Orchestrator::new(client, config.orchestrator_options()),
            max_goal_len: config.request.max_goal_len,
            max_depth: config.request.max_depth,
            extra: config.request.extra.clone(),
            max_reply_len: config.reply.max_reply_len,
            health_timeout: config.health_timeout(),
        }
    }

    pub fn endpoint(&self) -> &EndpointStore {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn client(&self) -> &HttpClient {
        self.orchestrator.client()
    }

    pub fn max_reply_len(&self) -> usize {
        self.max_reply_len
    }

    /// Build the request for `goal`, trimming it to the configured length.
    pub fn prepare(&self, goal: &str, user_id: i64) -> Result<(ExecutionRequest, Option<String>)> {
        let (goal, notice) = soft_trim(goal.trim(), self.max_goal_len);
        let request = ExecutionRequest::new(goal, user_id)?
            .with_max_depth(self.max_depth)
            .with_extra_fields(self.extra.clone());
        Ok((request, notice))
    }

    /// Run `request` against a snapshot of the current endpoint.
    ///
    /// The snapshot is taken once here; later endpoint changes only affect
    /// runs started after them.
    pub async fn run_request(&self, request: &ExecutionRequest) -> Outcome {
        self.run_request_with_cancel(request, CancellationToken::new())
            .await
    }

    pub async fn run_request_with_cancel(
        &self,
        request: &ExecutionRequest,
        cancel: CancellationToken,
    ) -> Outcome {
        let snapshot = self.store.get();
        self.orchestrator
            .run_with_cancel(request, snapshot, cancel)
            .await
    }

    /// Trim, submit and follow one goal to its outcome.
    pub async fn run_goal(&self, goal: &str, user_id: i64) -> Result<GoalReply> {
        self.run_goal_with_cancel(goal, user_id, CancellationToken::new())
            .await
    }

    pub async fn run_goal_with_cancel(
        &self,
        goal: &str,
        user_id: i64,
        cancel: CancellationToken,
    ) -> Result<GoalReply> {
        let (request, trim_notice) = self.prepare(goal, user_id)?;
        let outcome = self.run_request_with_cancel(&request, cancel).await;
        Ok(GoalReply {
            trim_notice,
            outcome,
        })
    }

    /// Point the relay at a new base URL, keeping the headers.
    pub fn set_url(&self, url: &str) -> Result<Arc<EndpointConfig>> {
        let url = url.trim();
        if url.is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "Usage: /seturl http://host:port/api/v1/executions".to_string(),
            ));
        }
        Ok(self.store.update(|current| current.with_base_url(url)))
    }

    /// Replace the whole header set from a JSON object of string values.
    pub fn set_headers_json(&self, raw: &str) -> Result<Arc<EndpointConfig>> {
        let headers = HeaderSet::from_json_str(raw.trim())?;
        Ok(self.set_headers(headers))
    }

    pub fn set_headers(&self, headers: HeaderSet) -> Arc<EndpointConfig> {
        self.store.update(|current| current.with_headers(headers))
    }

    /// Current settings as display text.
    pub fn show(&self) -> String {
        format!("Current settings:\n{}", self.store.get())
    }

    /// POST an arbitrary JSON object to the base URL, unmediated.
    pub async fn raw_post(&self, body: &Value) -> Result<HttpReply> {
        if !body.is_object() {
            return Err(OrchestratorError::InvalidRequest(
                "Top-level JSON must be an object.".to_string(),
            ));
        }

        let snapshot = self.store.get();
        let url = snapshot.create_url();
        info!(url = %url, "Sending raw request");
        let reply = self
            .client()
            .post_json(&url, snapshot.headers.as_pairs(), body, None)
            .await?;
        Ok(reply)
    }

    /// GET `{health_base}/health` with the short health timeout.
    pub async fn health(&self) -> HealthReport {
        let snapshot = self.store.get();
        HealthReport::check(self.client(), &snapshot, self.health_timeout).await
    }
}

/// Render a raw reply as `Status: <code>` followed by the body.
pub fn render_raw(reply: &HttpReply) -> String {
    let body = reply.body_text(RAW_BODY_LIMIT);
    let body = if body.is_empty() { "(empty)".to_string() } else { body };
    truncate_chars(&format!("Status: {}\n{}", reply.status, body), RAW_REPLY_LIMIT)
}
