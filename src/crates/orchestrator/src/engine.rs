//! Execution orchestrator
//!
//! Drives one goal through the backend lifecycle as an explicit state machine:
//!
//! ```text
//! Created ──► Submitted ──► Polling ──► Fetched ──► Done
//!    │            │            │  ▲         │
//!    └────────────┴────────────┴──┴─────────┴──► Failed
//! ```
//!
//! Every wait (create, each poll, the inter-poll sleep, the fetch) is a
//! suspension point raced against the cancellation token. Polling is also
//! bounded by an overall deadline measured from the start of the run, and
//! a run of consecutive poll failures longer than `max_poll_failure` ends the
//! run as a network failure instead of silently burning the whole deadline.

use crate::endpoint::EndpointConfig;
use crate::extract::{extract_final_result, Extracted};
use crate::job::{ExecutionHandle, ExecutionRequest, ExecutionStatus};
use crate::outcome::{ErrorKind, Failure, Outcome};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use utils::{truncate_chars, HttpClient, HttpReply};
use uuid::Uuid;

/// Deadline used when `max_wait` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Timing and size limits for an orchestration.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorOptions {
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Overall deadline for reaching a terminal status
    pub max_wait: Duration,
    /// Longest run of consecutive poll failures tolerated
    pub max_poll_failure: Duration,
    pub create_timeout: Duration,
    pub status_timeout: Duration,
    pub result_timeout: Duration,
    /// Character cap on response bodies quoted in outcomes
    pub max_body_len: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            max_wait: Duration::from_secs(120),
            max_poll_failure: Duration::from_secs(30),
            create_timeout: Duration::from_secs(15),
            status_timeout: Duration::from_secs(10),
            result_timeout: Duration::from_secs(15),
            max_body_len: 2000,
        }
    }
}

impl OrchestratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_max_poll_failure(mut self, window: Duration) -> Self {
        self.max_poll_failure = window;
        self
    }

    pub fn with_create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = timeout;
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn with_result_timeout(mut self, timeout: Duration) -> Self {
        self.result_timeout = timeout;
        self
    }

    pub fn with_max_body_len(mut self, max_body_len: usize) -> Self {
        self.max_body_len = max_body_len;
        self
    }
}

/// State of one orchestration.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Request built, nothing sent yet
    Created,
    /// The backend accepted the job; no status observed yet
    Submitted(ExecutionHandle),
    /// Last observed status was not terminal
    Polling(ExecutionHandle),
    /// Terminal status observed and the result payload retrieved
    Fetched {
        handle: ExecutionHandle,
        payload: Value,
    },
    Done(Outcome),
    Failed(Failure),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Submitted(_) => "submitted",
            Phase::Polling(_) => "polling",
            Phase::Fetched { .. } => "fetched",
            Phase::Done(_) => "done",
            Phase::Failed(_) => "failed",
        }
    }

    /// `Done` and `Failed` end the run.
    pub fn is_final(&self) -> bool {
        matches!(self, Phase::Done(_) | Phase::Failed(_))
    }
}

/// Runs orchestrations over a shared HTTP client.
///
/// Cheap to clone; each call to [`Orchestrator::run`] is independent and may
/// run concurrently with any number of others.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    client: HttpClient,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(client: HttpClient, options: OrchestratorOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Run one orchestration against `endpoint` to completion.
    pub async fn run(&self, request: &ExecutionRequest, endpoint: Arc<EndpointConfig>) -> Outcome {
        self.run_with_cancel(request, endpoint, CancellationToken::new())
            .await
    }

    /// Like [`Orchestrator::run`], but ends early as a `Timeout` failure with
    /// detail `"cancelled"` once `cancel` fires. The backend job is left alone.
    pub async fn run_with_cancel(
        &self,
        request: &ExecutionRequest,
        endpoint: Arc<EndpointConfig>,
        cancel: CancellationToken,
    ) -> Outcome {
        let span = info_span!(
            "orchestration",
            run_id = %Uuid::new_v4(),
            user_id = request.user_id()
        );

        Run::new(self, request, endpoint, cancel)
            .drive()
            .instrument(span)
            .await
    }
}

/// Per-run mutable state.
struct Run<'a> {
    client: &'a HttpClient,
    options: &'a OrchestratorOptions,
    request: &'a ExecutionRequest,
    endpoint: Arc<EndpointConfig>,
    cancel: CancellationToken,
    started: Instant,
    deadline: Instant,
    failing_since: Option<Instant>,
    last_poll_error: Option<String>,
}

enum PollReply {
    Status(ExecutionStatus),
    /// Transient failure, tolerated until the failure window runs out
    Transient(String),
    Fatal(Failure),
}

impl<'a> Run<'a> {
    fn new(
        orchestrator: &'a Orchestrator,
        request: &'a ExecutionRequest,
        endpoint: Arc<EndpointConfig>,
        cancel: CancellationToken,
    ) -> Self {
        let started = Instant::now();
        Self {
            client: &orchestrator.client,
            options: &orchestrator.options,
            request,
            endpoint,
            cancel,
            started,
            deadline: started
                .checked_add(orchestrator.options.max_wait)
                .unwrap_or_else(|| started + FAR_FUTURE),
            failing_since: None,
            last_poll_error: None,
        }
    }

    async fn drive(mut self) -> Outcome {
        let mut phase = Phase::Created;

        loop {
            phase = match phase {
                Phase::Done(outcome) => {
                    info!(
                        elapsed_ms = self.started.elapsed().as_millis() as u64,
                        empty = matches!(outcome, Outcome::Empty { .. }),
                        "Orchestration finished"
                    );
                    return outcome;
                }
                Phase::Failed(failure) => {
                    warn!(
                        elapsed_ms = self.started.elapsed().as_millis() as u64,
                        kind = %failure.kind,
                        detail = %failure.detail,
                        "Orchestration failed"
                    );
                    return Outcome::Failed(failure);
                }
                phase => {
                    debug!(phase = phase.name(), "Advancing orchestration");
                    self.step(phase).await
                }
            };
        }
    }

    async fn step(&mut self, phase: Phase) -> Phase {
        match phase {
            Phase::Created => self.create().await,
            Phase::Submitted(handle) => self.poll(handle).await,
            Phase::Polling(handle) => match self.wait_interval().await {
                Some(stop) => stop,
                None => self.poll(handle).await,
            },
            Phase::Fetched { handle, payload } => self.finish(&handle, &payload),
            done @ (Phase::Done(_) | Phase::Failed(_)) => done,
        }
    }

    fn cancelled(&self) -> Phase {
        Phase::Failed(Failure::new(ErrorKind::Timeout, "cancelled"))
    }

    fn timed_out(&self, status: &ExecutionStatus) -> Phase {
        let mut detail = format!(
            "Backend timed out waiting for result after {}s (last status={})",
            self.options.max_wait.as_secs_f32(),
            status
        );
        if let Some(error) = &self.last_poll_error {
            detail.push_str(&format!("; last poll error: {}", error));
        }
        Phase::Failed(Failure::new(ErrorKind::Timeout, detail))
    }

    fn body_excerpt(&self, reply: &HttpReply) -> String {
        reply.body_text(self.options.max_body_len)
    }

    async fn create(&mut self) -> Phase {
        let url = self.endpoint.create_url();
        let body = self.request.to_body();

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.client.post_json(
                &url,
                self.endpoint.headers.as_pairs(),
                &body,
                Some(self.options.create_timeout),
            ) => Some(result),
        };

        let reply = match result {
            None => return self.cancelled(),
            Some(Ok(reply)) => reply,
            Some(Err(e)) if e.is_transport() => {
                return Phase::Failed(Failure::new(ErrorKind::Network, e.to_string()));
            }
            Some(Err(e)) => {
                return Phase::Failed(Failure::new(ErrorKind::Create, e.to_string()));
            }
        };

        if !reply.is_success() {
            return Phase::Failed(
                Failure::new(ErrorKind::Create, self.body_excerpt(&reply)).with_status(reply.status),
            );
        }

        let Some(json) = reply.json() else {
            return Phase::Failed(
                Failure::new(
                    ErrorKind::Decode,
                    format!("create response is not JSON: {}", self.body_excerpt(&reply)),
                )
                .with_status(reply.status),
            );
        };

        match ExecutionHandle::from_create_response(json) {
            Some(handle) => {
                info!(execution_id = %handle.execution_id, url = %url, "Execution started");
                Phase::Submitted(handle)
            }
            None => Phase::Failed(Failure::new(
                ErrorKind::Create,
                format!("(no execution_id)\n{}", self.body_excerpt(&reply)),
            )),
        }
    }

    /// Sleep until the next poll. Returns the final phase if the run must stop instead.
    async fn wait_interval(&self) -> Option<Phase> {
        let now = Instant::now();
        let delay = self
            .options
            .poll_interval
            .min(self.deadline.saturating_duration_since(now));

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Some(self.cancelled()),
            _ = tokio::time::sleep(delay) => None,
        }
    }

    async fn poll(&mut self, mut handle: ExecutionHandle) -> Phase {
        if Instant::now() >= self.deadline {
            return self.timed_out(&handle.status);
        }

        let url = self.endpoint.status_url(&handle.execution_id);
        let poll_started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled(),
            result = tokio::time::timeout_at(
                self.deadline,
                self.client.get(
                    &url,
                    self.endpoint.headers.as_pairs(),
                    Some(self.options.status_timeout),
                ),
            ) => result,
        };

        let reply = match result {
            Err(_) => return self.timed_out(&handle.status),
            Ok(reply) => self.classify_poll(reply),
        };

        match reply {
            PollReply::Status(status) => {
                if let Some(since) = self.failing_since.take() {
                    info!(
                        execution_id = %handle.execution_id,
                        failing_ms = since.elapsed().as_millis() as u64,
                        "Status polling recovered"
                    );
                }
                self.last_poll_error = None;

                if status != handle.status {
                    info!(execution_id = %handle.execution_id, status = %status, "Execution status changed");
                }
                handle.status = status;

                if handle.status.is_terminal() {
                    self.fetch(handle).await
                } else {
                    Phase::Polling(handle)
                }
            }
            PollReply::Transient(error) => {
                // The window opens when the first failing poll was sent.
                let since = *self.failing_since.get_or_insert(poll_started);
                let failing_for = since.elapsed();
                warn!(
                    execution_id = %handle.execution_id,
                    failing_ms = failing_for.as_millis() as u64,
                    error = %error,
                    "Status poll failed"
                );

                if failing_for > self.options.max_poll_failure {
                    return Phase::Failed(Failure::new(
                        ErrorKind::Network,
                        format!(
                            "status polling failed for {:.1}s: {}",
                            failing_for.as_secs_f32(),
                            error
                        ),
                    ));
                }
                self.last_poll_error = Some(error);
                Phase::Polling(handle)
            }
            PollReply::Fatal(failure) => Phase::Failed(failure),
        }
    }

    fn classify_poll(&self, result: utils::Result<HttpReply>) -> PollReply {
        let reply = match result {
            Ok(reply) => reply,
            Err(e) if e.is_transport() => return PollReply::Transient(e.to_string()),
            Err(e) => {
                return PollReply::Fatal(Failure::new(ErrorKind::Network, e.to_string()));
            }
        };

        if (400..500).contains(&reply.status) {
            return PollReply::Fatal(
                Failure::new(ErrorKind::Http, self.body_excerpt(&reply)).with_status(reply.status),
            );
        }
        if !reply.is_success() {
            return PollReply::Transient(format!(
                "HTTP {}: {}",
                reply.status,
                self.body_excerpt(&reply)
            ));
        }

        match reply
            .json()
            .and_then(|json| json.get("status"))
            .and_then(Value::as_str)
        {
            Some(raw) => PollReply::Status(ExecutionStatus::parse(raw)),
            None => PollReply::Transient(format!(
                "status response has no status field: {}",
                self.body_excerpt(&reply)
            )),
        }
    }

    async fn fetch(&self, handle: ExecutionHandle) -> Phase {
        let url = self.endpoint.result_url(&handle.execution_id);
        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return self.cancelled(),
            result = self.client.get(
                &url,
                self.endpoint.headers.as_pairs(),
                Some(self.options.result_timeout),
            ) => result,
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => return Phase::Failed(Failure::new(ErrorKind::Fetch, e.to_string())),
        };

        if !reply.is_success() {
            return Phase::Failed(
                Failure::new(ErrorKind::Fetch, self.body_excerpt(&reply)).with_status(reply.status),
            );
        }

        match reply.json() {
            Some(payload) => {
                debug!(execution_id = %handle.execution_id, status = %handle.status, "Result fetched");
                Phase::Fetched {
                    payload: payload.clone(),
                    handle,
                }
            }
            None => Phase::Failed(Failure::new(
                ErrorKind::Fetch,
                format!("result response is not JSON: {}", self.body_excerpt(&reply)),
            )),
        }
    }

    fn finish(&self, handle: &ExecutionHandle, payload: &Value) -> Phase {
        match extract_final_result(payload) {
            Extracted::Text(text) => Phase::Done(Outcome::text(text)),
            Extracted::NoText => {
                debug!(execution_id = %handle.execution_id, "Result carries no text field");
                let summary = json!({
                    "status": payload.get("status").cloned().unwrap_or(Value::Null),
                    "final_result": payload.get("final_result").cloned().unwrap_or(Value::Null),
                });
                Phase::Done(Outcome::Empty {
                    body: compact_json(&summary, self.options.max_body_len),
                })
            }
        }
    }
}

/// Pretty-printed JSON cut to `limit` characters.
pub(crate) fn compact_json(value: &Value, limit: usize) -> String {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    truncate_chars(&text, limit)
}
