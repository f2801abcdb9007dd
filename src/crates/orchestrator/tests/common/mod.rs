//! Shared helpers for stub-backend tests.

#![allow(dead_code)]

use orchestrator::{EndpointConfig, HeaderSet, Orchestrator, OrchestratorOptions, Relay, RelayConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use utils::{ClientConfig, HttpClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const EXECUTIONS: &str = "/api/v1/executions";

pub fn fast_client(max_retries: u32) -> HttpClient {
    let config = ClientConfig::new()
        .with_max_retries(max_retries)
        .with_retry_delay(Duration::from_millis(10))
        .with_max_retry_delay(Duration::from_millis(40))
        .with_jitter(false)
        .with_timeout(Duration::from_secs(2));
    HttpClient::new(config).expect("client")
}

pub fn fast_options() -> OrchestratorOptions {
    OrchestratorOptions::new()
        .with_poll_interval(Duration::from_millis(50))
        .with_max_wait(Duration::from_secs(5))
        .with_max_poll_failure(Duration::from_secs(1))
        .with_create_timeout(Duration::from_secs(2))
        .with_status_timeout(Duration::from_secs(2))
        .with_result_timeout(Duration::from_secs(2))
}

pub fn orchestrator(max_retries: u32, options: OrchestratorOptions) -> Orchestrator {
    Orchestrator::new(fast_client(max_retries), options)
}

pub fn base_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), EXECUTIONS)
}

pub fn endpoint(server: &MockServer) -> Arc<EndpointConfig> {
    Arc::new(EndpointConfig::new(
        base_url(server),
        HeaderSet::json_defaults().with("Authorization", "Bearer test-token"),
    ))
}

pub fn relay_config(server: &MockServer) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.endpoint.base_url = base_url(server);
    config.polling.interval_ms = 50;
    config.polling.max_wait_secs = 5;
    config.polling.max_poll_failure_secs = 1;
    config.http.retry_delay_ms = 10;
    config.http.max_retry_delay_ms = 40;
    config.http.create_timeout_secs = 2;
    config.http.status_timeout_secs = 2;
    config.http.result_timeout_secs = 2;
    config.http.health_timeout_secs = 1;
    config
}

pub fn relay(server: &MockServer) -> Relay {
    Relay::from_config(&relay_config(server)).expect("relay")
}

pub async fn mount_create(server: &MockServer, execution_id: &str) {
    Mock::given(method("POST"))
        .and(path(EXECUTIONS))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({"execution_id": execution_id})),
        )
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, execution_id: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}/status", EXECUTIONS, execution_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": status})))
        .mount(server)
        .await;
}

/// Answer `status` for the first `times` polls only.
pub async fn mount_status_times(server: &MockServer, execution_id: &str, status: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}/status", EXECUTIONS, execution_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": status})))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

pub async fn mount_result(server: &MockServer, execution_id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", EXECUTIONS, execution_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Number of recorded requests with this method and path.
pub async fn count(server: &MockServer, http_method: &str, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path() == request_path)
        .count()
}

pub fn status_path(execution_id: &str) -> String {
    format!("{}/{}/status", EXECUTIONS, execution_id)
}

pub fn result_path(execution_id: &str) -> String {
    format!("{}/{}", EXECUTIONS, execution_id)
}

/// A local port with nothing listening on it.
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.local_addr().expect("addr").port()
}
