//! Relay facade tests: endpoint swaps, raw pass-through and health.

mod common;

use common::*;
use orchestrator::{render_raw, ErrorKind, OrchestratorError, Outcome, Relay, RelayConfig};
use serde_json::json;
use std::time::Duration;
use utils::UtilsError;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn wait_for_request(server: &MockServer, http_method: &str, request_path: &str) {
    for _ in 0..100 {
        if count(server, http_method, request_path).await > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no {} {} observed", http_method, request_path);
}

#[tokio::test]
async fn run_goal_uses_config_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXECUTIONS))
        .and(body_json(json!({
            "config_overrides": {"observability": {"mlflow": {"enabled": false}}},
            "goal": "summarise",
            "user_id": 99,
            "max_depth": 1
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"execution_id": "ex-1"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, "ex-1", "completed").await;
    mount_result(&server, "ex-1", json!({"final_result": {"result": "summary"}})).await;

    let mut config = relay_config(&server);
    config.request.extra.insert(
        "config_overrides".to_string(),
        json!({"observability": {"mlflow": {"enabled": false}}}),
    );
    let relay = Relay::from_config(&config).expect("relay");

    let reply = relay.run_goal("  summarise  ", 99).await.expect("reply");
    assert_eq!(reply.outcome, Outcome::text("summary"));
    assert!(reply.trim_notice.is_none());
}

#[tokio::test]
async fn long_goal_is_trimmed_with_notice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXECUTIONS))
        .and(body_json(json!({"goal": "abcd", "user_id": 1, "max_depth": 1})))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"execution_id": "ex-1"})))
        .expect(1)
        .mount(&server)
        .await;
    mount_status(&server, "ex-1", "completed").await;
    mount_result(&server, "ex-1", json!({"final_result": "ok"})).await;

    let mut config = relay_config(&server);
    config.request.max_goal_len = 4;
    let relay = Relay::from_config(&config).expect("relay");

    let reply = relay.run_goal("abcdefgh", 1).await.expect("reply");
    assert_eq!(reply.outcome, Outcome::text("ok"));
    assert_eq!(
        reply.trim_notice.as_deref(),
        Some("Note: your message was long; I sent the first 4 characters.")
    );
}

#[tokio::test]
async fn blank_goal_is_rejected_before_sending() {
    let server = MockServer::start().await;
    let relay = relay(&server);

    let result = relay.run_goal(" \n ", 1).await;
    assert!(matches!(result, Err(OrchestratorError::InvalidRequest(_))));
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 0);
}

#[tokio::test]
async fn endpoint_swap_before_start_targets_new_backend() {
    let old = MockServer::start().await;
    let new = MockServer::start().await;
    mount_create(&new, "ex-b").await;
    mount_status(&new, "ex-b", "completed").await;
    mount_result(&new, "ex-b", json!({"final_result": "from new"})).await;

    let relay = relay(&old);
    relay.set_url(&base_url(&new)).expect("set url");

    let reply = relay.run_goal("hello", 1).await.expect("reply");
    assert_eq!(reply.outcome, Outcome::text("from new"));
    assert_eq!(old.received_requests().await.unwrap_or_default().len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn endpoint_swap_mid_flight_keeps_the_create_snapshot() {
    let old = MockServer::start().await;
    let new = MockServer::start().await;

    mount_create(&old, "ex-a").await;
    mount_status_times(&old, "ex-a", "running", 4).await;
    mount_status(&old, "ex-a", "completed").await;
    mount_result(&old, "ex-a", json!({"final_result": "from old"})).await;

    mount_create(&new, "ex-b").await;
    mount_status(&new, "ex-b", "completed").await;
    mount_result(&new, "ex-b", json!({"final_result": "from new"})).await;

    let mut config = relay_config(&old);
    config.polling.interval_ms = 100;
    let relay = Relay::from_config(&config).expect("relay");

    let in_flight = {
        let relay = relay.clone();
        tokio::spawn(async move { relay.run_goal("first", 1).await })
    };

    wait_for_request(&old, "POST", EXECUTIONS).await;
    relay.set_url(&base_url(&new)).expect("set url");

    let first = in_flight.await.expect("join").expect("reply");
    assert_eq!(first.outcome, Outcome::text("from old"));
    assert_eq!(count(&old, "GET", &result_path("ex-a")).await, 1);
    assert_eq!(new.received_requests().await.unwrap_or_default().len(), 0);

    let second = relay.run_goal("second", 1).await.expect("reply");
    assert_eq!(second.outcome, Outcome::text("from new"));
    assert_eq!(count(&old, "POST", EXECUTIONS).await, 1);
}

#[tokio::test]
async fn header_swap_applies_to_later_runs() {
    let server = MockServer::start().await;
    mount_create(&server, "ex-1").await;
    mount_status(&server, "ex-1", "completed").await;
    mount_result(&server, "ex-1", json!({"final_result": "ok"})).await;

    let relay = relay(&server);
    relay
        .set_headers_json(r#"{"Content-Type": "application/json", "X-Api-Key": "k2"}"#)
        .expect("set headers");
    relay.run_goal("hello", 1).await.expect("reply");

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 3);
    for request in &requests {
        assert_eq!(
            request.headers.get("x-api-key").map(|v| v.to_str().unwrap()),
            Some("k2")
        );
    }
}

#[tokio::test]
async fn raw_post_passes_through_any_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXECUTIONS))
        .and(body_json(json!({"goal": "hello", "max_depth": 1})))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"detail": "user_id required"})))
        .expect(1)
        .mount(&server)
        .await;

    let reply = relay(&server)
        .raw_post(&json!({"goal": "hello", "max_depth": 1}))
        .await
        .expect("reply");

    assert_eq!(reply.status, 422);
    let rendered = render_raw(&reply);
    assert!(rendered.starts_with("Status: 422\n{"));
    assert!(rendered.contains("user_id required"));
}

#[tokio::test]
async fn raw_post_to_unreachable_backend_is_an_error() {
    let mut config = RelayConfig::default();
    config.endpoint.base_url = format!("http://127.0.0.1:{}{}", unused_port(), EXECUTIONS);
    config.http.max_retries = 0;
    let relay = Relay::from_config(&config).expect("relay");

    let result = relay.raw_post(&json!({"goal": "x"})).await;
    assert!(matches!(
        result,
        Err(OrchestratorError::Utils(UtilsError::Network { .. }))
    ));
}

#[tokio::test]
async fn health_reports_raw_status_without_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let report = relay(&server).health().await;

    assert_eq!(report.status_code, Some(200));
    assert!(report.healthy);
    assert_eq!(report.url, format!("{}/api/v1/health", server.uri()));
    assert!(report.render().starts_with("✅ Ping OK: GET "));

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests[0].headers.get("content-type").is_none());
}

#[tokio::test]
async fn health_of_unreachable_backend() {
    let mut config = RelayConfig::default();
    config.endpoint.base_url = format!("http://127.0.0.1:{}{}", unused_port(), EXECUTIONS);
    config.http.max_retries = 0;
    let relay = Relay::from_config(&config).expect("relay");

    let report = relay.health().await;
    assert_eq!(report.status_code, None);
    assert!(!report.healthy);
    assert!(report.error.is_some());
    assert!(report.render().starts_with("❌ Ping failed: GET "));
}

#[tokio::test]
async fn failure_rendering_through_the_relay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(EXECUTIONS))
        .respond_with(ResponseTemplate::new(401).set_body_string("missing token"))
        .mount(&server)
        .await;

    let relay = relay(&server);
    let reply = relay.run_goal("hello", 1).await.expect("reply");

    assert_eq!(reply.outcome.error_kind(), Some(ErrorKind::Create));
    assert_eq!(
        reply.outcome.render(relay.max_reply_len()),
        "❌ Backend error 401:\nmissing token"
    );
}
