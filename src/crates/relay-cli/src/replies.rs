//! User-facing reply texts

use orchestrator::{EndpointConfig, OrchestratorError};
use utils::UtilsError;

pub const HELP: &str = "Send any message and I'll ask the backend, then return the final result.\n\n\
Commands:\n  \
/show                      current URL, base and headers\n  \
/seturl <url>              set the execution API URL\n  \
/setheaders <json object>  replace all headers\n  \
/raw <json object>         POST a raw body to the API URL\n  \
/ping                      GET {base}/health\n  \
/help                      this text";

pub const SETURL_USAGE: &str = "Usage: /seturl http://host:port/api/v1/executions";
pub const SETHEADERS_USAGE: &str = r#"Usage: /setheaders {"Authorization":"Bearer ..."}"#;
pub const SETHEADERS_ERR: &str = "❌ Invalid JSON headers.";
pub const RAW_USAGE: &str = r#"Usage: /raw {"goal":"hello","max_depth":1}"#;
pub const UNKNOWN_COMMAND: &str = "Unknown command. Type anything to run the pipeline.";
pub const TIMEOUT: &str = "⚠️ Backend timed out. Try again shortly.";
pub const NETWORK_ERR: &str = "❌ Network error. Backend unreachable.";

pub fn url_set(config: &EndpointConfig) -> String {
    format!(
        "✅ API URL set:\n{}\n(base: {})",
        config.base_url,
        config.health_base()
    )
}

pub fn headers_set(config: &EndpointConfig) -> String {
    let pretty = serde_json::to_string_pretty(&config.headers)
        .unwrap_or_else(|_| config.headers.to_json_string());
    format!("✅ Headers updated:\n{}", pretty)
}

pub fn json_parse_error(detail: impl std::fmt::Display) -> String {
    format!("❌ JSON parse error: {}", detail)
}

/// Reply for an error from a direct backend call.
pub fn call_error(error: &OrchestratorError) -> String {
    match error {
        OrchestratorError::Utils(UtilsError::Timeout { .. }) => TIMEOUT.to_string(),
        OrchestratorError::Utils(UtilsError::Network { message, .. }) => {
            format!("{}\n\nDetails: {}", NETWORK_ERR, message)
        }
        OrchestratorError::InvalidRequest(detail) => format!("❌ {}", detail),
        other => format!("❌ Unexpected error: {}", other),
    }
}
