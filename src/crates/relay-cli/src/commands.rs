//! Handlers for the one-shot subcommands
//!
//! Handlers return the text to print instead of printing it, so the binary
//! owns stdout and the tests can inspect output directly.

use crate::cli::OutputFormat;
use crate::version::VersionInfo;
use anyhow::{bail, Context};
use orchestrator::{render_raw, Relay};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use utils::ReplyBody;

/// Text to print plus whether the command achieved what it was asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }

    fn with_success(text: impl Into<String>, success: bool) -> Self {
        Self {
            text: text.into(),
            success,
        }
    }
}

/// Arguments of `relay run`.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub goal: String,
    pub user_id: i64,
    pub max_depth: Option<u32>,
    pub extra: Option<String>,
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("failed to encode output")
}

fn parse_object(raw: &str, what: &str) -> anyhow::Result<Map<String, Value>> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("{} is not valid JSON", what))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must be a JSON object", what),
    }
}

/// Submit one goal and wait for its outcome.
pub async fn run(
    relay: &Relay,
    args: RunArgs,
    format: OutputFormat,
    cancel: CancellationToken,
) -> anyhow::Result<CommandOutput> {
    let (mut request, trim_notice) = relay.prepare(&args.goal, args.user_id)?;
    if let Some(max_depth) = args.max_depth {
        request = request.with_max_depth(max_depth);
    }
    if let Some(extra) = args.extra.as_deref() {
        request = request.with_extra_fields(parse_object(extra, "--extra")?);
    }

    let outcome = relay.run_request_with_cancel(&request, cancel).await;
    let success = !outcome.is_failure();

    let text = match format {
        OutputFormat::Text => {
            let reply = outcome.render(relay.max_reply_len());
            match trim_notice {
                Some(notice) => format!("{}\n{}", notice, reply),
                None => reply,
            }
        }
        OutputFormat::Json => to_json(&json!({
            "goal": request.goal(),
            "trim_notice": trim_notice,
            "result": outcome,
        }))?,
    };

    Ok(CommandOutput::with_success(text, success))
}

/// POST a raw JSON object and show whatever came back.
pub async fn raw(relay: &Relay, body: &str, format: OutputFormat) -> anyhow::Result<CommandOutput> {
    let body = Value::Object(parse_object(body, "body")?);
    let reply = relay.raw_post(&body).await?;
    let success = reply.is_success();

    let text = match format {
        OutputFormat::Text => render_raw(&reply),
        OutputFormat::Json => {
            let body = match &reply.body {
                ReplyBody::Json(value) => value.clone(),
                ReplyBody::Text(text) => Value::String(text.clone()),
            };
            to_json(&json!({"status": reply.status, "body": body}))?
        }
    };

    Ok(CommandOutput::with_success(text, success))
}

pub async fn ping(relay: &Relay, format: OutputFormat) -> anyhow::Result<CommandOutput> {
    let report = relay.health().await;
    let text = match format {
        OutputFormat::Text => report.render(),
        OutputFormat::Json => to_json(&report)?,
    };
    Ok(CommandOutput::with_success(text, report.healthy))
}

pub fn show(relay: &Relay, format: OutputFormat) -> anyhow::Result<CommandOutput> {
    match format {
        OutputFormat::Text => Ok(CommandOutput::ok(relay.show())),
        OutputFormat::Json => {
            let endpoint = relay.endpoint().get();
            let value = json!({
                "url": endpoint.create_url(),
                "base": endpoint.health_base(),
                "headers": endpoint.headers,
            });
            Ok(CommandOutput::ok(to_json(&value)?))
        }
    }
}

pub fn version(format: OutputFormat) -> anyhow::Result<CommandOutput> {
    let info = VersionInfo::get();
    match format {
        OutputFormat::Text => Ok(CommandOutput::ok(info.to_string())),
        OutputFormat::Json => Ok(CommandOutput::ok(to_json(&info)?)),
    }
}

/// Render an error from a handler the way it is shown to the user.
pub fn describe_error(error: &anyhow::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format!("❌ {:#}", error),
        OutputFormat::Json => json!({"error": format!("{:#}", error)}).to_string(),
    }
}
