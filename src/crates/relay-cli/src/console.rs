//! Line-oriented console
//!
//! Each input line is either a `/command` handled in place or a goal that
//! runs as its own task, so a slow goal never blocks the next line. Replies
//! from every task funnel through one channel in completion order.

use crate::replies;
use orchestrator::{render_raw, Relay};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Show,
    SetUrl(String),
    SetHeaders(String),
    Raw(String),
    Ping,
    Help,
    Unknown(String),
    Goal(String),
    Blank,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        let Some(command_line) = line.strip_prefix('/') else {
            return Self::Goal(line.to_string());
        };

        let (name, rest) = match command_line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim().to_string()),
            None => (command_line, String::new()),
        };
        // Chat clients may address commands as /name@bot
        let name = name.split('@').next().unwrap_or(name);

        match name.to_ascii_lowercase().as_str() {
            "show" => Self::Show,
            "seturl" => Self::SetUrl(rest),
            "setheaders" => Self::SetHeaders(rest),
            "raw" => Self::Raw(rest),
            "ping" => Self::Ping,
            "help" | "start" => Self::Help,
            _ => Self::Unknown(name.to_string()),
        }
    }
}

/// Dispatches console lines against a shared [`Relay`].
pub struct Console {
    relay: Relay,
    user_id: i64,
    replies: mpsc::UnboundedSender<String>,
    tasks: JoinSet<()>,
    cancel: CancellationToken,
}

impl Console {
    /// Create a console and the receiving end of its reply channel.
    pub fn new(relay: Relay, user_id: i64) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (replies, receiver) = mpsc::unbounded_channel();
        let console = Self {
            relay,
            user_id,
            replies,
            tasks: JoinSet::new(),
            cancel: CancellationToken::new(),
        };
        (console, receiver)
    }

    /// Token whose cancellation stops every in-flight goal.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of goals, raw calls and pings still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    fn reply(&self, text: impl Into<String>) {
        // The receiver only goes away on shutdown.
        let _ = self.replies.send(text.into());
    }

    /// Handle one input line. Network work is spawned; the rest replies immediately.
    pub fn handle_line(&mut self, line: &str) {
        let command = ConsoleCommand::parse(line);
        debug!(?command, "Console line");

        match command {
            ConsoleCommand::Blank => {}
            ConsoleCommand::Help => self.reply(replies::HELP),
            ConsoleCommand::Unknown(_) => self.reply(replies::UNKNOWN_COMMAND),
            ConsoleCommand::Show => self.reply(self.relay.show()),
            ConsoleCommand::SetUrl(url) if url.is_empty() => self.reply(replies::SETURL_USAGE),
            ConsoleCommand::SetUrl(url) => match self.relay.set_url(&url) {
                Ok(config) => self.reply(replies::url_set(&config)),
                Err(e) => self.reply(replies::call_error(&e)),
            },
            ConsoleCommand::SetHeaders(raw) if raw.is_empty() => {
                self.reply(replies::SETHEADERS_USAGE)
            }
            ConsoleCommand::SetHeaders(raw) => match self.relay.set_headers_json(&raw) {
                Ok(config) => self.reply(replies::headers_set(&config)),
                Err(_) => self.reply(replies::SETHEADERS_ERR),
            },
            ConsoleCommand::Raw(raw) if raw.is_empty() => self.reply(replies::RAW_USAGE),
            ConsoleCommand::Raw(raw) => self.spawn_raw(&raw),
            ConsoleCommand::Ping => self.spawn_ping(),
            ConsoleCommand::Goal(goal) => self.spawn_goal(goal),
        }
    }

    fn spawn_raw(&mut self, raw: &str) {
        let body: Value = match serde_json::from_str(raw) {
            Ok(body) => body,
            Err(e) => return self.reply(replies::json_parse_error(e)),
        };
        if !body.is_object() {
            return self.reply(replies::json_parse_error("Top-level JSON must be an object."));
        }

        let relay = self.relay.clone();
        let replies = self.replies.clone();
        self.tasks.spawn(async move {
            let text = match relay.raw_post(&body).await {
                Ok(reply) => render_raw(&reply),
                Err(e) => replies::call_error(&e),
            };
            let _ = replies.send(text);
        });
    }

    fn spawn_ping(&mut self) {
        let relay = self.relay.clone();
        let replies = self.replies.clone();
        self.tasks.spawn(async move {
            let report = relay.health().await;
            let _ = replies.send(report.render());
        });
    }

    fn spawn_goal(&mut self, goal: String) {
        let relay = self.relay.clone();
        let replies = self.replies.clone();
        let user_id = self.user_id;
        let cancel = self.cancel.child_token();

        self.tasks.spawn(async move {
            match relay.run_goal_with_cancel(&goal, user_id, cancel).await {
                Ok(reply) => {
                    if let Some(notice) = reply.trim_notice {
                        let _ = replies.send(notice);
                    }
                    let _ = replies.send(reply.outcome.render(relay.max_reply_len()));
                }
                Err(e) => {
                    let _ = replies.send(replies::call_error(&e));
                }
            }
        });
    }

    /// Read lines until EOF or cancellation, then wait for every spawned task.
    pub async fn run<R>(mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        loop {
            let line = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Console cancelled, no longer reading input");
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                break;
            };
            self.handle_line(&line);
            self.reap_finished();
        }

        info!(in_flight = self.in_flight(), "Input closed, waiting for running goals");
        self.finish().await;
        Ok(())
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                self.reply(format!("❌ Unexpected error: {}", e));
            }
        }
    }

    /// Wait for all spawned tasks to finish.
    pub async fn finish(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                self.reply(format!("❌ Unexpected error: {}", e));
            }
        }
    }
}
