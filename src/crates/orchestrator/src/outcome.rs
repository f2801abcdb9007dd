//! Typed orchestration outcomes and their user-facing rendering

use serde::{Deserialize, Serialize};
use std::fmt;
use utils::truncate_chars;

/// Failure classes an orchestration can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The job could not be started
    Create,
    /// The backend could not be reached within the retry budget
    Network,
    /// The backend answered with a non-2xx it will not retry
    Http,
    /// 2xx with a body that does not have the expected shape
    Decode,
    /// The overall deadline elapsed, or the run was cancelled
    Timeout,
    /// The terminal result could not be retrieved
    Fetch,
}

impl ErrorKind {
    /// Stable code for logs and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Create => "create_err",
            ErrorKind::Network => "network_err",
            ErrorKind::Http => "http_err",
            ErrorKind::Decode => "decode_err",
            ErrorKind::Timeout => "timeout_err",
            ErrorKind::Fetch => "fetch_err",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub detail: String,
    /// HTTP status of the response that caused the failure, if there was one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl Failure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// User-facing message for this failure.
    pub fn message(&self) -> String {
        match (self.kind, self.status_code) {
            (ErrorKind::Timeout, _) => {
                format!("⚠️ Backend timed out. Try again shortly.\n\nDetails: {}", self.detail)
            }
            (ErrorKind::Network, _) => {
                format!("❌ Network error. Backend unreachable.\n\nDetails: {}", self.detail)
            }
            (ErrorKind::Http | ErrorKind::Create, Some(code)) => {
                format!("❌ Backend error {}:\n{}", code, self.detail)
            }
            (ErrorKind::Http | ErrorKind::Create, None) => {
                format!("❌ Backend error:\n{}", self.detail)
            }
            (ErrorKind::Decode, _) => {
                format!("❌ Backend returned an unreadable response:\n{}", self.detail)
            }
            (ErrorKind::Fetch, _) => {
                format!("❌ Could not retrieve the final result:\n{}", self.detail)
            }
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} ({}): {}", self.kind, code, self.detail),
            None => write!(f, "{}: {}", self.kind, self.detail),
        }
    }
}

/// Result of one orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// The backend produced renderable text
    Text { text: String },
    /// The backend finished but gave no recognised text field.
    /// `body` is a compact dump of what it did return.
    Empty { body: String },
    /// The orchestration failed
    Failed(Failure),
}

impl Outcome {
    pub fn text(text: impl Into<String>) -> Self {
        Outcome::Text { text: text.into() }
    }

    pub fn failed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Outcome::Failed(Failure::new(kind, detail))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure().map(|f| f.kind)
    }

    /// User-visible reply, truncated to `limit` characters.
    pub fn render(&self, limit: usize) -> String {
        let reply = match self {
            Outcome::Text { text } => text.clone(),
            Outcome::Empty { body } => {
                format!("✅ Success, but no simple text field found:\n{}", body)
            }
            Outcome::Failed(failure) => failure.message(),
        };
        truncate_chars(&reply, limit)
    }
}
