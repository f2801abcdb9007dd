//! Execution request, handle and status types

use crate::{OrchestratorError, Result};
use serde_json::{Map, Value};
use std::fmt;

/// Last observed status of a backend execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
    /// Any status string outside the known set, kept verbatim
    Unknown(String),
}

impl ExecutionStatus {
    /// Classify a backend status string. Case and surrounding whitespace are ignored.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "timeout" | "timed_out" => Self::Timeout,
            "cancelled" => Self::Cancelled,
            _ => Self::Unknown(normalized),
        }
    }

    /// Terminal statuses never change again and always lead to a result fetch.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Timeout | Self::Cancelled
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Unknown(raw) if raw.is_empty() => "unknown",
            Self::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend-tracked execution, created by a successful submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionHandle {
    pub execution_id: String,
    pub status: ExecutionStatus,
}

impl ExecutionHandle {
    /// Handle for a freshly created execution whose status has not been polled yet.
    pub fn new(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: ExecutionStatus::Unknown(String::new()),
        }
    }

    /// Read `execution_id` from a create response. Numbers are coerced to strings.
    pub fn from_create_response(body: &Value) -> Option<Self> {
        match body.get("execution_id")? {
            Value::String(id) if !id.trim().is_empty() => Some(Self::new(id.trim())),
            Value::Number(n) => Some(Self::new(n.to_string())),
            _ => None,
        }
    }
}

/// One task to submit. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    goal: String,
    user_id: i64,
    max_depth: u32,
    extra: Map<String, Value>,
}

impl ExecutionRequest {
    /// Build a request. The goal must contain non-whitespace text.
    pub fn new(goal: impl Into<String>, user_id: i64) -> Result<Self> {
        let goal = goal.into();
        if goal.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "goal must not be empty".to_string(),
            ));
        }

        Ok(Self {
            goal,
            user_id,
            max_depth: 1,
            extra: Map::new(),
        })
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Add one extra body field.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Merge a set of extra body fields.
    pub fn with_extra_fields(mut self, fields: Map<String, Value>) -> Self {
        self.extra.extend(fields);
        self
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// JSON body for the create call. `goal`, `user_id` and `max_depth` win over extra fields of the same name.
    pub fn to_body(&self) -> Value {
        let mut body = self.extra.clone();
        body.insert("goal".to_string(), Value::String(self.goal.clone()));
        body.insert("user_id".to_string(), Value::from(self.user_id));
        body.insert("max_depth".to_string(), Value::from(self.max_depth));
        Value::Object(body)
    }
}

/// Cut a goal to `limit` characters. Returns the notice to show the user when trimmed.
pub fn soft_trim(goal: &str, limit: usize) -> (String, Option<String>) {
    match goal.char_indices().nth(limit) {
        Some((byte_idx, _)) => (
            goal[..byte_idx].to_string(),
            Some(format!(
                "Note: your message was long; I sent the first {} characters.",
                limit
            )),
        ),
        None => (goal.to_string(), None),
    }
}
