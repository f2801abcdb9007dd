//! Execution orchestrator for asynchronous job APIs
//!
//! This crate submits a free-form goal to a backend execution API, polls the
//! execution until it reaches a terminal status, fetches the final result and
//! reduces it to a single text value.
//!
//! ```text
//! caller ──► Relay ──► Orchestrator ──► HttpClient ──► backend
//!              │             │
//!              │             └──► extract ──► Outcome
//!              └──► EndpointStore (base URL + headers, atomically swapped)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use orchestrator::{Relay, RelayConfig};
//!
//! # async fn example() -> orchestrator::Result<()> {
//! let relay = Relay::from_config(&RelayConfig::default())?;
//! let reply = relay.run_goal("summarise the release notes", 42).await?;
//! println!("{}", reply.outcome.render(4000));
//! # Ok(())
//! # }
//! ```

pub mod endpoint;
pub mod engine;
pub mod extract;
pub mod health;
pub mod job;
pub mod outcome;
pub mod relay;
pub mod settings;

use thiserror::Error;

/// Errors raised before or around an orchestration.
///
/// Orchestration results themselves are reported as [`Outcome`], never as `Err`.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The caller supplied something the backend could never accept
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the HTTP or config utilities
    #[error(transparent)]
    Utils(#[from] utils::UtilsError),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

pub use endpoint::{EndpointConfig, EndpointStore, HeaderSet};
pub use engine::{Orchestrator, OrchestratorOptions, Phase};
pub use extract::{extract, extract_final_result, Extracted, FinalResult, TEXT_KEYS};
pub use health::HealthReport;
pub use job::{soft_trim, ExecutionHandle, ExecutionRequest, ExecutionStatus};
pub use outcome::{ErrorKind, Failure, Outcome};
pub use relay::{render_raw, GoalReply, Relay};
pub use settings::{
    ConfigLoader, HttpConfig, LogFormat, LoggingConfig, PollingConfig, RelayConfig, ReplyConfig,
    RequestConfig,
};
