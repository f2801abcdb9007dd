//! Relay command-line front end
//!
//! The `relay` binary wraps [`orchestrator::Relay`] with one-shot
//! subcommands and a line-oriented console that mirrors the chat commands.

pub mod cli;
pub mod commands;
pub mod console;
pub mod logging;
pub mod replies;
pub mod shutdown;
pub mod version;

pub use cli::{Cli, Commands, OutputFormat};
pub use commands::{CommandOutput, RunArgs};
pub use console::{Console, ConsoleCommand};
pub use version::{VersionInfo, VERSION};
