//! Command-line arguments

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "relay")]
#[command(about = "Relay goals to an asynchronous execution backend", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file (toml, yaml or json), applied over ~/.relay and ./.relay
    #[arg(short, long, global = true, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Submit a goal and wait for its final text
    Run {
        /// The goal to send
        #[arg(required = true, num_args = 1..)]
        goal: Vec<String>,

        /// User id sent with the execution
        #[arg(short, long, default_value_t = 0)]
        user_id: i64,

        /// Override the configured max_depth
        #[arg(short, long)]
        max_depth: Option<u32>,

        /// Extra JSON object merged into the create body
        #[arg(short, long)]
        extra: Option<String>,
    },

    /// POST a raw JSON object to the execution endpoint
    Raw {
        /// JSON object body
        body: String,
    },

    /// GET the backend health endpoint
    Ping,

    /// Show the effective endpoint settings
    Show,

    /// Read lines from stdin; commands start with '/', anything else runs a goal
    Console {
        /// User id sent with every goal
        #[arg(short, long, default_value_t = 0)]
        user_id: i64,
    },

    /// Show version information
    Version,
}
