//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Intentd - goal analysis and action-plan service
#[derive(Parser)]
#[command(
    name = "intentd",
    about = "Turns free-text goals into structured action plans via the Gemini API",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service (default)
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the full pipeline once and print the report as JSON
    Analyze {
        /// The goal text to analyze
        input: String,

        /// JSON file with prior session entries
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Run the clarification pre-check once and print the result as JSON
    Clarify {
        /// The goal text to analyze
        input: String,
    },
}
