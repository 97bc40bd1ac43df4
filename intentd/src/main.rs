//! Intentd - goal analysis and action-plan service
//!
//! CLI entry point for serving the HTTP API or running one-shot analyses.

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use intentd::cli::{Cli, Command};
use intentd::config::Config;
use intentd::llm::create_client;
use intentd::pipeline::{AnalysisRequest, Pipeline};
use intentd::prompts::PromptLoader;
use intentd::server::{self, AppState};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level_str = cli_log_level.or(config_log_level);
    let level = if let Some(s) = level_str {
        match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        }
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Dispatch command
    debug!("main: dispatching command");
    match cli.command {
        Some(Command::Serve { host, port }) => cmd_serve(config, host, port).await,
        Some(Command::Analyze { input, history }) => cmd_analyze(&config, &input, history.as_deref()).await,
        Some(Command::Clarify { input }) => cmd_clarify(&config, &input).await,
        None => cmd_serve(config, None, None).await,
    }
}

/// Build the pipeline from configuration
fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let client = create_client(config).context("Failed to create generation client")?;
    let prompts = Arc::new(PromptLoader::new(config.prompts.dir.clone()));
    Ok(Pipeline::new(client, prompts))
}

/// Run the HTTP service
async fn cmd_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    debug!(?host, ?port, "cmd_serve: called");
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    // An empty credential pool is not fatal at startup; requests fail with
    // a clear error when a generation is actually attempted
    let key_count = config.gemini.load_keys().len();
    if key_count == 0 {
        warn!("No Gemini API keys found in environment; generation requests will fail");
    } else {
        info!(key_count, "Credential pool loaded");
    }

    let state = Arc::new(AppState {
        pipeline: build_pipeline(&config)?,
    });

    server::serve(&config.server, state).await
}

/// Run the full pipeline once (batch mode)
async fn cmd_analyze(config: &Config, input: &str, history: Option<&std::path::Path>) -> Result<()> {
    debug!(input_len = input.len(), ?history, "cmd_analyze: called");
    let pipeline = build_pipeline(config)?;

    let session_history = match history {
        Some(path) => read_history(path)?,
        None => Vec::new(),
    };

    let request = AnalysisRequest {
        input: input.to_string(),
        session_history,
        clarification_answers: None,
    };

    match pipeline.run_full(&request).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) if e.is_quota_exhaustion() => {
            eprintln!("Quota exhausted across all models. Wait a few minutes or configure additional API keys.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Run the clarification pre-check once (batch mode)
async fn cmd_clarify(config: &Config, input: &str) -> Result<()> {
    debug!(input_len = input.len(), "cmd_clarify: called");
    let pipeline = build_pipeline(config)?;

    let request = AnalysisRequest::new(input);

    match pipeline.run_clarify(&request).await {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(e) if e.is_quota_exhaustion() => {
            eprintln!("Quota exhausted across all models. Wait a few minutes or configure additional API keys.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Clarification check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Read a session-history JSON file (an array of opaque entries)
fn read_history(path: &std::path::Path) -> Result<Vec<Value>> {
    let content =
        std::fs::read_to_string(path).context(format!("Failed to read history file {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Failed to parse history file {}", path.display()))
}
