//! hotstage - stage game configuration uploads and hot-reload the
//! processes they affect.
//!
//! Main entry point for the hotstage CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;

mod client;
mod commands;
mod state;

use commands::{config, reload, start, status, upload};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// hotstage - stage configuration uploads and hot-reload affected processes
#[derive(Parser)]
#[command(name = "hotstage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Server URL (default: http://localhost:8080)
    #[arg(long, global = true, env = "HOTSTAGE_SERVER_URL")]
    pub server: Option<String>,

    /// API token (server auth for `start`, bearer token for client commands)
    #[arg(long, global = true, env = "HOTSTAGE_API_TOKEN")]
    pub token: Option<String>,

    /// Path to config file (overrides default discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the staging server
    Start(start::StartArgs),

    /// Upload a configuration file into the current session
    Upload(upload::UploadArgs),

    /// Reload every process affected by the uploaded files
    Reload(reload::ReloadArgs),

    /// Show server and session status
    Status(status::StatusArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = commands::load_config(cli.config.as_deref())?;
    let logging = loaded.config.logging_or_default();

    // Console (human-readable) + optional rotating JSON file
    let level = if cli.verbose {
        "debug"
    } else {
        logging.level.as_str()
    };
    let filter = crate_filter(level, "warn");

    let (file_layer, _guard) = if logging.file {
        let log_dir = logging
            .dir
            .clone()
            .or_else(|| hotstage_config::config_dir().map(|d| d.join("logs")))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "hotstage.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(tracing_subscriber::EnvFilter::new(crate_filter(
                "trace", "info",
            )));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_layer)
        .init();

    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }

    let server_url = cli
        .server
        .unwrap_or_else(|| "http://localhost:8080".to_string());

    let ctx = commands::Context {
        server_url,
        token: cli.token,
        json_output: cli.json,
        verbose: cli.verbose,
        loaded,
    };

    match cli.command {
        Commands::Start(args) => start::run(args, &ctx).await,
        Commands::Upload(args) => upload::run(args, &ctx).await,
        Commands::Reload(args) => reload::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}

/// Filter directive giving every hotstage crate `level` and everything else
/// `fallback`.
fn crate_filter(level: &str, fallback: &str) -> String {
    [
        "hotstage",
        "hotstage_server",
        "hotstage_reload",
        "hotstage_session",
        "hotstage_config",
    ]
    .iter()
    .map(|target| format!("{}={}", target, level))
    .chain(std::iter::once(fallback.to_string()))
    .collect::<Vec<_>>()
    .join(",")
}
