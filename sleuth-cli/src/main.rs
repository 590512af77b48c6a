//! Sleuth CLI: terminal interface for the iterative research assistant.

mod commands;
mod progress;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Sleuth: clarify, search, evaluate, report
#[derive(Parser, Debug)]
#[command(name = "sleuth", version, about, long_about = None)]
struct Cli {
    /// LLM model to use for goal derivation, evaluation and reports
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Workspace directory
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Research a topic and write a cited report
    Research {
        /// The topic to research
        topic: String,

        /// Answer to a clarifying question, in order (repeat for each question)
        #[arg(short, long = "answer")]
        answers: Vec<String>,

        /// Where to write the report (default: research_report_<topic>.md)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full outcome as JSON instead of the report
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check configuration and credentials
    Doctor,
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Create a default workspace configuration file
    Init,
    /// Show the resolved configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = sleuth_core::config::log_dir().unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "sleuth.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let options = commands::Options {
        model: cli.model,
        quiet: cli.quiet,
    };
    commands::handle_command(cli.command, &workspace, &options).await
}
