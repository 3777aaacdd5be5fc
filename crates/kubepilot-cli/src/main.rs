//! kubepilot - conversational Kubernetes diagnostics
//!
//! A thin line-oriented surface over `kubepilot_core::AiOrchestrator`:
//! one-shot questions, canned diagnose/explain prompts, and an interactive
//! chat with skill and model switching.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use kubepilot_core::paths;

mod chat;
mod commands;
mod terminal;

/// kubepilot - AI cluster assistant
#[derive(Parser, Debug)]
#[command(name = "kubepilot")]
#[command(about = "Conversational Kubernetes diagnostics in the terminal", long_about = None)]
pub struct Cli {
    /// Config file (defaults to ~/.kubepilot/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// kubeconfig context to use for every cluster call
    #[arg(long, global = true)]
    context: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive chat
    Chat {
        /// Start with this skill active
        #[arg(long)]
        skill: Option<String>,

        /// Model to use instead of the configured one
        #[arg(long)]
        model: Option<String>,

        /// Focus the conversation on KIND/NAME or KIND/NAMESPACE/NAME
        #[arg(long)]
        resource: Option<String>,
    },

    /// Ask a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },

    /// Diagnose a resource
    Diagnose {
        kind: String,
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Explain a resource
    Explain {
        kind: String,
        name: String,
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// List models available to your account
    Models,

    /// List built-in skills
    Skills,

    /// Download the agent runtime into the cache
    InstallRuntime,
}

fn init_logging() -> Result<()> {
    // Log to file; stdout belongs to the conversation
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = match std::fs::File::create(log_dir.join("kubepilot.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to create log file: {}, falling back to null device",
                e
            );
            std::fs::File::create(null_device)?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging()?;
    tracing::info!("kubepilot {} starting", env!("CARGO_PKG_VERSION"));
    commands::run(cli).await
}
