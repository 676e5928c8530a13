//! Swarm Scaler CLI
//!
//! A command-line tool for inspecting a running scaler and checking
//! policy files before they are deployed.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{health, status, validate};
use std::path::PathBuf;

/// Swarm Scaler CLI
#[derive(Parser)]
#[command(name = "scalerctl")]
#[command(author, version, about = "CLI for the Swarm Scaler", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via SCALER_API_URL env var)
    #[arg(long, env = "SCALER_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the last scaling decision for every managed service
    Status {
        /// Only show this service
        #[arg(long, short)]
        service: Option<String>,
    },

    /// Show component health and readiness
    Health,

    /// Validate a policy file without contacting the scaler
    Validate {
        /// Path to the JSON policy file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status { service } => {
            let client = client::ApiClient::new(&cli.api_url)?;
            status::show_status(&client, service.as_deref(), cli.format).await?;
        }
        Commands::Health => {
            let client = client::ApiClient::new(&cli.api_url)?;
            health::show_health(&client, cli.format).await?;
        }
        Commands::Validate { path } => {
            if !validate::validate_policies(&path, cli.format)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
