//! Greenbench CLI
//!
//! A command-line tool for analyzing recorded experiment runs
//! (re-running attribution, summarizing per-service energy) and for
//! checking the phase of a live runner.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{attribute, status, summary};

/// Greenbench CLI
#[derive(Parser)]
#[command(name = "gbench")]
#[command(author, version, about = "CLI for greenbench experiment runs", long_about = None)]
pub struct Cli {
    /// Runner API URL (can also be set via GBENCH_API_URL env var)
    #[arg(long, env = "GBENCH_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Re-run power attribution from a recorded run directory
    Attribute {
        /// Run directory containing power.jsonl and cpu_by_service.json
        #[arg(long)]
        run_dir: String,

        /// Maximum skew between a CPU instant and its power match
        #[arg(long)]
        max_skew_seconds: Option<f64>,

        /// Total-CPU floor below which an instant counts as idle
        #[arg(long)]
        cpu_epsilon_cores: Option<f64>,

        /// Physical cores of the host running the services
        #[arg(long)]
        host_cpu_cores: Option<u32>,

        /// Write the attribution output here instead of the run dir
        #[arg(long, short)]
        output: Option<String>,
    },

    /// Summarize per-service energy of a recorded run
    Summary {
        /// Run directory containing attribution.json
        #[arg(long)]
        run_dir: String,
    },

    /// Show the current phase of a live runner
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Attribute {
            run_dir,
            max_skew_seconds,
            cpu_epsilon_cores,
            host_cpu_cores,
            output,
        } => {
            attribute::run_attribution(
                &run_dir,
                max_skew_seconds,
                cpu_epsilon_cores,
                host_cpu_cores,
                output,
                cli.format,
            )?;
        }
        Commands::Summary { run_dir } => {
            summary::show_summary(&run_dir, cli.format)?;
        }
        Commands::Status => {
            let client = client::ApiClient::new(&cli.api_url)?;
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
