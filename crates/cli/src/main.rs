//! Autopilot CLI
//!
//! Queries a running autopilot agent: status, current metrics, forecasts,
//! investigations and free-text questions.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{ask, investigate, metrics, status};

/// Autopilot monitoring CLI
#[derive(Parser)]
#[command(name = "apctl")]
#[command(author, version, about = "CLI for the Autopilot monitoring agent", long_about = None)]
pub struct Cli {
    /// Agent URL (can also be set via APCTL_API_URL env var)
    #[arg(long, env = "APCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, value_enum)]
    pub format: Option<output::OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the latest observation and analysis
    Status,

    /// Show component health
    Health,

    /// Show current metric values
    Metrics {
        /// Only metrics whose name contains ENTITY (repeatable)
        #[arg(long = "entity", short = 'e', value_name = "ENTITY")]
        entities: Vec<String>,
    },

    /// Forecast metrics (defaults to cpu_usage and memory_usage)
    Predict {
        /// Metric names or entity groups (cpu, memory, disk, network, errors)
        metrics: Vec<String>,
    },

    /// Investigate recent anomalies and actions
    Investigate {
        /// Entities the investigation concerns
        entities: Vec<String>,
    },

    /// Ask a question in plain language
    Ask {
        /// The question, e.g. "why is cpu high?"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let format = config.format(cli.format);
    let client = client::ApiClient::new(&config.api_url(cli.api_url))?;

    match cli.command {
        Commands::Status => status::show_status(&client, format).await?,
        Commands::Health => status::show_health(&client, format).await?,
        Commands::Metrics { entities } => metrics::show_metrics(&client, &entities, format).await?,
        Commands::Predict { metrics: names } => {
            metrics::show_predictions(&client, &names, format).await?
        }
        Commands::Investigate { entities } => {
            investigate::investigate(&client, &entities, format).await?
        }
        Commands::Ask { text } => ask::ask(&client, &text.join(" "), format).await?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
