//! Free-text questions routed by the agent

use anyhow::Result;
use colored::Colorize;

use super::{investigate::print_investigation, metrics, status::print_status_report};
use crate::client::ApiClient;
use crate::output::{print_info, print_json, OutputFormat};
use autopilot_lib::orchestrator::QueryResult;

/// Ask a question and render whatever the agent answered with
pub async fn ask(client: &ApiClient, text: &str, format: OutputFormat) -> Result<()> {
    let response = client.query(text).await?;

    if format == OutputFormat::Json {
        return print_json(&response);
    }

    let entities = if response.entities.is_empty() {
        "none".to_string()
    } else {
        response.entities.join(", ")
    };
    println!(
        "{} {}  {} {}\n",
        "Intent:".dimmed(),
        response.intent.to_string().cyan(),
        "Entities:".dimmed(),
        entities
    );

    match &response.result {
        QueryResult::Status(report) => print_status_report(report),
        QueryResult::Metrics(values) => metrics::print_metrics(values),
        QueryResult::Predictions(forecasts) => metrics::print_forecasts(forecasts),
        QueryResult::Investigation(investigation) => print_investigation(investigation),
        QueryResult::Message { message } => print_info(message),
    }

    Ok(())
}
