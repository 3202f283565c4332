//! Investigation of recent anomalies and actions

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use super::status::AnomalyRow;
use crate::client::ApiClient;
use crate::output::{
    color_status, format_timestamp, print_heading, print_json, print_rows, OutputFormat,
};
use autopilot_lib::orchestrator::Investigation;

/// Row for remediation actions
#[derive(Tabled)]
struct ActionRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Time")]
    timestamp: String,
}

pub(crate) fn print_investigation(investigation: &Investigation) {
    print_heading("Investigation");
    if !investigation.entities.is_empty() {
        println!("Entities: {}", investigation.entities.join(", ").cyan());
    }
    println!(
        "Hypothesis: {}\n",
        investigation.root_cause_hypothesis.bold()
    );

    println!("{}", "Recent anomalies".bold());
    print_rows(
        investigation
            .recent_anomalies
            .iter()
            .map(AnomalyRow::from)
            .collect(),
        "No recent anomalies",
    );

    println!("\n{}", "Recent actions".bold());
    print_rows(
        investigation
            .recent_actions
            .iter()
            .map(|a| ActionRow {
                metric: a.metric.clone(),
                action: a.action.clone(),
                status: color_status(&a.status.to_string()),
                timestamp: format_timestamp(&a.timestamp),
            })
            .collect(),
        "No recent actions",
    );
}

/// Show recent anomalies and actions with a root-cause hypothesis
pub async fn investigate(client: &ApiClient, entities: &[String], format: OutputFormat) -> Result<()> {
    let investigation = client.investigate(entities).await?;

    match format {
        OutputFormat::Json => print_json(&investigation)?,
        OutputFormat::Table => print_investigation(&investigation),
    }

    Ok(())
}
