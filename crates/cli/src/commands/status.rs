//! Monitor status and health commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_health_score, color_severity, color_status, format_timestamp, format_value,
    print_heading, print_json, print_rows, OutputFormat,
};
use autopilot_lib::orchestrator::StatusReport;
use autopilot_lib::AnomalyRecord;

/// Row for metric values
#[derive(Tabled)]
pub(crate) struct MetricRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Row for anomalies
#[derive(Tabled)]
pub(crate) struct AnomalyRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Deviation")]
    deviation: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Detected")]
    detected_at: String,
}

impl From<&AnomalyRecord> for AnomalyRow {
    fn from(a: &AnomalyRecord) -> Self {
        Self {
            metric: a.metric.clone(),
            value: format_value(a.value),
            expected: format_value(a.expected),
            deviation: format!("{:.2}σ", a.deviation),
            severity: color_severity(a.severity),
            detected_at: format_timestamp(&a.detected_at),
        }
    }
}

/// Row for component health
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Failures")]
    failures: u32,
    #[tabled(rename = "Message")]
    message: String,
}

pub(crate) fn print_status_report(report: &StatusReport) {
    let state = if report.running { "running" } else { "stopped" };

    print_heading("Monitor Status");
    println!("State:        {}", color_status(state));
    println!("Mode:         {}", report.mode.to_string().cyan());
    println!("Health score: {}", color_health_score(report.health_score));
    match &report.observed_at {
        Some(ts) => println!("Observed at:  {}", format_timestamp(ts)),
        None => println!("Observed at:  {}", "no observation yet".dimmed()),
    }
    println!(
        "Cycles: {}  Baselines: {}  Anomalies kept: {}  Actions kept: {}",
        report.active_cycles, report.baselines, report.anomaly_history, report.action_history
    );
    println!();

    let rows: Vec<MetricRow> = report
        .metrics
        .iter()
        .map(|(metric, value)| MetricRow {
            metric: metric.clone(),
            value: format_value(*value),
        })
        .collect();
    print_rows(rows, "No metrics observed yet");

    if !report.anomalies.is_empty() {
        println!("\n{}", "Current anomalies".bold());
        print_rows(
            report.anomalies.iter().map(AnomalyRow::from).collect(),
            "No anomalies",
        );
    }
}

/// Show the latest observation and analysis
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report = client.status().await?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_status_report(&report),
    }

    Ok(())
}

/// Show component health as reported by the agent
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health)?,
        OutputFormat::Table => {
            print_heading("Agent Health");
            println!("Overall: {}\n", color_status(&health.status.to_string()));

            let mut rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, c)| ComponentRow {
                    name: name.clone(),
                    status: color_status(&c.status.to_string()),
                    failures: c.consecutive_failures,
                    message: c.message.clone().unwrap_or_default(),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            print_rows(rows, "No components registered");
        }
    }

    Ok(())
}
