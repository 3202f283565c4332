//! Current metric values and forecasts

use anyhow::Result;
use std::collections::BTreeMap;
use tabled::Tabled;

use super::status::MetricRow;
use crate::client::ApiClient;
use crate::output::{
    color_probability, format_percent, format_timestamp, format_value, print_json, print_rows,
    OutputFormat,
};
use autopilot_lib::Forecast;

/// Row for forecasts
#[derive(Tabled)]
struct ForecastRow {
    #[tabled(rename = "Requested")]
    requested: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "At")]
    horizon: String,
    #[tabled(rename = "Predicted")]
    predicted: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Anomaly P")]
    probability: String,
    #[tabled(rename = "Advice")]
    advice: String,
}

pub(crate) fn print_metrics(metrics: &BTreeMap<String, f64>) {
    let rows: Vec<MetricRow> = metrics
        .iter()
        .map(|(metric, value)| MetricRow {
            metric: metric.clone(),
            value: format_value(*value),
        })
        .collect();
    print_rows(rows, "No matching metrics observed yet");
}

pub(crate) fn print_forecasts(forecasts: &BTreeMap<String, Forecast>) {
    let rows: Vec<ForecastRow> = forecasts
        .iter()
        .map(|(requested, f)| ForecastRow {
            requested: requested.clone(),
            metric: f.metric.clone(),
            horizon: format_timestamp(&f.horizon),
            predicted: format_value(f.predicted_value),
            confidence: format_percent(f.confidence),
            probability: color_probability(f.anomaly_probability),
            advice: f.suggested_action.clone().unwrap_or_default(),
        })
        .collect();
    print_rows(rows, "No forecasts available");
}

/// Show the latest metric values, optionally filtered by entity
pub async fn show_metrics(
    client: &ApiClient,
    entities: &[String],
    format: OutputFormat,
) -> Result<()> {
    let metrics = client.metrics(entities).await?;

    match format {
        OutputFormat::Json => print_json(&metrics)?,
        OutputFormat::Table => print_metrics(&metrics),
    }

    Ok(())
}

/// Show forecasts for the given metrics or entity groups
pub async fn show_predictions(
    client: &ApiClient,
    metrics: &[String],
    format: OutputFormat,
) -> Result<()> {
    let forecasts = client.predictions(metrics).await?;

    match format {
        OutputFormat::Json => print_json(&forecasts)?,
        OutputFormat::Table => print_forecasts(&forecasts),
    }

    Ok(())
}
