//! Forecast cycle iteration: retrain, predict, alert

use super::state::MonitorState;
use crate::models::{Forecast, ForecastAlert, MonitorEvent};
use chrono::Utc;
use std::time::Duration;
use tracing::debug;

/// Retrain and predict every watch-list metric, raising alerts for
/// forecasts above the probability threshold. Returns the forecasts of
/// trained metrics.
pub(crate) fn run_iteration(state: &MonitorState) -> Vec<Forecast> {
    let horizon = Duration::from_secs(state.config.prediction_horizon_secs);
    let threshold = state.config.anomaly_probability_threshold;
    let mut forecasts = Vec::new();

    for metric in &state.config.watch_list {
        state.forecaster.retrain(metric);
        if !state.forecaster.is_trained(metric) {
            debug!(
                metric = %metric,
                samples = state.forecaster.sample_count(metric),
                "Skipping forecast, not enough history"
            );
            continue;
        }

        let forecast = state.forecaster.predict(metric, horizon);
        state.metrics.inc_forecasts_generated();

        if forecast.anomaly_probability > threshold {
            state.logger.log_forecast_alert(
                metric,
                forecast.anomaly_probability,
                forecast.predicted_value,
            );
            state.metrics.inc_forecast_alerts();
            state.emit(MonitorEvent::ForecastAlert(ForecastAlert {
                metric: metric.clone(),
                probability: forecast.anomaly_probability,
                timestamp: Utc::now(),
            }));
        }
        forecasts.push(forecast);
    }

    forecasts
}
