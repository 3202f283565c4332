//! Metric forecasting
//!
//! Statistical models (mean, spread, linear trend, seasonal offset) fitted
//! per metric from recorded history, and the forecaster that owns them.

mod forecaster;
mod model;

pub use forecaster::{advice_for, Forecaster, ForecasterConfig, ADVICE_PROBABILITY};
pub use model::{linear_regression_slope, population_std_dev, ForecastModel, SEASONAL_WINDOW};
