//! Fallback forecasters
//!
//! Seasonal smoothing is refit from scratch on every call; last value never
//! fails and is the floor of every fallback chain.

use crate::forecasting::{
    HoltWintersFit, ModelError, ModelResult, SeasonalModel, SEASONAL_PERIOD,
};

/// Fresh additive Holt-Winters fit (period 96, no trend) over the whole series,
/// forecasting steps `skip + 1 ..= skip + len`
pub fn seasonal_smoothing(values: &[f64], skip: u64, len: usize) -> ModelResult<Vec<f64>> {
    let fit = HoltWintersFit::fit(values, SEASONAL_PERIOD)?;
    let forecast = fit.forecast_window(skip, len)?;
    ensure_finite_forecast(&forecast)?;
    Ok(forecast)
}

/// Repeat the final observation, or 0 for an empty series
pub fn last_value(values: &[f64], steps: usize) -> Vec<f64> {
    let value = values.last().copied().unwrap_or(0.0);
    vec![value; steps]
}

/// Reject forecasts a model produced with NaN or infinite values
pub fn ensure_finite_forecast(forecast: &[f64]) -> ModelResult<()> {
    if forecast.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(ModelError::InvalidData("forecast contains non-finite values".into()))
    }
}
