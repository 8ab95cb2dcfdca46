//! Forecast Service
//!
//! On-demand forecasts for all five channels. Per channel the chain is:
//! accelerator (when enabled) -> seasonal smoothing -> last value. A channel's
//! failure never reaches the caller; only bad input, an unreachable store, an
//! empty table or malformed rows fail the request.

use super::accelerator::Accelerator;
use super::fallback::{last_value, seasonal_smoothing};
use super::ForecastMethod;
use crate::db::sqlite::models::{Channel, ChannelSeries};
use crate::error::{AppError, Result};
use crate::forecasting::{INTERVAL_MINUTES, STEPS_PER_DAY};
use crate::state::AppState;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Steps returned per channel regardless of the requested horizon
pub const RETURNED_STEPS: usize = 96;

/// Largest horizon accepted, in days: 2^53, past which a JSON number no
/// longer tells consecutive integers apart
pub const MAX_FORECAST_DAYS: u64 = 1 << 53;

/// Per-channel forecast arrays, keyed by channel name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelForecasts {
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
    pub flammable: Vec<f64>,
    pub tvoc: Vec<f64>,
    pub co: Vec<f64>,
}

impl ChannelForecasts {
    pub fn get(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::Temperature => &self.temperature,
            Channel::Humidity => &self.humidity,
            Channel::Flammable => &self.flammable,
            Channel::Tvoc => &self.tvoc,
            Channel::Co => &self.co,
        }
    }

    fn set(&mut self, channel: Channel, values: Vec<f64>) {
        match channel {
            Channel::Temperature => self.temperature = values,
            Channel::Humidity => self.humidity = values,
            Channel::Flammable => self.flammable = values,
            Channel::Tvoc => self.tvoc = values,
            Channel::Co => self.co = values,
        }
    }
}

/// Online forecast payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub days_requested: u64,
    pub interval_minutes: u32,
    pub returned_steps: usize,
    pub forecasts: ChannelForecasts,
}

/// Forecast service for business logic
pub struct ForecastService;

impl ForecastService {
    /// Validate `days`, fetch the series and resolve every channel.
    ///
    /// Only the trailing `RETURNED_STEPS` of the `days * 96` step horizon are
    /// computed, so the cost does not grow with `days`.
    pub fn forecast(state: &AppState, days: f64) -> Result<ForecastResponse> {
        let days = validate_days(days)?;
        let horizon = days * STEPS_PER_DAY as u64;
        let skip = horizon - RETURNED_STEPS as u64;

        info!("ForecastService::forecast - days={}, steps={}", days, horizon);

        let series = state.store.fetch_channel_series()?;
        if series.is_empty() {
            warn!("Forecast requested but the sensor table is empty");
            return Err(AppError::NoData("sensor table is empty".into()));
        }

        let accelerator = state.config.accelerate.then(|| {
            Accelerator::new(
                &state.artifacts,
                &state.executor,
                state.config.heavy_fit_timeout(),
            )
        });

        let mut forecasts = ChannelForecasts::default();
        for channel_series in series.iter() {
            let (values, method) = resolve_channel(accelerator.as_ref(), channel_series, skip);
            info!(
                "Forecast for {} via {:?} ({} observations)",
                channel_series.channel,
                method,
                channel_series.len()
            );
            forecasts.set(channel_series.channel, values);
        }

        Ok(ForecastResponse {
            days_requested: days,
            interval_minutes: INTERVAL_MINUTES,
            returned_steps: RETURNED_STEPS,
            forecasts,
        })
    }
}

/// A whole, positive number of days no larger than `MAX_FORECAST_DAYS`
pub fn validate_days(days: f64) -> Result<u64> {
    if !days.is_finite() || days <= 0.0 {
        return Err(AppError::Validation("'days' must be a positive number".into()));
    }
    if days.trunc() != days {
        return Err(AppError::Validation("'days' must be an integer".into()));
    }
    if days > MAX_FORECAST_DAYS as f64 {
        return Err(AppError::Validation(format!(
            "'days' must not exceed {}",
            MAX_FORECAST_DAYS
        )));
    }
    Ok(days as u64)
}

/// Run one channel through the fallback chain for steps
/// `skip + 1 ..= skip + RETURNED_STEPS`; always yields `RETURNED_STEPS` values
fn resolve_channel(
    accelerator: Option<&Accelerator<'_>>,
    series: &ChannelSeries,
    skip: u64,
) -> (Vec<f64>, ForecastMethod) {
    let steps = RETURNED_STEPS;
    if let Some(accelerator) = accelerator {
        match accelerator.forecast(series, skip, steps) {
            Ok((values, method)) => return (fit_to_horizon(values, steps), method),
            Err(e) => warn!(
                "Accelerator unavailable for {}: {}; using seasonal smoothing",
                series.channel, e
            ),
        }
    }

    match seasonal_smoothing(&series.values, skip, steps) {
        Ok(values) => (fit_to_horizon(values, steps), ForecastMethod::SeasonalSmoothing),
        Err(e) => {
            warn!(
                "Seasonal smoothing failed for {}: {}; repeating last value",
                series.channel, e
            );
            (last_value(&series.values, steps), ForecastMethod::LastValue)
        }
    }
}

/// Pad with the final value (0 when empty) or truncate to exactly `steps`
pub fn fit_to_horizon(mut values: Vec<f64>, steps: usize) -> Vec<f64> {
    let pad = values.last().copied().unwrap_or(0.0);
    values.resize(steps, pad);
    values
}
