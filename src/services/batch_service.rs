//! Batch Service
//!
//! Scheduled refit of every channel: fit, persist the artifact (best effort),
//! forecast one day ahead and swap the forecast cache in one transaction.

use super::fallback::{ensure_finite_forecast, last_value};
use super::ForecastMethod;
use crate::db::sqlite::models::{Channel, ChannelSeries, ForecastCacheRow};
use crate::error::Result;
use crate::forecasting::{
    FittedModel, HoltWintersFit, ModelResult, SeasonalModel, MIN_FIT_OBSERVATIONS,
    SEASONAL_PERIOD, STEPS_PER_DAY,
};
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Steps written to the forecast cache per run (one day)
pub const BATCH_STEPS: usize = STEPS_PER_DAY;

/// Result of fitting one channel
#[derive(Debug, Clone)]
pub struct ChannelFit {
    pub forecast: Vec<f64>,
    pub method: ForecastMethod,
    pub model: Option<FittedModel>,
}

/// What happened to one channel during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: Channel,
    pub method: ForecastMethod,
    pub observations: usize,
    pub artifact_saved: bool,
}

/// Summary of a batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub skipped: bool,
    pub rows_written: usize,
    pub channels: Vec<ChannelOutcome>,
}

/// Batch service for business logic
pub struct BatchService;

impl BatchService {
    /// Refit all channels and replace the forecast cache.
    ///
    /// Store connectivity failures and cache write failures are returned;
    /// everything that goes wrong inside a single channel is absorbed.
    pub fn run(state: &AppState) -> Result<BatchReport> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("BatchService::run - run_id={}", run_id);

        let series = state.store.fetch_channel_series()?;
        if series.is_empty() {
            warn!("[{}] Sensor table is empty; forecast cache left untouched", run_id);
            return Ok(BatchReport {
                run_id,
                started_at,
                skipped: true,
                rows_written: 0,
                channels: Vec::new(),
            });
        }

        let mut outcomes = Vec::with_capacity(Channel::ALL.len());
        let mut forecasts: Vec<Vec<f64>> = Vec::with_capacity(Channel::ALL.len());

        for channel_series in series.iter() {
            let channel = channel_series.channel;
            let fit = fit_channel(channel_series);

            let artifact_saved = match &fit.model {
                Some(model) => match state.artifacts.save(channel, model) {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("[{}] Could not persist artifact for {}: {}", run_id, channel, e);
                        false
                    }
                },
                None => false,
            };

            info!(
                "[{}] {} fitted via {:?} on {} observations",
                run_id,
                channel,
                fit.method,
                channel_series.len()
            );
            outcomes.push(ChannelOutcome {
                channel,
                method: fit.method,
                observations: channel_series.len(),
                artifact_saved,
            });
            forecasts.push(fit.forecast);
        }

        let rows = cache_rows(&forecasts);
        let rows_written = state.store.replace_forecast_cache(&rows, &run_id, Utc::now())?;
        info!("[{}] Forecast cache replaced with {} rows", run_id, rows_written);

        Ok(BatchReport {
            run_id,
            started_at,
            skipped: false,
            rows_written,
            channels: outcomes,
        })
    }
}

/// Fit one channel and forecast `BATCH_STEPS` ahead, falling back to the last value
pub fn fit_channel(series: &ChannelSeries) -> ChannelFit {
    if series.len() < MIN_FIT_OBSERVATIONS {
        info!(
            "{} has {} observations (< {}); repeating last value",
            series.channel,
            series.len(),
            MIN_FIT_OBSERVATIONS
        );
        return last_value_fit(series);
    }

    match fit_holt_winters(&series.values) {
        Ok((forecast, model)) => ChannelFit {
            forecast,
            method: ForecastMethod::HoltWinters,
            model: Some(model),
        },
        Err(e) => {
            warn!("Holt-Winters fit failed for {}: {}; repeating last value", series.channel, e);
            last_value_fit(series)
        }
    }
}

fn fit_holt_winters(values: &[f64]) -> ModelResult<(Vec<f64>, FittedModel)> {
    let fit = HoltWintersFit::fit(values, SEASONAL_PERIOD)?;
    let forecast = fit.forecast(BATCH_STEPS)?;
    ensure_finite_forecast(&forecast)?;
    Ok((forecast, FittedModel::HoltWinters(fit)))
}

fn last_value_fit(series: &ChannelSeries) -> ChannelFit {
    ChannelFit {
        forecast: last_value(&series.values, BATCH_STEPS),
        method: ForecastMethod::LastValue,
        model: None,
    }
}

/// Zip per-channel forecasts (in `Channel::ALL` order) into one row per step
fn cache_rows(forecasts: &[Vec<f64>]) -> Vec<ForecastCacheRow> {
    let value = |channel: usize, step: usize| {
        forecasts
            .get(channel)
            .and_then(|f| f.get(step))
            .copied()
            .unwrap_or(f64::NAN)
    };

    (0..BATCH_STEPS)
        .map(|step| {
            ForecastCacheRow::from_values(
                step as i64,
                [value(0, step), value(1, step), value(2, step), value(3, step), value(4, step)],
            )
        })
        .collect()
}
