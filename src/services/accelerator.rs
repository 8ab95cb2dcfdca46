//! Optional accelerator tier of the online fallback chain
//!
//! With a persisted artifact, newer observations are appended to a copy of the
//! fitted state and forecast without re-estimation. Without one, a fresh
//! seasonal ARIMA fit runs on the bounded executor under a hard timeout.
//! Every failure here is returned to the caller, who falls through to
//! seasonal smoothing.

use super::executor::BoundedExecutor;
use super::fallback::ensure_finite_forecast;
use super::ForecastMethod;
use crate::artifacts::{ArtifactStore, ModelArtifact};
use crate::db::sqlite::models::ChannelSeries;
use crate::forecasting::{
    ModelError, ModelResult, SarimaFit, SeasonalModel, SEASONAL_PERIOD,
};
use std::time::Duration;
use tracing::debug;

pub struct Accelerator<'a> {
    artifacts: &'a ArtifactStore,
    executor: &'a BoundedExecutor,
    timeout: Duration,
}

impl<'a> Accelerator<'a> {
    pub fn new(artifacts: &'a ArtifactStore, executor: &'a BoundedExecutor, timeout: Duration) -> Self {
        Self {
            artifacts,
            executor,
            timeout,
        }
    }

    /// Forecast steps `skip + 1 ..= skip + len` for one channel, or report why
    /// this tier is unavailable
    pub fn forecast(
        &self,
        series: &ChannelSeries,
        skip: u64,
        len: usize,
    ) -> ModelResult<(Vec<f64>, ForecastMethod)> {
        match self.artifacts.load(series.channel) {
            Some(artifact) => {
                debug!(
                    "Appending {} observations to {} artifact for {}",
                    series.len().saturating_sub(artifact.orig_n),
                    artifact.model.kind(),
                    series.channel
                );
                let forecast = forecast_from_artifact(&artifact, &series.values, skip, len)?;
                Ok((forecast, ForecastMethod::ArtifactAppend))
            }
            None => {
                let forecast = self.heavy_fit(series, skip, len)?;
                Ok((forecast, ForecastMethod::HeavyFit))
            }
        }
    }

    fn heavy_fit(&self, series: &ChannelSeries, skip: u64, len: usize) -> ModelResult<Vec<f64>> {
        let required = SarimaFit::required_observations(SEASONAL_PERIOD);
        if series.len() < required {
            return Err(ModelError::InsufficientData {
                required,
                actual: series.len(),
            });
        }

        let values = series.values.clone();
        let forecast = self
            .executor
            .run_with_timeout(series.channel.as_str(), self.timeout, move || {
                SarimaFit::fit(&values, SEASONAL_PERIOD)?.forecast_window(skip, len)
            })?;
        ensure_finite_forecast(&forecast)?;
        Ok(forecast)
    }
}

/// Append observations newer than the artifact's fit sample and forecast
pub fn forecast_from_artifact(
    artifact: &ModelArtifact,
    values: &[f64],
    skip: u64,
    len: usize,
) -> ModelResult<Vec<f64>> {
    if artifact.model.period() != SEASONAL_PERIOD {
        return Err(ModelError::IncompatibleState(format!(
            "artifact period {} differs from {}",
            artifact.model.period(),
            SEASONAL_PERIOD
        )));
    }
    if values.len() < artifact.orig_n {
        return Err(ModelError::IncompatibleState(format!(
            "series has {} observations, artifact was fitted on {}",
            values.len(),
            artifact.orig_n
        )));
    }

    let mut model = artifact.model.clone();
    model.append(&values[artifact.orig_n..])?;
    let forecast = model.forecast_window(skip, len)?;
    ensure_finite_forecast(&forecast)?;
    Ok(forecast)
}
