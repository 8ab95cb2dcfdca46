//! Seasonal forecasting models
//!
//! Two model families work on 15-minute sensor series with a daily season:
//!
//! - **Holt-Winters**: additive seasonality, no trend. Cheap enough to refit on
//!   every request; also what the batch run persists.
//! - **Seasonal ARIMA (0,1,1)(0,1,1)**: heavier fit used only by the optional
//!   accelerator tier under a wall-clock timeout.
//!
//! Both keep enough state to append new observations and keep forecasting
//! without re-estimating their parameters.

mod holt_winters;
mod sarima;
mod search;

pub use holt_winters::HoltWintersFit;
pub use sarima::SarimaFit;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Samples per day at 15-minute resolution; the seasonal period of every model
pub const SEASONAL_PERIOD: usize = 96;

/// Forecast steps per requested day
pub const STEPS_PER_DAY: usize = 96;

/// Sampling interval of every series
pub const INTERVAL_MINUTES: u32 = 15;

/// Observations required before any model is fitted
pub const MIN_FIT_OBSERVATIONS: usize = 10;

/// Failures while fitting or forecasting one channel
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("incompatible model state: {0}")]
    IncompatibleState(String),

    #[error("model fit timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no fit worker available ({0} in flight)")]
    WorkerSaturated(usize),

    #[error("fit worker failed: {0}")]
    WorkerFailed(String),
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// A fitted model that can absorb new observations and forecast ahead
pub trait SeasonalModel {
    /// Number of observations the state has absorbed
    fn nobs(&self) -> usize;

    /// Extend the state with newer observations, keeping parameters fixed
    fn append(&mut self, observations: &[f64]) -> ModelResult<()>;

    /// Forecast steps `skip + 1 ..= skip + len` past the last absorbed
    /// observation. Cost depends on `len`, not on how far ahead the window lies.
    fn forecast_window(&self, skip: u64, len: usize) -> ModelResult<Vec<f64>>;

    /// Forecast `steps` values past the last absorbed observation
    fn forecast(&self, steps: usize) -> ModelResult<Vec<f64>> {
        self.forecast_window(0, steps)
    }
}

/// Persistable fitted state of either model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FittedModel {
    HoltWinters(HoltWintersFit),
    Sarima(SarimaFit),
}

impl FittedModel {
    /// Model family name
    pub fn kind(&self) -> &'static str {
        match self {
            FittedModel::HoltWinters(_) => "holt_winters",
            FittedModel::Sarima(_) => "sarima",
        }
    }

    /// Seasonal period the state was fitted with
    pub fn period(&self) -> usize {
        match self {
            FittedModel::HoltWinters(m) => m.period(),
            FittedModel::Sarima(m) => m.period(),
        }
    }
}

impl SeasonalModel for FittedModel {
    fn nobs(&self) -> usize {
        match self {
            FittedModel::HoltWinters(m) => m.nobs(),
            FittedModel::Sarima(m) => m.nobs(),
        }
    }

    fn append(&mut self, observations: &[f64]) -> ModelResult<()> {
        match self {
            FittedModel::HoltWinters(m) => m.append(observations),
            FittedModel::Sarima(m) => m.append(observations),
        }
    }

    fn forecast_window(&self, skip: u64, len: usize) -> ModelResult<Vec<f64>> {
        match self {
            FittedModel::HoltWinters(m) => m.forecast_window(skip, len),
            FittedModel::Sarima(m) => m.forecast_window(skip, len),
        }
    }
}

/// Reject series holding NaN or infinite values
fn ensure_finite(values: &[f64]) -> ModelResult<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(ModelError::InvalidData(format!(
            "non-finite observation at index {}",
            idx
        ))),
        None => Ok(()),
    }
}
