//! Services Layer
//!
//! Business logic shared between the HTTP handlers, the batch scheduler and
//! the CLI runners.
//!
//! # Services
//!
//! - `BatchService` - Scheduled refit, artifact persistence, forecast cache refresh
//! - `ForecastService` - On-demand forecasts through the fallback chain
//! - `DataService` - Recent readings and the cached forecast

pub mod accelerator;
pub mod batch_service;
pub mod data_service;
pub mod executor;
pub mod fallback;
pub mod forecast_service;

pub use batch_service::{BatchReport, BatchService, ChannelOutcome};
pub use data_service::{DataPullResult, DataService};
pub use forecast_service::{ForecastResponse, ForecastService, MAX_FORECAST_DAYS};

use serde::{Deserialize, Serialize};

/// How a channel's forecast was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Persisted model extended with newer observations
    ArtifactAppend,
    /// Fresh seasonal ARIMA fit under the executor timeout
    HeavyFit,
    /// Batch Holt-Winters fit
    HoltWinters,
    /// Per-request Holt-Winters refit
    SeasonalSmoothing,
    LastValue,
}
