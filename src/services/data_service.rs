//! Data Service
//!
//! Recent raw readings next to the cached batch forecast, for dashboards.

use crate::db::sqlite::models::{ForecastCacheRow, HistoricalRow};
use crate::error::Result;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Readings returned by a data pull
pub const HISTORICAL_ROWS: usize = 48;

/// Cache rows returned by a data pull
pub const PREDICTIVE_ROWS: usize = 96;

/// Data pull payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPullResult {
    pub historical_last_48: Vec<HistoricalRow>,
    pub predictive_last_96: Vec<ForecastCacheRow>,
    pub forecast_computed_at: Option<DateTime<Utc>>,
}

/// Data service for business logic
pub struct DataService;

impl DataService {
    /// Latest readings (oldest first) and the current forecast cache
    pub fn pull(state: &AppState) -> Result<DataPullResult> {
        let historical_last_48 = state.store.fetch_recent_readings(HISTORICAL_ROWS)?;
        let predictive_last_96 = state.store.fetch_cache_rows(PREDICTIVE_ROWS)?;
        let forecast_computed_at = state.store.latest_forecast_time()?;

        info!(
            "DataService::pull - {} readings, {} forecast rows",
            historical_last_48.len(),
            predictive_last_96.len()
        );

        Ok(DataPullResult {
            historical_last_48,
            predictive_last_96,
            forecast_computed_at,
        })
    }
}
