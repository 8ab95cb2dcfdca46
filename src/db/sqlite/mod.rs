//! SQLite series store

pub mod models;
pub mod pool;
mod forecast_cache;
mod migrations;
mod readings;

use crate::error::Result;
use chrono::{DateTime, Utc};
use models::*;
use pool::{ConnectionPool, PooledConnection};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Store adapter over the sensor readings and forecast cache tables
pub struct SeriesStore {
    path: PathBuf,
    pool: ConnectionPool,
}

impl SeriesStore {
    /// Create a store handle; connections open lazily per worker
    pub fn new(path: &Path, timeout: Duration, max_idle: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            pool: ConnectionPool::new(path, timeout, max_idle),
        }
    }

    /// Create the database file if needed and run migrations
    pub fn initialize(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&self.path)?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::run_migrations(&conn)?;

        tracing::info!("Series store ready at {}", self.path.display());
        Ok(())
    }

    /// Open (or probe) the calling worker's connection ahead of the first request
    pub fn warm_up(&self) -> Result<()> {
        self.connection()?.release();
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn connection(&self) -> Result<PooledConnection<'_>> {
        self.pool.acquire(ConnectionPool::current_worker())
    }

    // ========== Sensor Reading Methods ==========

    /// All readings, oldest first
    pub fn fetch_sensor_readings(&self) -> Result<Vec<SensorReading>> {
        let conn = self.connection()?;
        readings::fetch_sensor_readings(&conn)
    }

    /// The five channel series from a single fetch
    pub fn fetch_channel_series(&self) -> Result<SensorSeries> {
        let readings = self.fetch_sensor_readings()?;
        Ok(SensorSeries::from_readings(&readings))
    }

    /// Latest `limit` readings, oldest first
    pub fn fetch_recent_readings(&self, limit: usize) -> Result<Vec<HistoricalRow>> {
        let conn = self.connection()?;
        readings::fetch_recent_readings(&conn, limit)
    }

    /// Append readings (ingestion and seeding helper)
    pub fn insert_readings(&self, rows: &[TimedReading]) -> Result<usize> {
        let mut conn = self.connection()?;
        readings::insert_readings(&mut conn, rows)
    }

    pub fn count_readings(&self) -> Result<i64> {
        let conn = self.connection()?;
        readings::count_readings(&conn)
    }

    // ========== Forecast Cache Methods ==========

    /// Cached batch forecast rows ordered by step
    pub fn fetch_cache_rows(&self, limit: usize) -> Result<Vec<ForecastCacheRow>> {
        let conn = self.connection()?;
        forecast_cache::fetch_cache_rows(&conn, limit)
    }

    pub fn count_cache_rows(&self) -> Result<i64> {
        let conn = self.connection()?;
        forecast_cache::count_cache_rows(&conn)
    }

    /// When the cached forecast was computed
    pub fn latest_forecast_time(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.connection()?;
        forecast_cache::latest_forecast_time(&conn)
    }

    /// Atomically replace the cache with a new batch
    pub fn replace_forecast_cache(
        &self,
        rows: &[ForecastCacheRow],
        run_id: &str,
        computed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let mut conn = self.connection()?;
        forecast_cache::replace_forecast_cache(&mut conn, rows, run_id, computed_at)
    }
}
