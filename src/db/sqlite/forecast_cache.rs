//! Forecast cache table
//!
//! The cache only ever holds the output of the latest successful batch run.
//! `replace_forecast_cache` swaps the whole table inside one transaction, so a
//! failed insert rolls the delete back with it.

use super::models::ForecastCacheRow;
use crate::error::{AppError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

/// Fetch up to `limit` cache rows ordered by step
pub fn fetch_cache_rows(conn: &Connection, limit: usize) -> Result<Vec<ForecastCacheRow>> {
    let mut stmt = conn.prepare(
        "SELECT step, temperature, humidity, flammable_gases, tvoc, co
         FROM forecast_cache
         ORDER BY step ASC, id ASC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(ForecastCacheRow {
            step: row.get(0)?,
            temperature: row.get(1)?,
            humidity: row.get(2)?,
            flammable_gases: row.get(3)?,
            tvoc: row.get(4)?,
            co: row.get(5)?,
        })
    })?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

/// Count rows currently cached
pub fn count_cache_rows(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM forecast_cache", [], |row| row.get(0))?;
    Ok(count)
}

/// Computation time of the cached forecast, if any
pub fn latest_forecast_time(conn: &Connection) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = conn
        .query_row("SELECT MAX(computed_at) FROM forecast_cache", [], |row| row.get(0))
        .optional()?
        .flatten();

    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| AppError::MalformedRow(format!("invalid computed_at '{}': {}", s, e)))
    })
    .transpose()
}

/// Replace the cache content with `rows` atomically
pub fn replace_forecast_cache(
    conn: &mut Connection,
    rows: &[ForecastCacheRow],
    run_id: &str,
    computed_at: DateTime<Utc>,
) -> Result<usize> {
    write_cache(conn, rows, run_id, computed_at).map_err(|e| {
        tracing::error!("Forecast cache write failed for run {}: {}", run_id, e);
        AppError::CacheWrite(e.to_string())
    })
}

fn write_cache(
    conn: &mut Connection,
    rows: &[ForecastCacheRow],
    run_id: &str,
    computed_at: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    let computed_at = computed_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    // Dropping `tx` without commit rolls back the delete.
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM forecast_cache", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO forecast_cache (
                step, temperature, humidity, flammable_gases, tvoc, co, computed_at, run_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;

        for row in rows {
            stmt.execute(params![
                row.step,
                row.temperature,
                row.humidity,
                row.flammable_gases,
                row.tvoc,
                row.co,
                computed_at,
                run_id,
            ])?;
        }
    }
    tx.commit()?;

    Ok(rows.len())
}
