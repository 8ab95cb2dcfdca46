//! Sensor readings queries
//!
//! Rows are always returned in arrival order: ascending `enqueued_time`, ties
//! broken by row id.

use super::models::{HistoricalRow, SensorReading, TimedReading};
use crate::error::{AppError, Result};
use chrono::SecondsFormat;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};

/// Fetch every reading in chronological order
pub fn fetch_sensor_readings(conn: &Connection) -> Result<Vec<SensorReading>> {
    let mut stmt = conn.prepare(
        "SELECT temperature, humidity, flammable_gases, tvoc, co
         FROM sensor_readings
         ORDER BY enqueued_time ASC, id ASC",
    )?;

    let mut rows = stmt.query([])?;
    let mut readings = Vec::new();
    while let Some(row) = rows.next()? {
        readings.push(SensorReading {
            temperature: numeric(row, 0, "temperature")?,
            humidity: numeric(row, 1, "humidity")?,
            flammable_gases: numeric(row, 2, "flammable_gases")?,
            tvoc: numeric(row, 3, "tvoc")?,
            co: numeric(row, 4, "co")?,
        });
    }

    Ok(readings)
}

/// Fetch the latest `limit` readings, returned oldest first
pub fn fetch_recent_readings(conn: &Connection, limit: usize) -> Result<Vec<HistoricalRow>> {
    let mut stmt = conn.prepare(
        "SELECT temperature, humidity, flammable_gases, tvoc, co, battery_life
         FROM (
             SELECT id, enqueued_time, temperature, humidity, flammable_gases, tvoc, co, battery_life
             FROM sensor_readings
             ORDER BY enqueued_time DESC, id DESC
             LIMIT ?1
         )
         ORDER BY enqueued_time ASC, id ASC",
    )?;

    let mut rows = stmt.query(params![limit as i64])?;
    let mut recent = Vec::new();
    while let Some(row) = rows.next()? {
        recent.push(HistoricalRow {
            temperature: optional_numeric(row, 0, "temperature")?,
            humidity: optional_numeric(row, 1, "humidity")?,
            flammable_gases: optional_numeric(row, 2, "flammable_gases")?,
            tvoc: optional_numeric(row, 3, "tvoc")?,
            co: optional_numeric(row, 4, "co")?,
            battery_life: optional_numeric(row, 5, "battery_life")?,
        });
    }

    Ok(recent)
}

/// Insert readings in one transaction
pub fn insert_readings(conn: &mut Connection, readings: &[TimedReading]) -> Result<usize> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO sensor_readings (
                enqueued_time, temperature, humidity, flammable_gases, tvoc, co, battery_life
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for timed in readings {
            let r = &timed.reading;
            stmt.execute(params![
                timed.enqueued_time.to_rfc3339_opts(SecondsFormat::Millis, true),
                r.temperature,
                r.humidity,
                r.flammable_gases,
                r.tvoc,
                r.co,
                timed.battery_life,
            ])?;
        }
    }
    tx.commit()?;

    Ok(readings.len())
}

/// Count stored readings
pub fn count_readings(conn: &Connection) -> Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM sensor_readings", [], |row| row.get(0))?;
    Ok(count)
}

fn numeric(row: &Row<'_>, idx: usize, column: &str) -> Result<f64> {
    optional_numeric(row, idx, column)?
        .ok_or_else(|| AppError::MalformedRow(format!("NULL value in column '{}'", column)))
}

fn optional_numeric(row: &Row<'_>, idx: usize, column: &str) -> Result<Option<f64>> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        ValueRef::Integer(v) => Ok(Some(v as f64)),
        ValueRef::Real(v) => Ok(Some(v)),
        other => Err(AppError::MalformedRow(format!(
            "column '{}' holds {} instead of a number",
            column,
            other.data_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn timed(minutes: i64, value: f64) -> TimedReading {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        TimedReading {
            enqueued_time: start + Duration::minutes(minutes),
            reading: SensorReading::new(value, value + 1.0, value + 2.0, value + 3.0, value + 4.0),
            battery_life: Some(90.0),
        }
    }

    #[test]
    fn test_readings_come_back_in_enqueue_order() {
        let mut conn = setup();
        // Inserted out of order on purpose
        insert_readings(&mut conn, &[timed(30, 3.0), timed(0, 1.0), timed(15, 2.0)]).unwrap();

        let readings = fetch_sensor_readings(&conn).unwrap();
        let temps: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![1.0, 2.0, 3.0]);
        assert_eq!(count_readings(&conn).unwrap(), 3);
    }

    #[test]
    fn test_recent_readings_are_latest_and_chronological() {
        let mut conn = setup();
        let batch: Vec<_> = (0..10).map(|i| timed(i * 15, i as f64)).collect();
        insert_readings(&mut conn, &batch).unwrap();

        let recent = fetch_recent_readings(&conn, 3).unwrap();
        let temps: Vec<_> = recent.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![Some(7.0), Some(8.0), Some(9.0)]);
        assert_eq!(recent[0].battery_life, Some(90.0));
    }

    #[test]
    fn test_null_channel_is_malformed_row() {
        let conn = setup();
        conn.execute(
            "INSERT INTO sensor_readings (enqueued_time, temperature, humidity, flammable_gases, tvoc, co)
             VALUES ('2024-01-01T00:00:00.000Z', 1.0, NULL, 1.0, 1.0, 1.0)",
            [],
        )
        .unwrap();

        let result = fetch_sensor_readings(&conn);
        assert!(matches!(result, Err(AppError::MalformedRow(_))));
    }

    #[test]
    fn test_text_channel_is_malformed_row() {
        let conn = setup();
        conn.execute(
            "INSERT INTO sensor_readings (enqueued_time, temperature, humidity, flammable_gases, tvoc, co)
             VALUES ('2024-01-01T00:00:00.000Z', 'warm', 1.0, 1.0, 1.0, 1.0)",
            [],
        )
        .unwrap();

        assert!(matches!(
            fetch_sensor_readings(&conn),
            Err(AppError::MalformedRow(_))
        ));
        assert!(matches!(
            fetch_recent_readings(&conn, 48),
            Err(AppError::MalformedRow(_))
        ));
    }

    #[test]
    fn test_integer_values_are_numeric() {
        let conn = setup();
        conn.execute(
            "INSERT INTO sensor_readings (enqueued_time, temperature, humidity, flammable_gases, tvoc, co)
             VALUES ('2024-01-01T00:00:00.000Z', 21, 40, 0, 120, 1)",
            [],
        )
        .unwrap();

        let readings = fetch_sensor_readings(&conn).unwrap();
        assert_eq!(readings[0], SensorReading::new(21.0, 40.0, 0.0, 120.0, 1.0));
    }
}
