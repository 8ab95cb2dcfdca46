//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Create migrations table
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_sensor_readings", CREATE_SENSOR_READINGS_TABLE)?;
    run_migration(conn, "002_forecast_cache", CREATE_FORECAST_CACHE_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    // Check if migration already applied
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

// Channel columns stay nullable: rows come from an upstream ingestion process and a
// NULL is reported as a malformed row rather than rejected at write time.
const CREATE_SENSOR_READINGS_TABLE: &str = r#"
CREATE TABLE sensor_readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    enqueued_time TEXT NOT NULL,
    temperature REAL,
    humidity REAL,
    flammable_gases REAL,
    tvoc REAL,
    co REAL,
    battery_life REAL
);

CREATE INDEX idx_sensor_readings_enqueued ON sensor_readings(enqueued_time);
"#;

const CREATE_FORECAST_CACHE_TABLE: &str = r#"
CREATE TABLE forecast_cache (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    step INTEGER NOT NULL,
    temperature REAL,
    humidity REAL,
    flammable_gases REAL,
    tvoc REAL,
    co REAL,
    computed_at TEXT NOT NULL,
    run_id TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 2);

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('sensor_readings', 'forecast_cache')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }
}
