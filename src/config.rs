//! Command line and environment configuration

use crate::error::{AppError, Result};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "data/sensorcast.db";
pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7071;

#[derive(Parser, Debug)]
#[command(name = "sensorcast")]
#[command(about = "Environmental sensor forecasting service", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve the HTTP API and run the daily batch scheduler (default)
    Serve,

    /// Run one batch fit and refresh the forecast cache
    Batch,

    /// Print one on-demand forecast as JSON
    Forecast {
        /// Horizon in whole days
        #[arg(short, long)]
        days: f64,
    },

    /// Print recent readings and the cached forecast as JSON
    Data,

    /// Create the database file and apply migrations
    InitDb,
}

/// Runtime settings shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct Config {
    /// SQLite database holding sensor readings and the forecast cache
    #[arg(long, env = "SENSORCAST_DB_PATH", default_value = DEFAULT_DB_PATH)]
    pub db_path: PathBuf,

    /// Busy/connect timeout for store connections, in seconds
    #[arg(long, env = "SENSORCAST_DB_TIMEOUT_SECS", default_value_t = 15)]
    pub db_timeout_secs: u64,

    /// Upper bound on idle pooled connections
    #[arg(long, env = "SENSORCAST_MAX_IDLE_CONNECTIONS", default_value_t = 8)]
    pub max_idle_connections: usize,

    /// Directory of per-channel model artifacts
    #[arg(long, env = "SENSORCAST_MODELS_DIR", default_value = DEFAULT_MODELS_DIR)]
    pub models_dir: PathBuf,

    /// Try persisted/heavy seasonal ARIMA models before seasonal smoothing
    #[arg(long, env = "SENSORCAST_ACCELERATE")]
    pub accelerate: bool,

    /// Wall-clock limit when waiting on a heavy model fit, in seconds
    #[arg(long, env = "SENSORCAST_HEAVY_FIT_TIMEOUT_SECS", default_value_t = 10)]
    pub heavy_fit_timeout_secs: u64,

    /// Maximum heavy fits running at once (including abandoned ones)
    #[arg(long, env = "SENSORCAST_HEAVY_FIT_WORKERS", default_value_t = 2)]
    pub heavy_fit_workers: usize,

    #[arg(long, env = "SENSORCAST_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, env = "SENSORCAST_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Hour of the daily batch run
    #[arg(long, env = "SENSORCAST_BATCH_HOUR", default_value_t = 5)]
    pub batch_hour: u32,

    /// Minute of the daily batch run
    #[arg(long, env = "SENSORCAST_BATCH_MINUTE", default_value_t = 0)]
    pub batch_minute: u32,

    /// IANA timezone of the batch schedule
    #[arg(long, env = "SENSORCAST_BATCH_TIMEZONE", default_value = "UTC")]
    pub batch_timezone: String,

    /// Run one batch as soon as the server starts
    #[arg(long, env = "SENSORCAST_RUN_BATCH_ON_STARTUP")]
    pub run_batch_on_startup: bool,

    /// Do not start the daily batch scheduler
    #[arg(long, env = "SENSORCAST_NO_SCHEDULER")]
    pub no_scheduler: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            db_timeout_secs: 15,
            max_idle_connections: 8,
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            accelerate: false,
            heavy_fit_timeout_secs: 10,
            heavy_fit_workers: 2,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            batch_hour: 5,
            batch_minute: 0,
            batch_timezone: "UTC".to_string(),
            run_batch_on_startup: false,
            no_scheduler: false,
        }
    }
}

impl Config {
    /// Check values clap cannot validate on its own
    pub fn validate(&self) -> Result<()> {
        if self.batch_hour > 23 || self.batch_minute > 59 {
            return Err(AppError::Config(format!(
                "invalid batch time {:02}:{:02}",
                self.batch_hour, self.batch_minute
            )));
        }
        if self.heavy_fit_workers == 0 {
            return Err(AppError::Config("heavy_fit_workers must be at least 1".into()));
        }
        self.batch_timezone()?;
        self.bind_addr()?;
        Ok(())
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    pub fn heavy_fit_timeout(&self) -> Duration {
        Duration::from_secs(self.heavy_fit_timeout_secs)
    }

    pub fn batch_timezone(&self) -> Result<Tz> {
        self.batch_timezone
            .parse::<Tz>()
            .map_err(|e| AppError::Config(format!("invalid batch timezone: {}", e)))
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid bind address: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let cli = Cli::try_parse_from(["sensorcast"]).unwrap();
        let defaults = Config::default();

        assert!(cli.command.is_none());
        assert_eq!(cli.config.db_timeout_secs, defaults.db_timeout_secs);
        assert_eq!(cli.config.heavy_fit_workers, defaults.heavy_fit_workers);
        assert_eq!(cli.config.batch_hour, defaults.batch_hour);
        assert!(!cli.config.accelerate);
    }

    #[test]
    fn test_forecast_subcommand() {
        let cli = Cli::try_parse_from(["sensorcast", "--accelerate", "forecast", "--days", "2"]).unwrap();
        assert_eq!(cli.command, Some(Command::Forecast { days: 2.0 }));
        assert!(cli.config.accelerate);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.batch_timezone = "Mars/Olympus".into();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.batch_timezone = "Asia/Kolkata".into();
        config.batch_hour = 24;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
