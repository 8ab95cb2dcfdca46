//! Daily batch scheduler
//!
//! Runs the batch fitter once a day at a configured wall-clock time in a
//! configured timezone (05:00 UTC by default). A failed run is logged and the
//! next attempt is simply the next scheduled run.

use crate::error::Result;
use crate::services::BatchService;
use crate::state::AppState;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

/// Scheduler that refreshes the forecast cache daily
pub struct BatchScheduler {
    state: Arc<AppState>,
    at: NaiveTime,
    timezone: Tz,
    run_on_startup: bool,
}

impl BatchScheduler {
    /// Build a scheduler from the state's configuration
    pub fn new(state: Arc<AppState>) -> Result<Self> {
        let config = &state.config;
        let at = NaiveTime::from_hms_opt(config.batch_hour, config.batch_minute, 0).ok_or_else(|| {
            crate::error::AppError::Config(format!(
                "invalid batch time {:02}:{:02}",
                config.batch_hour, config.batch_minute
            ))
        })?;
        let timezone = config.batch_timezone()?;
        let run_on_startup = config.run_batch_on_startup;

        Ok(Self {
            state,
            at,
            timezone,
            run_on_startup,
        })
    }

    /// Time left until the next `at` in `timezone`, measured from `now`
    pub fn duration_until_next(now: DateTime<Utc>, timezone: Tz, at: NaiveTime) -> Duration {
        let today = now.with_timezone(&timezone).date_naive();

        for offset in 0..=2 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            // A time skipped by a DST change has no local mapping; try the next day.
            let Some(target) = timezone.from_local_datetime(&date.and_time(at)).earliest() else {
                continue;
            };
            let target = target.with_timezone(&Utc);
            if target > now {
                return (target - now).to_std().unwrap_or(Duration::ZERO);
            }
        }

        Duration::from_secs(24 * 3600)
    }

    /// Start the scheduler on a background thread
    pub fn start(self) -> JoinHandle<()> {
        std::thread::spawn(move || {
            info!(
                "Batch scheduler started (daily at {} {})",
                self.at.format("%H:%M"),
                self.timezone
            );

            if self.run_on_startup {
                self.execute_batch();
            }

            loop {
                let duration = Self::duration_until_next(Utc::now(), self.timezone, self.at);
                info!(
                    "Next batch run in {} hours {} minutes",
                    duration.as_secs() / 3600,
                    (duration.as_secs() % 3600) / 60
                );

                std::thread::sleep(duration);

                self.execute_batch();
            }
        })
    }

    /// Run one batch, logging instead of propagating failures
    fn execute_batch(&self) {
        info!("Executing scheduled batch run");

        match BatchService::run(&self.state) {
            Ok(report) if report.skipped => {
                warn!("Batch run {} skipped: no sensor data", report.run_id)
            }
            Ok(report) => info!(
                "Batch run {} completed: {} cache rows",
                report.run_id, report.rows_written
            ),
            Err(e) => error!("Batch run failed, retrying next cycle: {}", e),
        }
    }
}
