//! Scheduler module for Sensorcast
//!
//! Handles scheduled tasks:
//! - Daily batch refit and forecast cache refresh (05:00 UTC by default)

mod batch_scheduler;

pub use batch_scheduler::BatchScheduler;
