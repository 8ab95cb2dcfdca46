//! REST API server module
//!
//! Provides:
//! - On-demand forecasts (/api/forecast, alias /api/http_trigger)
//! - Recent readings plus cached forecast (/api/data, alias /api/data_pull_http_trigger)
//! - Health check (/health, /)

pub mod handlers;
mod server;
pub mod types;

pub use server::ApiServer;
pub use types::HealthResponse;
