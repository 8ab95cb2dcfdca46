//! Application state management

use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::db::SeriesStore;
use crate::error::Result;
use crate::services::executor::BoundedExecutor;
use std::sync::Arc;

/// State shared by the HTTP handlers, the scheduler and the CLI runners
pub struct AppState {
    pub config: Config,

    /// Sensor readings and forecast cache
    pub store: Arc<SeriesStore>,

    /// Per-channel fitted model artifacts
    pub artifacts: Arc<ArtifactStore>,

    /// Worker pool for time-bounded heavy model fits
    pub executor: Arc<BoundedExecutor>,
}

impl AppState {
    /// Build state from configuration; no connection is opened yet
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tracing::info!("Store path: {:?}", config.db_path);
        tracing::info!("Models directory: {:?}", config.models_dir);

        let store = Arc::new(SeriesStore::new(
            &config.db_path,
            config.db_timeout(),
            config.max_idle_connections,
        ));
        let artifacts = Arc::new(ArtifactStore::new(&config.models_dir));
        let executor = Arc::new(BoundedExecutor::new(config.heavy_fit_workers));

        Ok(Self {
            config,
            store,
            artifacts,
            executor,
        })
    }
}
