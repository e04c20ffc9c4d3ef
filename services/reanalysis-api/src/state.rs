//! Application state for the reanalysis API.

use std::sync::Arc;

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use reanalysis_profile::{
    open_archive, ArchiveConfig, DatasetHandlePool, LookupConfig, VerticalCoefficientTable,
};
use tracing::{info, warn};

use crate::config::ApiConfig;

/// Shared application state, created once at startup and handed to every
/// handler.
pub struct AppState {
    /// Pool over the pressure-level archive.
    pub isobaric: DatasetHandlePool,

    /// Pool over the hybrid model-level archive.
    pub native: DatasetHandlePool,

    /// Hybrid level coefficients.
    pub vertical_table: Arc<VerticalCoefficientTable>,

    pub lookup: LookupConfig,

    /// Prometheus exporter, absent when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Open both pools and load the coefficient table.
    ///
    /// Blocks until every handle is open. Must run inside a multi-threaded
    /// tokio runtime, off the async worker threads (`spawn_blocking`), since
    /// remote handles drive their fetches through the runtime.
    pub fn initialize(config: &ApiConfig, prometheus: Option<PrometheusHandle>) -> Result<Self> {
        let vertical_table = VerticalCoefficientTable::load(config.vertical_table.as_deref())?;

        let isobaric = open_pool(&config.isobaric, &config.lookup)?;
        let native = match open_pool(&config.native, &config.lookup) {
            Ok(pool) => pool,
            Err(err) => {
                if let Err(close_err) = isobaric.close_all() {
                    warn!(error = %close_err, "Failed to close isobaric pool after startup failure");
                }
                return Err(err);
            }
        };

        info!(
            isobaric = isobaric.size(),
            native = native.size(),
            model_levels = vertical_table.model_levels(),
            "Application state ready"
        );

        Ok(Self::from_parts(
            isobaric,
            native,
            Arc::new(vertical_table),
            config.lookup.clone(),
            prometheus,
        ))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        isobaric: DatasetHandlePool,
        native: DatasetHandlePool,
        vertical_table: Arc<VerticalCoefficientTable>,
        lookup: LookupConfig,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            isobaric,
            native,
            vertical_table,
            lookup,
            prometheus,
        }
    }

    /// Whether both pools can serve lookups.
    pub fn is_ready(&self) -> bool {
        !self.isobaric.is_closed() && !self.native.is_closed()
    }

    /// Close both pools. Every handle is attempted; failures are logged.
    pub fn shutdown(&self) {
        for pool in [&self.isobaric, &self.native] {
            match pool.close_all() {
                Ok(()) => info!(pool = pool.name(), "Pool closed"),
                Err(err) => warn!(pool = pool.name(), error = %err, "Pool closed with failures"),
            }
        }
    }
}

fn open_pool(archive: &ArchiveConfig, lookup: &LookupConfig) -> Result<DatasetHandlePool> {
    let pool = DatasetHandlePool::initialize(&archive.name, archive.pool_size, |_| {
        open_archive(archive)
    })?;
    Ok(pool.with_max_concurrent_lookups(lookup.max_concurrent_lookups))
}
