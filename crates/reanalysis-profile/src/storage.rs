//! Storage backends for archive access.
//!
//! Cloud archives are read anonymously over HTTPS with `object_store`,
//! wrapped for the synchronous zarrs API. Local paths use the filesystem
//! store directly.

use std::path::PathBuf;
use std::sync::Arc;

use object_store::http::{HttpBuilder, HttpStore};
use tracing::info;
use zarrs_filesystem::FilesystemStore;
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use crate::config::ArchiveConfig;
use crate::dataset::{DatasetHandle, PointSlice, ZarrDataset};
use crate::error::{ProfileError, Result};
use crate::query::{PointQuery, Tolerance};

/// Blocking executor that works from within a tokio runtime.
///
/// Uses `tokio::task::block_in_place` to move the current task to a blocking
/// thread, then uses the runtime handle to drive the future. Requires the
/// multi-threaded runtime.
#[derive(Clone, Copy)]
pub struct TokioBlockOn;

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
    }
}

/// Storage type alias for HTTP-backed Zarr access (async).
pub type AsyncHttpStorage = AsyncObjectStore<HttpStore>;

/// Storage type alias for HTTP-backed Zarr access (sync adapter).
pub type HttpStorage = AsyncToSyncStorageAdapter<AsyncHttpStorage, TokioBlockOn>;

/// Where an archive lives once its URL is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// HTTPS base URL of the Zarr hierarchy.
    Http(String),
    /// Local directory holding the Zarr hierarchy.
    Local(PathBuf),
}

/// Resolve an archive URL.
///
/// `gs://bucket/path` and `s3://bucket/path` map to the public HTTPS
/// endpoints of the respective services; `file://` and bare paths are local.
pub fn resolve_store_url(url: &str) -> Result<StoreLocation> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ProfileError::ConfigError("empty archive URL".to_string()));
    }

    let location = if let Some(rest) = url.strip_prefix("gs://") {
        StoreLocation::Http(format!("https://storage.googleapis.com/{}", rest))
    } else if let Some(rest) = url.strip_prefix("s3://") {
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        StoreLocation::Http(format!("https://{}.s3.amazonaws.com/{}", bucket, key))
    } else if url.starts_with("http://") || url.starts_with("https://") {
        StoreLocation::Http(url.to_string())
    } else if let Some(path) = url.strip_prefix("file://") {
        StoreLocation::Local(PathBuf::from(path))
    } else if url.contains("://") {
        return Err(ProfileError::ConfigError(format!(
            "unsupported archive URL scheme: {}",
            url
        )));
    } else {
        StoreLocation::Local(PathBuf::from(url))
    };

    Ok(match location {
        StoreLocation::Http(base) => StoreLocation::Http(base.trim_end_matches('/').to_string()),
        local => local,
    })
}

/// Create an anonymous HTTP storage backend for Zarr access.
///
/// The returned adapter implements `ReadableStorageTraits` and must be used
/// from a multi-threaded tokio runtime.
pub fn create_http_storage(base_url: &str) -> Result<Arc<HttpStorage>> {
    let http = HttpBuilder::new()
        .with_url(base_url)
        .build()
        .map_err(|e| ProfileError::open_failed(format!("Failed to create HTTP client: {}", e)))?;

    let async_store = Arc::new(AsyncObjectStore::new(http));
    Ok(Arc::new(AsyncToSyncStorageAdapter::new(async_store, TokioBlockOn)))
}

/// Create a filesystem storage backend for a local Zarr hierarchy.
pub fn create_local_storage(path: &std::path::Path) -> Result<Arc<FilesystemStore>> {
    if !path.is_dir() {
        return Err(ProfileError::open_failed(format!(
            "archive directory {} does not exist",
            path.display()
        )));
    }
    FilesystemStore::new(path)
        .map(Arc::new)
        .map_err(|e| ProfileError::open_failed(format!("{}: {}", path.display(), e)))
}

/// A dataset handle on either backend.
pub enum ArchiveHandle {
    Remote(ZarrDataset<HttpStorage>),
    Local(ZarrDataset<FilesystemStore>),
}

impl DatasetHandle for ArchiveHandle {
    fn name(&self) -> &str {
        match self {
            ArchiveHandle::Remote(ds) => ds.name(),
            ArchiveHandle::Local(ds) => ds.name(),
        }
    }

    fn select_nearest(&self, query: &PointQuery, tolerance: &Tolerance) -> Result<PointSlice> {
        match self {
            ArchiveHandle::Remote(ds) => ds.select_nearest(query, tolerance),
            ArchiveHandle::Local(ds) => ds.select_nearest(query, tolerance),
        }
    }

    fn close(&self) -> Result<()> {
        match self {
            ArchiveHandle::Remote(ds) => ds.close(),
            ArchiveHandle::Local(ds) => ds.close(),
        }
    }
}

/// Open one handle to the archive described by `config`.
///
/// Fetches coordinate arrays and variable metadata; this is the expensive
/// step the pool amortizes.
pub fn open_archive(config: &ArchiveConfig) -> Result<ArchiveHandle> {
    let vertical = config.vertical_dimension.as_deref();

    match resolve_store_url(&config.url)? {
        StoreLocation::Http(base) => {
            info!(archive = %config.name, url = %base, "Opening remote archive");
            let storage = create_http_storage(&base)?;
            ZarrDataset::open(&config.name, storage, vertical, &config.variables)
                .map(ArchiveHandle::Remote)
        }
        StoreLocation::Local(path) => {
            info!(archive = %config.name, path = %path.display(), "Opening local archive");
            let storage = create_local_storage(&path)?;
            ZarrDataset::open(&config.name, storage, vertical, &config.variables)
                .map(ArchiveHandle::Local)
        }
    }
}
