//! Vertical Profiles from Chunked Reanalysis Archives
//!
//! This crate answers point queries ("what does the atmosphere look like above
//! this place at this time?") against large cloud-hosted Zarr archives such
//! as ARCO ERA5. It provides:
//!
//! - **Pooled handles**: a fixed set of opened archives shared by all lookups,
//!   selected round-robin with an atomic counter
//! - **Tolerant lookups**: nearest-neighbor selection on time, latitude and
//!   longitude that fails with `NotFound` outside tolerance
//! - **Profile assembly**: pressure-level and hybrid-level slices turned into
//!   one surface-first, unit-labelled profile
//!
//! # Architecture
//!
//! ```text
//! PointQuery (time, lat, lon)
//!      │
//!      ▼
//! DatasetHandlePool::lookup
//!      │
//!      ├─► next handle (atomic round-robin)
//!      │
//!      └─► ZarrDataset::select_nearest  (blocking pool, timeout)
//!               │
//!               ▼
//!          PointSlice (all levels at one point)
//!               │
//!      ┌────────┴─────────┐
//!      ▼                  ▼
//! IsobaricProfileBuilder  NativeProfileBuilder (+ coefficient table,
//!      │                  │                     surface pressure)
//!      └────────┬─────────┘
//!               ▼
//!            Profile
//! ```
//!
//! # Example
//!
//! ```ignore
//! use reanalysis_profile::{open_archive, ArchiveConfig, DatasetHandlePool};
//! use reanalysis_profile::{IsobaricProfileBuilder, LookupConfig, PointQuery};
//!
//! let config = ArchiveConfig::era5_isobaric();
//! let pool = DatasetHandlePool::initialize(&config.name, config.pool_size, |_| open_archive(&config))?;
//!
//! let lookup = LookupConfig::default();
//! let query = PointQuery::new(time, 40.0, -105.0);
//! let slice = pool.lookup(query, lookup.tolerance(), lookup.timeout()).await?;
//! let profile = IsobaricProfileBuilder::new().build(&slice)?;
//! ```

pub mod builder;
pub mod config;
pub mod dataset;
pub mod error;
pub mod physics;
pub mod pool;
pub mod profile;
pub mod query;
pub mod storage;
pub mod units;
pub mod vertical;

// Re-export commonly used types at crate root
pub use builder::{surface_pressure, IsobaricProfileBuilder, NativeProfileBuilder};
pub use config::{ArchiveConfig, LookupConfig};
pub use dataset::{DatasetHandle, Field, PointSlice, VerticalCoordinate, ZarrDataset};
pub use error::{ProfileError, Result};
pub use physics::{MetforPhysics, Thermodynamics, STANDARD_GRAVITY};
pub use pool::DatasetHandlePool;
pub use profile::{Profile, ProfileData, ProfileField, ProfileUnits};
pub use query::{normalize_longitude, parse_timestamp, PointQuery, SelectionMethod, Tolerance};
pub use storage::{open_archive, ArchiveHandle};
pub use units::{Measurement, Unit};
pub use vertical::{VerticalCoefficientTable, VerticalLevel};
