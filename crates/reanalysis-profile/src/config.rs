//! Archive and lookup configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};
use crate::query::Tolerance;

/// Public ARCO ERA5 archive on pressure levels.
pub const ERA5_ISOBARIC_URL: &str =
    "gs://gcp-public-data-arco-era5/ar/full_37-1h-0p25deg-chunk-1.zarr-v3";

/// Public ARCO ERA5 archive on hybrid model levels.
pub const ERA5_NATIVE_URL: &str = "gs://gcp-public-data-arco-era5/ar/model-level-1h-0p25deg.zarr-v1";

const ISOBARIC_VARIABLES: &[&str] = &[
    "geopotential",
    "temperature",
    "specific_humidity",
    "u_component_of_wind",
    "v_component_of_wind",
    "vertical_velocity",
    "surface_pressure",
    "2m_temperature",
    "2m_dewpoint_temperature",
    "10m_u_component_of_wind",
    "10m_v_component_of_wind",
];

const NATIVE_VARIABLES: &[&str] = &[
    "geopotential",
    "temperature",
    "specific_humidity",
    "u_component_of_wind",
    "v_component_of_wind",
    "vertical_velocity",
];

/// Configuration of one archive and its handle pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Pool name used in logs, metrics and errors.
    pub name: String,

    /// Store URL (`gs://`, `s3://`, `https://`, `file://` or a local path).
    pub url: String,

    /// Name of the vertical coordinate array.
    #[serde(default)]
    pub vertical_dimension: Option<String>,

    /// Number of handles kept open.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Variables each handle serves.
    pub variables: Vec<String>,
}

fn default_pool_size() -> usize {
    3
}

impl ArchiveConfig {
    pub fn era5_isobaric() -> Self {
        Self {
            name: "era5-isobaric".to_string(),
            url: ERA5_ISOBARIC_URL.to_string(),
            vertical_dimension: Some("level".to_string()),
            pool_size: default_pool_size(),
            variables: ISOBARIC_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn era5_native() -> Self {
        Self {
            name: "era5-native".to_string(),
            url: ERA5_NATIVE_URL.to_string(),
            vertical_dimension: Some("hybrid".to_string()),
            pool_size: default_pool_size(),
            variables: NATIVE_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::ConfigError("archive name is empty".to_string()));
        }
        if self.url.trim().is_empty() {
            return Err(ProfileError::ConfigError(format!(
                "archive '{}' has no URL",
                self.name
            )));
        }
        if self.pool_size == 0 {
            return Err(ProfileError::ConfigError(format!(
                "archive '{}' pool_size must be at least 1",
                self.name
            )));
        }
        if self.variables.is_empty() {
            return Err(ProfileError::ConfigError(format!(
                "archive '{}' serves no variables",
                self.name
            )));
        }
        Ok(())
    }
}

/// Tolerances and bounds applied to every lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Maximum distance in degrees on latitude and longitude.
    #[serde(default = "default_spatial_tolerance")]
    pub spatial_tolerance_deg: f64,

    /// Maximum distance in minutes on time.
    #[serde(default = "default_time_tolerance")]
    pub time_tolerance_minutes: i64,

    /// Upper bound on a single remote lookup.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Lookups allowed in flight per pool.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_lookups: usize,
}

fn default_spatial_tolerance() -> f64 {
    0.5
}

/// Widest accepted time tolerance: one leap year.
pub const MAX_TIME_TOLERANCE_MINUTES: i64 = 366 * 24 * 60;

fn default_time_tolerance() -> i64 {
    30
}

fn default_timeout() -> u64 {
    60
}

fn default_max_concurrent() -> usize {
    8
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            spatial_tolerance_deg: default_spatial_tolerance(),
            time_tolerance_minutes: default_time_tolerance(),
            timeout_secs: default_timeout(),
            max_concurrent_lookups: default_max_concurrent(),
        }
    }
}

impl LookupConfig {
    /// Override fields from environment variables that are set and parse.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("LOOKUP_TOLERANCE_DEG") {
            if let Ok(deg) = val.parse() {
                self.spatial_tolerance_deg = deg;
            }
        }

        if let Ok(val) = std::env::var("LOOKUP_TIME_TOLERANCE_MINUTES") {
            if let Ok(minutes) = val.parse() {
                self.time_tolerance_minutes = minutes;
            }
        }

        if let Ok(val) = std::env::var("LOOKUP_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("LOOKUP_MAX_CONCURRENT") {
            if let Ok(n) = val.parse() {
                self.max_concurrent_lookups = n;
            }
        }
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(
            self.spatial_tolerance_deg,
            Duration::minutes(
                self.time_tolerance_minutes
                    .clamp(0, MAX_TIME_TOLERANCE_MINUTES),
            ),
        )
    }

    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.spatial_tolerance_deg.is_finite() && self.spatial_tolerance_deg >= 0.0) {
            return Err(ProfileError::ConfigError(format!(
                "spatial tolerance must be a non-negative number, got {}",
                self.spatial_tolerance_deg
            )));
        }
        if !(0..=MAX_TIME_TOLERANCE_MINUTES).contains(&self.time_tolerance_minutes) {
            return Err(ProfileError::ConfigError(format!(
                "time tolerance must be within [0, {}] minutes, got {}",
                MAX_TIME_TOLERANCE_MINUTES, self.time_tolerance_minutes
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ProfileError::ConfigError(
                "lookup timeout must be at least 1 second".to_string(),
            ));
        }
        if self.max_concurrent_lookups == 0 {
            return Err(ProfileError::ConfigError(
                "max_concurrent_lookups must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_era5_defaults() {
        let isobaric = ArchiveConfig::era5_isobaric();
        assert_eq!(isobaric.pool_size, 3);
        assert_eq!(isobaric.vertical_dimension.as_deref(), Some("level"));
        assert!(isobaric.variables.iter().any(|v| v == "surface_pressure"));
        assert!(isobaric.validate().is_ok());

        let native = ArchiveConfig::era5_native();
        assert_eq!(native.vertical_dimension.as_deref(), Some("hybrid"));
        assert!(!native.variables.iter().any(|v| v == "surface_pressure"));
        assert!(native.validate().is_ok());
    }

    #[test]
    fn test_invalid_archive_config() {
        let mut config = ArchiveConfig::era5_native();
        config.pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = ArchiveConfig::era5_native();
        config.variables.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lookup_defaults() {
        let config = LookupConfig::default();
        assert!(config.validate().is_ok());
        let tolerance = config.tolerance();
        assert_eq!(tolerance.spatial_degrees, 0.5);
        assert_eq!(tolerance.time, Duration::minutes(30));
        assert_eq!(config.timeout(), StdDuration::from_secs(60));
    }

    #[test]
    fn test_lookup_validation() {
        let config = LookupConfig {
            spatial_tolerance_deg: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LookupConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_time_tolerance_is_bounded() {
        for minutes in [-1, MAX_TIME_TOLERANCE_MINUTES + 1, i64::MAX] {
            let config = LookupConfig {
                time_tolerance_minutes: minutes,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "{minutes}");
        }

        let config = LookupConfig {
            time_tolerance_minutes: MAX_TIME_TOLERANCE_MINUTES,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        // Out-of-range values never reach chrono unclamped.
        let config = LookupConfig {
            time_tolerance_minutes: i64::MAX,
            ..Default::default()
        };
        assert_eq!(
            config.tolerance().time,
            Duration::minutes(MAX_TIME_TOLERANCE_MINUTES)
        );
    }

    #[test]
    fn test_archive_config_defaults_pool_size() {
        let config: ArchiveConfig = serde_json::from_value(serde_json::json!({
            "name": "local",
            "url": "/data/era5.zarr",
            "variables": ["temperature"]
        }))
        .unwrap();
        assert_eq!(config.pool_size, 3);
        assert!(config.vertical_dimension.is_none());
    }
}
