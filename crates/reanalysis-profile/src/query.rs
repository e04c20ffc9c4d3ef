//! Point queries and lookup tolerances.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};

/// Coordinate selection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    /// Closest coordinate within tolerance.
    #[default]
    Nearest,
    /// The coordinate must match exactly.
    Exact,
}

/// A (time, latitude, longitude) point query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointQuery {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Restrict the lookup to these variables; `None` reads every variable
    /// the handle serves.
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    #[serde(default)]
    pub method: SelectionMethod,
}

impl PointQuery {
    pub fn new(time: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
            variables: None,
            method: SelectionMethod::Nearest,
        }
    }

    /// Restrict the lookup to a subset of variables.
    pub fn with_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = Some(variables.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_method(mut self, method: SelectionMethod) -> Self {
        self.method = method;
        self
    }

    /// Copy of this query with longitude moved into [0, 360).
    pub fn normalized(&self) -> Self {
        Self {
            longitude: normalize_longitude(self.longitude),
            ..self.clone()
        }
    }

    /// Whether the query wants `name`.
    pub fn wants(&self, name: &str) -> bool {
        self.variables
            .as_ref()
            .map(|vars| vars.iter().any(|v| v == name))
            .unwrap_or(true)
    }
}

/// Move a longitude into [0, 360) by adding 360 when negative.
pub fn normalize_longitude(lon: f64) -> f64 {
    if lon < 0.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Per-axis tolerance for nearest-neighbor selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Maximum distance in degrees on latitude and longitude.
    pub spatial_degrees: f64,
    /// Maximum distance on time.
    pub time: Duration,
}

impl Tolerance {
    pub fn new(spatial_degrees: f64, time: Duration) -> Self {
        Self {
            spatial_degrees,
            time,
        }
    }
}

impl Default for Tolerance {
    /// 0.5 degrees in space, half the hourly cadence in time.
    fn default() -> Self {
        Self {
            spatial_degrees: 0.5,
            time: Duration::minutes(30),
        }
    }
}

/// Parse a query timestamp.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS` / `YYYY-MM-DD HH:MM:SS`
/// (taken as UTC), and a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    Err(ProfileError::InvalidMetadata(format!(
        "invalid timestamp '{}': expected ISO-8601",
        raw
    )))
}
