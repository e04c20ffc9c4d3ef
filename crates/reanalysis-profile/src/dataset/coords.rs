//! Coordinate axes and CF time decoding.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::{ProfileError, Result};

/// Slack added to tolerance comparisons to absorb float rounding in stored
/// coordinates (e.g. float32 latitudes).
const TOLERANCE_EPSILON: f64 = 1e-6;

/// A strictly monotonic 1-D coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateAxis {
    name: String,
    values: Vec<f64>,
    descending: bool,
}

impl CoordinateAxis {
    /// Build an axis, rejecting empty, non-finite or non-monotonic values.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if values.is_empty() {
            return Err(ProfileError::invalid_metadata(format!(
                "coordinate '{}' is empty",
                name
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ProfileError::invalid_metadata(format!(
                "coordinate '{}' has non-finite values",
                name
            )));
        }

        let ascending = values.windows(2).all(|w| w[1] > w[0]);
        let descending = values.windows(2).all(|w| w[1] < w[0]);
        if !ascending && !descending {
            return Err(ProfileError::invalid_metadata(format!(
                "coordinate '{}' is not strictly monotonic",
                name
            )));
        }

        Ok(Self {
            name,
            // A single value counts as ascending.
            descending: descending && values.len() > 1,
            values,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the value closest to `target`. Ties go to the lower index.
    pub fn nearest(&self, target: f64) -> usize {
        let split = if self.descending {
            self.values.partition_point(|v| *v > target)
        } else {
            self.values.partition_point(|v| *v < target)
        };

        if split == 0 {
            return 0;
        }
        if split == self.values.len() {
            return split - 1;
        }

        let below = (self.values[split - 1] - target).abs();
        let above = (self.values[split] - target).abs();
        if above < below {
            split
        } else {
            split - 1
        }
    }

    /// Nearest index within `tolerance` of `target`.
    ///
    /// The error reports the nearest available coordinate; it is never
    /// substituted for the requested one.
    pub fn select(&self, target: f64, tolerance: f64) -> Result<usize> {
        let index = self.nearest(target);
        let found = self.values[index];
        if (found - target).abs() <= tolerance + TOLERANCE_EPSILON {
            Ok(index)
        } else {
            Err(ProfileError::not_found(
                &self.name,
                target,
                found,
                tolerance,
            ))
        }
    }
}

/// CF-style time encoding: `<unit> since <epoch>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    unit_seconds: i64,
    epoch: DateTime<Utc>,
}

impl CfTimeUnits {
    /// Parse a `units` attribute such as `hours since 1900-01-01`.
    pub fn parse(units: &str) -> Result<Self> {
        let (unit, epoch) = units.split_once(" since ").ok_or_else(|| {
            ProfileError::invalid_metadata(format!("time units '{}' lack 'since'", units))
        })?;

        let unit_seconds = match unit.trim().to_ascii_lowercase().as_str() {
            "seconds" | "second" | "secs" | "s" => 1,
            "minutes" | "minute" | "mins" | "min" => 60,
            "hours" | "hour" | "hrs" | "h" => 3_600,
            "days" | "day" | "d" => 86_400,
            other => {
                return Err(ProfileError::invalid_metadata(format!(
                    "unsupported time unit '{}'",
                    other
                )))
            }
        };

        Ok(Self {
            unit_seconds,
            epoch: parse_epoch(epoch.trim())?,
        })
    }

    /// Offset of `time` from the epoch, in units.
    pub fn offset_of(&self, time: DateTime<Utc>) -> f64 {
        let millis = (time - self.epoch).num_milliseconds() as f64;
        millis / 1000.0 / self.unit_seconds as f64
    }

    /// A duration expressed in units.
    pub fn duration_in_units(&self, duration: Duration) -> f64 {
        duration.num_milliseconds() as f64 / 1000.0 / self.unit_seconds as f64
    }

    /// Datetime for an encoded offset.
    pub fn datetime_at(&self, offset: f64) -> Result<DateTime<Utc>> {
        let millis = offset * self.unit_seconds as f64 * 1000.0;
        if !millis.is_finite() {
            return Err(ProfileError::invalid_metadata(format!(
                "time offset {} is not finite",
                offset
            )));
        }
        Duration::try_milliseconds(millis.round() as i64)
            .and_then(|d| self.epoch.checked_add_signed(d))
            .ok_or_else(|| {
                ProfileError::invalid_metadata(format!("time offset {} out of range", offset))
            })
    }
}

fn parse_epoch(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(ProfileError::invalid_metadata(format!(
        "unparseable time epoch '{}'",
        raw
    )))
}
