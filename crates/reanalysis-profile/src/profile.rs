//! Vertical profile model returned to callers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};

/// One vertical profile at a single grid point and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Latitude of the selected grid point.
    pub lat: f64,
    /// Longitude of the selected grid point, in [0, 360).
    pub lon: f64,
    /// Valid time of the selected archive step.
    pub timestamp: DateTime<Utc>,
    pub data: ProfileData,
    pub units: ProfileUnits,
}

/// Seven parallel sequences, surface first and ascending in height.
///
/// `None` marks a value that is physically undefined (surface vertical
/// motion on pressure levels).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    pub pressure: Vec<Option<f64>>,
    pub height: Vec<Option<f64>>,
    pub temperature: Vec<Option<f64>>,
    pub dewpoint: Vec<Option<f64>>,
    pub u_wind: Vec<Option<f64>>,
    pub v_wind: Vec<Option<f64>>,
    pub omega: Vec<Option<f64>>,
}

/// Unit label per [`ProfileData`] field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUnits {
    pub pressure: String,
    pub height: String,
    pub temperature: String,
    pub dewpoint: String,
    pub u_wind: String,
    pub v_wind: String,
    pub omega: String,
}

/// Names of the profile fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileField {
    Pressure,
    Height,
    Temperature,
    Dewpoint,
    UWind,
    VWind,
    Omega,
}

impl ProfileField {
    pub const ALL: [ProfileField; 7] = [
        ProfileField::Pressure,
        ProfileField::Height,
        ProfileField::Temperature,
        ProfileField::Dewpoint,
        ProfileField::UWind,
        ProfileField::VWind,
        ProfileField::Omega,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileField::Pressure => "pressure",
            ProfileField::Height => "height",
            ProfileField::Temperature => "temperature",
            ProfileField::Dewpoint => "dewpoint",
            ProfileField::UWind => "u_wind",
            ProfileField::VWind => "v_wind",
            ProfileField::Omega => "omega",
        }
    }
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProfileData {
    /// Sequence for a given field.
    pub fn field(&self, field: ProfileField) -> &[Option<f64>] {
        match field {
            ProfileField::Pressure => &self.pressure,
            ProfileField::Height => &self.height,
            ProfileField::Temperature => &self.temperature,
            ProfileField::Dewpoint => &self.dewpoint,
            ProfileField::UWind => &self.u_wind,
            ProfileField::VWind => &self.v_wind,
            ProfileField::Omega => &self.omega,
        }
    }

    /// Number of levels, taken from the pressure sequence.
    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }

    /// Check the structural invariants: all sequences share one length
    /// of at least 1, and every present value is finite.
    ///
    /// Pressure and height ordering are the builders' responsibility and
    /// are not checked here; hybrid-level pressure can legitimately tie or
    /// invert near the sigma transition over very high terrain.
    pub fn validate(&self) -> Result<()> {
        let len = self.len();
        if len == 0 {
            return Err(ProfileError::InvariantViolation(
                "profile has no levels".to_string(),
            ));
        }

        for field in ProfileField::ALL {
            let values = self.field(field);
            if values.len() != len {
                return Err(ProfileError::InvariantViolation(format!(
                    "{} has {} values, pressure has {}",
                    field,
                    values.len(),
                    len
                )));
            }
            if let Some(level) = values
                .iter()
                .position(|v| v.map(|v| !v.is_finite()).unwrap_or(false))
            {
                return Err(ProfileError::computation(
                    field.as_str(),
                    level,
                    "non-finite value",
                ));
            }
        }

        Ok(())
    }
}
