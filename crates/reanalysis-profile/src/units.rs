//! Explicit value + unit pairing with a small table of supported conversions.
//!
//! Archive arrays carry free-form `units` attributes ("K", "Pa", "m s**-1",
//! "millibars", ...). They are parsed into [`Unit`] once, where the raw value
//! is read, and every cross-unit operation names its source and target unit.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProfileError, Result};

/// A physical unit understood by the profile builders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    Pascal,
    Hectopascal,
    Kelvin,
    Celsius,
    Meter,
    MeterPerSecond,
    PascalPerSecond,
    /// Geopotential (m**2 s**-2).
    SquareMeterPerSecondSquared,
    /// Mass mixing quantities such as specific humidity.
    KilogramPerKilogram,
    /// Any label without a known conversion; carried through verbatim.
    Other(String),
}

impl Unit {
    /// Parse an archive `units` attribute.
    ///
    /// Matching is case-sensitive for single-letter symbols (`K`, `m`) and
    /// otherwise tolerant of the spelling variants used by CF and ECMWF.
    pub fn parse(label: &str) -> Self {
        let trimmed = label.trim();
        match trimmed {
            "Pa" | "pa" | "pascal" | "pascals" => Unit::Pascal,
            "hPa" | "hpa" | "mb" | "mbar" | "millibar" | "millibars" | "hectopascal"
            | "hectopascals" => Unit::Hectopascal,
            "K" | "kelvin" | "degK" | "degrees_K" => Unit::Kelvin,
            "degC" | "C" | "celsius" | "degrees_C" | "°C" => Unit::Celsius,
            "m" | "meter" | "meters" | "metre" | "metres" => Unit::Meter,
            "m s**-1" | "m s-1" | "m/s" | "m s^-1" | "meters per second" => Unit::MeterPerSecond,
            "Pa s**-1" | "Pa s-1" | "Pa/s" | "Pa s^-1" => Unit::PascalPerSecond,
            "m**2 s**-2" | "m2 s-2" | "m^2/s^2" | "m^2 s^-2" => {
                Unit::SquareMeterPerSecondSquared
            }
            "kg kg**-1" | "kg kg-1" | "kg/kg" | "1" => Unit::KilogramPerKilogram,
            other => Unit::Other(other.to_string()),
        }
    }

    /// Short label used in response unit metadata.
    pub fn label(&self) -> &str {
        match self {
            Unit::Pascal => "Pa",
            Unit::Hectopascal => "hPa",
            Unit::Kelvin => "K",
            Unit::Celsius => "degC",
            Unit::Meter => "m",
            Unit::MeterPerSecond => "m/s",
            Unit::PascalPerSecond => "Pa/s",
            Unit::SquareMeterPerSecondSquared => "m**2 s**-2",
            Unit::KilogramPerKilogram => "kg/kg",
            Unit::Other(label) => label,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Convert `value` from one unit to another.
///
/// Only pressure (Pa/hPa) and temperature (K/degC) conversions are defined;
/// converting a unit to itself is the identity.
pub fn convert(value: f64, from: &Unit, to: &Unit) -> Result<f64> {
    if from == to {
        return Ok(value);
    }
    match (from, to) {
        (Unit::Pascal, Unit::Hectopascal) => Ok(value / 100.0),
        (Unit::Hectopascal, Unit::Pascal) => Ok(value * 100.0),
        (Unit::Kelvin, Unit::Celsius) => Ok(value - 273.15),
        (Unit::Celsius, Unit::Kelvin) => Ok(value + 273.15),
        _ => Err(ProfileError::UnsupportedConversion {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

/// Convert a whole sequence between units.
pub fn convert_all(values: &[f64], from: &Unit, to: &Unit) -> Result<Vec<f64>> {
    values.iter().map(|v| convert(*v, from, to)).collect()
}

/// A scalar value paired with its unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub value: f64,
    pub unit: Unit,
}

impl Measurement {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Re-express this measurement in `unit`.
    pub fn to(&self, unit: &Unit) -> Result<Measurement> {
        Ok(Measurement {
            value: convert(self.value, &self.unit, unit)?,
            unit: unit.clone(),
        })
    }
}
