//! Profile assembly from point slices.
//!
//! Both builders turn per-level archive values into the seven profile
//! sequences, surface first and ascending in height. Unit conversions happen
//! here, where raw values are read; the sequences carry the units recorded
//! in [`ProfileUnits`].

mod isobaric;
mod native;

pub use isobaric::IsobaricProfileBuilder;
pub use native::NativeProfileBuilder;

use tracing::warn;

use crate::dataset::{Field, PointSlice};
use crate::error::{ProfileError, Result};
use crate::physics::Thermodynamics;
use crate::profile::ProfileUnits;
use crate::units::{convert, Measurement, Unit};

/// Archive variable names.
pub mod vars {
    pub const GEOPOTENTIAL: &str = "geopotential";
    pub const TEMPERATURE: &str = "temperature";
    pub const SPECIFIC_HUMIDITY: &str = "specific_humidity";
    pub const U_WIND: &str = "u_component_of_wind";
    pub const V_WIND: &str = "v_component_of_wind";
    pub const VERTICAL_VELOCITY: &str = "vertical_velocity";
    pub const SURFACE_PRESSURE: &str = "surface_pressure";
    pub const TEMPERATURE_2M: &str = "2m_temperature";
    pub const DEWPOINT_2M: &str = "2m_dewpoint_temperature";
    pub const U_WIND_10M: &str = "10m_u_component_of_wind";
    pub const V_WIND_10M: &str = "10m_v_component_of_wind";
}

/// Surface pressure of a slice, in pascals.
pub fn surface_pressure(slice: &PointSlice) -> Result<Measurement> {
    let sp = slice.scalar(vars::SURFACE_PRESSURE)?;
    let sp = with_default_unit(sp, Unit::Pascal).to(&Unit::Pascal)?;
    if !sp.value.is_finite() || sp.value <= 0.0 {
        return Err(ProfileError::computation(
            "surface_pressure",
            0,
            format!("invalid surface pressure {}", sp.value),
        ));
    }
    Ok(sp)
}

/// Level fields restricted and ordered surface-first.
#[derive(Debug)]
struct AloftFields {
    pressure: Vec<f64>,
    height: Vec<f64>,
    temperature: Vec<f64>,
    dewpoint: Vec<f64>,
    u_wind: Vec<f64>,
    v_wind: Vec<f64>,
    omega: Vec<f64>,
    /// Unit of `temperature` and `dewpoint`.
    temperature_unit: Unit,
    /// Unit of the wind components.
    wind_unit: Unit,
    units: ProfileUnits,
}

/// Indices of `selected` ordered so that pressure decreases, i.e. from the
/// lowest level upward. Archives store levels top-down, so this is normally
/// a reversal.
fn surface_first(pressure: &[f64], selected: Vec<usize>) -> Vec<usize> {
    let mut order = selected;
    let top_down = pressure.first() <= pressure.last();
    if top_down {
        order.reverse();
    }
    order
}

/// Gather per-level fields at `order`, deriving height and dewpoint.
///
/// `pressure_hpa` holds one pressure per archive level.
fn aloft_fields<P: Thermodynamics>(
    physics: &P,
    slice: &PointSlice,
    pressure_hpa: &[f64],
    order: &[usize],
) -> Result<AloftFields> {
    let geopotential = slice.levels(vars::GEOPOTENTIAL)?;
    let temperature = slice.levels(vars::TEMPERATURE)?;
    let humidity = slice.levels(vars::SPECIFIC_HUMIDITY)?;
    let u_wind = slice.levels(vars::U_WIND)?;
    let v_wind = slice.levels(vars::V_WIND)?;
    let omega = slice.levels(vars::VERTICAL_VELOCITY)?;

    require_unit(geopotential, Unit::SquareMeterPerSecondSquared)?;
    require_unit(humidity, Unit::KilogramPerKilogram)?;
    if unit_or(v_wind, Unit::MeterPerSecond) != unit_or(u_wind, Unit::MeterPerSecond) {
        return Err(ProfileError::invalid_metadata(format!(
            "wind components disagree on units: '{}' vs '{}'",
            u_wind.units, v_wind.units
        )));
    }

    let temperature_unit = unit_or(temperature, Unit::Kelvin);
    let wind_unit = unit_or(u_wind, Unit::MeterPerSecond);

    let mut fields = AloftFields {
        pressure: Vec::with_capacity(order.len()),
        height: Vec::with_capacity(order.len()),
        temperature: Vec::with_capacity(order.len()),
        dewpoint: Vec::with_capacity(order.len()),
        u_wind: Vec::with_capacity(order.len()),
        v_wind: Vec::with_capacity(order.len()),
        omega: Vec::with_capacity(order.len()),
        units: ProfileUnits {
            pressure: Unit::Hectopascal.label().to_string(),
            height: Unit::Meter.label().to_string(),
            temperature: label_or(temperature, &temperature_unit),
            dewpoint: label_or(temperature, &temperature_unit),
            u_wind: label_or(u_wind, &wind_unit),
            v_wind: label_or(v_wind, &wind_unit),
            omega: label_or(omega, &Unit::PascalPerSecond),
        },
        temperature_unit,
        wind_unit,
    };

    for &level in order {
        let p = pressure_hpa[level];
        let t = temperature.values[level];

        let height = physics.height(geopotential.values[level]);
        if !height.is_finite() {
            return Err(ProfileError::computation(
                "height",
                level,
                "geopotential is not finite",
            ));
        }

        let t_k = convert(t, &fields.temperature_unit, &Unit::Kelvin)?;
        let dewpoint = physics
            .dewpoint(p, t_k, humidity.values[level])
            .ok_or_else(|| {
                warn!(level, pressure = p, temperature = t_k, q = humidity.values[level], "Dewpoint undefined");
                ProfileError::computation(
                    "dewpoint",
                    level,
                    format!(
                        "undefined for p={} hPa, T={} K, q={}",
                        p, t_k, humidity.values[level]
                    ),
                )
            })?;

        fields.pressure.push(p);
        fields.height.push(height);
        fields.temperature.push(t);
        fields
            .dewpoint
            .push(convert(dewpoint, &Unit::Kelvin, &fields.temperature_unit)?);
        fields.u_wind.push(u_wind.values[level]);
        fields.v_wind.push(v_wind.values[level]);
        fields.omega.push(omega.values[level]);
    }

    Ok(fields)
}

/// `[surface] + aloft`.
fn merge_surface(surface: Option<f64>, aloft: &[f64]) -> Vec<Option<f64>> {
    std::iter::once(surface)
        .chain(aloft.iter().copied().map(Some))
        .collect()
}

fn present(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

/// Parsed unit of a field, or `default` when the archive gives none.
fn unit_or(field: &Field, default: Unit) -> Unit {
    if field.units.trim().is_empty() {
        default
    } else {
        field.unit()
    }
}

fn label_or(field: &Field, default: &Unit) -> String {
    if field.units.trim().is_empty() {
        default.label().to_string()
    } else {
        field.units.clone()
    }
}

fn with_default_unit(measurement: Measurement, default: Unit) -> Measurement {
    match &measurement.unit {
        Unit::Other(label) if label.trim().is_empty() => Measurement::new(measurement.value, default),
        _ => measurement,
    }
}

fn require_unit(field: &Field, expected: Unit) -> Result<()> {
    let unit = unit_or(field, expected.clone());
    if unit == expected {
        Ok(())
    } else {
        Err(ProfileError::UnsupportedConversion {
            from: unit.to_string(),
            to: expected.to_string(),
        })
    }
}
