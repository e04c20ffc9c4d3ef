//! Profiles from fixed pressure-level archives.

use tracing::debug;

use super::{aloft_fields, merge_surface, surface_first, surface_pressure, unit_or, vars};
use crate::dataset::PointSlice;
use crate::error::Result;
use crate::physics::{MetforPhysics, Thermodynamics};
use crate::profile::{Profile, ProfileData};
use crate::units::{convert, convert_all, Unit};

/// Builds a [`Profile`] from a pressure-level slice.
///
/// Only levels with nominal pressure strictly below the surface pressure are
/// kept. The surface value (2 m temperature and dewpoint, 10 m winds, zero
/// height) is prepended; surface vertical motion is undefined and null.
#[derive(Debug, Clone, Default)]
pub struct IsobaricProfileBuilder<P: Thermodynamics = MetforPhysics> {
    physics: P,
}

impl IsobaricProfileBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<P: Thermodynamics> IsobaricProfileBuilder<P> {
    pub fn with_physics(physics: P) -> Self {
        Self { physics }
    }

    pub fn build(&self, slice: &PointSlice) -> Result<Profile> {
        let surface_hpa = surface_pressure(slice)?.to(&Unit::Hectopascal)?.value;

        let vertical = slice.vertical()?;
        let level_unit = if vertical.units.trim().is_empty() {
            Unit::Hectopascal
        } else {
            Unit::parse(&vertical.units)
        };
        let levels_hpa = convert_all(&vertical.values, &level_unit, &Unit::Hectopascal)?;

        let above_ground: Vec<usize> = levels_hpa
            .iter()
            .enumerate()
            .filter(|(_, p)| **p < surface_hpa)
            .map(|(i, _)| i)
            .collect();
        let order = surface_first(&levels_hpa, above_ground);

        debug!(
            surface_hpa,
            levels = levels_hpa.len(),
            above_ground = order.len(),
            "Building isobaric profile"
        );

        let aloft = aloft_fields(&self.physics, slice, &levels_hpa, &order)?;

        let t2m = slice.field(vars::TEMPERATURE_2M)?;
        let d2m = slice.field(vars::DEWPOINT_2M)?;
        let u10 = slice.field(vars::U_WIND_10M)?;
        let v10 = slice.field(vars::V_WIND_10M)?;

        let surface_temperature = convert(
            slice.scalar(vars::TEMPERATURE_2M)?.value,
            &unit_or(t2m, Unit::Kelvin),
            &aloft.temperature_unit,
        )?;
        let surface_dewpoint = convert(
            slice.scalar(vars::DEWPOINT_2M)?.value,
            &unit_or(d2m, Unit::Kelvin),
            &aloft.temperature_unit,
        )?;
        let surface_u = convert(
            slice.scalar(vars::U_WIND_10M)?.value,
            &unit_or(u10, Unit::MeterPerSecond),
            &aloft.wind_unit,
        )?;
        let surface_v = convert(
            slice.scalar(vars::V_WIND_10M)?.value,
            &unit_or(v10, Unit::MeterPerSecond),
            &aloft.wind_unit,
        )?;

        let data = ProfileData {
            pressure: merge_surface(Some(surface_hpa), &aloft.pressure),
            height: merge_surface(Some(0.0), &aloft.height),
            temperature: merge_surface(Some(surface_temperature), &aloft.temperature),
            dewpoint: merge_surface(Some(surface_dewpoint), &aloft.dewpoint),
            u_wind: merge_surface(Some(surface_u), &aloft.u_wind),
            v_wind: merge_surface(Some(surface_v), &aloft.v_wind),
            omega: merge_surface(None, &aloft.omega),
        };
        data.validate()?;

        Ok(Profile {
            lat: slice.latitude,
            lon: slice.longitude,
            timestamp: slice.time,
            data,
            units: aloft.units,
        })
    }
}
