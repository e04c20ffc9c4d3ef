//! Profiles from hybrid model-level archives.

use tracing::debug;

use super::{aloft_fields, present, surface_first};
use crate::dataset::PointSlice;
use crate::error::{ProfileError, Result};
use crate::physics::{MetforPhysics, Thermodynamics};
use crate::profile::{Profile, ProfileData};
use crate::units::{convert, Measurement, Unit};
use crate::vertical::VerticalCoefficientTable;

/// Builds a [`Profile`] from a hybrid-level slice.
///
/// Level pressure is reconstructed as `a[k] + b[k] * surface_pressure` from
/// the coefficient table, with `k` the hybrid level number of the slice.
/// Every level is kept and no surface value is prepended: the lowest model
/// level already sits next to the ground.
#[derive(Debug, Clone)]
pub struct NativeProfileBuilder<'a, P: Thermodynamics = MetforPhysics> {
    table: &'a VerticalCoefficientTable,
    physics: P,
}

impl<'a> NativeProfileBuilder<'a> {
    pub fn new(table: &'a VerticalCoefficientTable) -> Self {
        Self {
            table,
            physics: MetforPhysics,
        }
    }
}

impl<'a, P: Thermodynamics> NativeProfileBuilder<'a, P> {
    pub fn with_physics(table: &'a VerticalCoefficientTable, physics: P) -> Self {
        Self { table, physics }
    }

    /// Level pressures in hPa for each hybrid level of the slice.
    pub fn level_pressures(&self, slice: &PointSlice, surface_pressure: &Measurement) -> Result<Vec<f64>> {
        let surface_pa = surface_pressure.to(&Unit::Pascal)?.value;
        if !surface_pa.is_finite() || surface_pa <= 0.0 {
            return Err(ProfileError::computation(
                "pressure",
                0,
                format!("invalid surface pressure {} Pa", surface_pa),
            ));
        }

        slice
            .vertical()?
            .values
            .iter()
            .map(|&k| {
                let level = self.level_for(k)?;
                convert(level.a + level.b * surface_pa, &Unit::Pascal, &Unit::Hectopascal)
            })
            .collect()
    }

    fn level_for(&self, hybrid: f64) -> Result<&crate::vertical::VerticalLevel> {
        let index = hybrid.round();
        if (hybrid - index).abs() > 1e-6 || index < 1.0 || index as usize > self.table.model_levels() {
            return Err(ProfileError::invalid_metadata(format!(
                "hybrid level {} has no coefficients (table covers 1..={})",
                hybrid,
                self.table.model_levels()
            )));
        }
        self.table
            .level(index as usize)
            .ok_or_else(|| ProfileError::invalid_metadata(format!("hybrid level {} out of range", hybrid)))
    }

    /// Build the profile.
    ///
    /// `surface_pressure` comes from a separate lookup, typically the
    /// pressure-level archive at the same point and time.
    pub fn build(&self, slice: &PointSlice, surface_pressure: &Measurement) -> Result<Profile> {
        let pressure_hpa = self.level_pressures(slice, surface_pressure)?;
        let order = surface_first(&pressure_hpa, (0..pressure_hpa.len()).collect());

        debug!(
            levels = pressure_hpa.len(),
            surface_pa = surface_pressure.value,
            "Building native profile"
        );

        let aloft = aloft_fields(&self.physics, slice, &pressure_hpa, &order)?;

        let data = ProfileData {
            pressure: present(&aloft.pressure),
            height: present(&aloft.height),
            temperature: present(&aloft.temperature),
            dewpoint: present(&aloft.dewpoint),
            u_wind: present(&aloft.u_wind),
            v_wind: present(&aloft.v_wind),
            omega: present(&aloft.omega),
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
