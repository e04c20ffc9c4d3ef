//! Read-only handles to gridded reanalysis archives.
//!
//! A [`DatasetHandle`] is opened once and then serves any number of
//! independent point lookups. Each lookup returns a [`PointSlice`]: the
//! values of every requested variable at one (time, latitude, longitude),
//! across all vertical levels.

pub mod coords;
pub mod zarr;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ProfileError, Result};
use crate::query::{PointQuery, Tolerance};
use crate::units::{Measurement, Unit};

pub use coords::{CfTimeUnits, CoordinateAxis};
pub use zarr::ZarrDataset;

/// A long-lived, shareable connection to one archive.
pub trait DatasetHandle: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Nearest-neighbor point lookup.
    ///
    /// Fails with [`ProfileError::NotFound`] when any axis has no coordinate
    /// within tolerance.
    fn select_nearest(&self, query: &PointQuery, tolerance: &Tolerance) -> Result<PointSlice>;

    /// Release the handle. Later lookups fail with [`ProfileError::Closed`].
    fn close(&self) -> Result<()>;
}

/// Values of one variable at the selected point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// One value for surface variables, one per level otherwise.
    pub values: Vec<f64>,
    /// Raw `units` attribute from the archive.
    pub units: String,
}

impl Field {
    pub fn new(values: Vec<f64>, units: impl Into<String>) -> Self {
        Self {
            values,
            units: units.into(),
        }
    }

    pub fn unit(&self) -> Unit {
        Unit::parse(&self.units)
    }
}

/// Vertical coordinate of a slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerticalCoordinate {
    /// Dimension name, e.g. `level` or `hybrid`.
    pub name: String,
    pub values: Vec<f64>,
    pub units: String,
}

/// Single-point, all-levels reduction of an archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointSlice {
    /// Latitude of the selected grid point.
    pub latitude: f64,
    /// Longitude of the selected grid point.
    pub longitude: f64,
    /// Time of the selected archive step.
    pub time: DateTime<Utc>,
    pub vertical: Option<VerticalCoordinate>,
    pub variables: BTreeMap<String, Field>,
}

impl PointSlice {
    /// Values of a variable.
    pub fn field(&self, name: &str) -> Result<&Field> {
        self.variables
            .get(name)
            .ok_or_else(|| ProfileError::MissingVariable(name.to_string()))
    }

    /// Single value of a surface variable, with its unit.
    pub fn scalar(&self, name: &str) -> Result<Measurement> {
        let field = self.field(name)?;
        match field.values.as_slice() {
            [value] => Ok(Measurement::new(*value, field.unit())),
            values => Err(ProfileError::invalid_metadata(format!(
                "expected one value for '{}', found {}",
                name,
                values.len()
            ))),
        }
    }

    /// Values of a level variable, checked against the vertical coordinate.
    pub fn levels(&self, name: &str) -> Result<&Field> {
        let field = self.field(name)?;
        let expected = self.vertical()?.values.len();
        if field.values.len() != expected {
            return Err(ProfileError::invalid_metadata(format!(
                "'{}' has {} levels, vertical coordinate has {}",
                name,
                field.values.len(),
                expected
            )));
        }
        Ok(field)
    }

    pub fn vertical(&self) -> Result<&VerticalCoordinate> {
        self.vertical
            .as_ref()
            .ok_or_else(|| ProfileError::invalid_metadata("slice has no vertical coordinate"))
    }
}
