//! Zarr-backed dataset handle.
//!
//! Opening fetches the coordinate arrays and the metadata of every served
//! variable. Lookups then read only the chunks covering the selected point.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};
use zarrs::array::{Array, DataType};
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;

use super::coords::{CfTimeUnits, CoordinateAxis};
use super::{DatasetHandle, Field, PointSlice, VerticalCoordinate};
use crate::error::{ProfileError, Result};
use crate::query::{PointQuery, SelectionMethod, Tolerance};

const TIME: &str = "time";
const LATITUDE: &str = "latitude";
const LONGITUDE: &str = "longitude";

/// One opened variable array.
struct VariableArray<S: ReadableStorageTraits + 'static> {
    array: Array<S>,
    dims: Vec<String>,
    units: String,
}

/// Coordinates and variable arrays of an open archive.
struct OpenArchive<S: ReadableStorageTraits + 'static> {
    time_units: CfTimeUnits,
    time: CoordinateAxis,
    latitude: CoordinateAxis,
    longitude: CoordinateAxis,
    vertical: Option<VerticalCoordinate>,
    variables: BTreeMap<String, VariableArray<S>>,
}

/// A [`DatasetHandle`] over a Zarr hierarchy.
///
/// The hierarchy must hold `time`, `latitude` and `longitude` coordinate
/// arrays at its root, plus the vertical coordinate when one is configured.
pub struct ZarrDataset<S: ReadableStorageTraits + 'static> {
    name: String,
    archive: RwLock<Option<Arc<OpenArchive<S>>>>,
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> ZarrDataset<S> {
    /// Open an archive and the given variables.
    ///
    /// # Arguments
    /// * `name` - Name used in logs and errors
    /// * `storage` - The storage backend
    /// * `vertical_dimension` - Name of the vertical coordinate (`level`, `hybrid`), if any
    /// * `variables` - Variables this handle serves
    pub fn open(
        name: impl Into<String>,
        storage: Arc<S>,
        vertical_dimension: Option<&str>,
        variables: &[String],
    ) -> Result<Self> {
        let name = name.into();

        let time_array = open_array(&storage, TIME)?;
        let time_units = CfTimeUnits::parse(&string_attr(&time_array, "units").ok_or_else(|| {
            ProfileError::invalid_metadata("time coordinate has no units attribute")
        })?)?;
        let time = CoordinateAxis::new(TIME, read_all(&time_array)?)?;

        let latitude = CoordinateAxis::new(LATITUDE, read_all(&open_array(&storage, LATITUDE)?)?)?;
        let longitude =
            CoordinateAxis::new(LONGITUDE, read_all(&open_array(&storage, LONGITUDE)?)?)?;

        let vertical = match vertical_dimension {
            Some(dim) => {
                let array = open_array(&storage, dim)?;
                Some(VerticalCoordinate {
                    name: dim.to_string(),
                    values: read_all(&array)?,
                    units: string_attr(&array, "units").unwrap_or_default(),
                })
            }
            None => None,
        };

        let mut opened = BTreeMap::new();
        for variable in variables {
            let array = open_array(&storage, variable)?;
            let dims = dimension_names(&array, vertical_dimension)?;
            let units = string_attr(&array, "units").unwrap_or_default();
            opened.insert(variable.clone(), VariableArray { array, dims, units });
        }

        info!(
            dataset = %name,
            times = time.len(),
            latitudes = latitude.len(),
            longitudes = longitude.len(),
            levels = vertical.as_ref().map(|v| v.values.len()).unwrap_or(0),
            variables = opened.len(),
            "Opened Zarr archive"
        );

        Ok(Self {
            name,
            archive: RwLock::new(Some(Arc::new(OpenArchive {
                time_units,
                time,
                latitude,
                longitude,
                vertical,
                variables: opened,
            }))),
        })
    }

    fn archive(&self) -> Result<Arc<OpenArchive<S>>> {
        let guard = self
            .archive
            .read()
            .map_err(|_| ProfileError::read_failed(format!("{}: lock poisoned", self.name)))?;
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| ProfileError::Closed(self.name.clone()))
    }
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> DatasetHandle for ZarrDataset<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn select_nearest(&self, query: &PointQuery, tolerance: &Tolerance) -> Result<PointSlice> {
        let archive = self.archive()?;
        let query = query.normalized();

        let (spatial_tol, time_tol) = match query.method {
            SelectionMethod::Nearest => (
                tolerance.spatial_degrees,
                archive.time_units.duration_in_units(tolerance.time),
            ),
            SelectionMethod::Exact => (0.0, 0.0),
        };

        let t_idx = archive
            .time
            .select(archive.time_units.offset_of(query.time), time_tol)
            .map_err(|err| time_not_found(err, &archive, &query, tolerance))?;
        let lat_idx = archive.latitude.select(query.latitude, spatial_tol)?;
        let lon_idx = archive.longitude.select(query.longitude, spatial_tol)?;

        if let Some(requested) = &query.variables {
            if let Some(missing) = requested.iter().find(|v| !archive.variables.contains_key(*v)) {
                return Err(ProfileError::MissingVariable(missing.clone()));
            }
        }

        let mut variables = BTreeMap::new();
        for (name, variable) in &archive.variables {
            if !query.wants(name) {
                continue;
            }
            let values = read_point(variable, t_idx, lat_idx, lon_idx, archive.vertical.as_ref())?;
            variables.insert(name.clone(), Field::new(values, variable.units.clone()));
        }

        let slice = PointSlice {
            latitude: archive.latitude.values()[lat_idx],
            longitude: archive.longitude.values()[lon_idx],
            time: archive.time_units.datetime_at(archive.time.values()[t_idx])?,
            vertical: archive.vertical.clone(),
            variables,
        };

        debug!(
            dataset = %self.name,
            lat = slice.latitude,
            lon = slice.longitude,
            time = %slice.time,
            variables = slice.variables.len(),
            "Selected point slice"
        );

        Ok(slice)
    }

    fn close(&self) -> Result<()> {
        let mut guard = self
            .archive
            .write()
            .map_err(|_| ProfileError::read_failed(format!("{}: lock poisoned", self.name)))?;
        match guard.take() {
            Some(_) => {
                debug!(dataset = %self.name, "Closed Zarr archive");
                Ok(())
            }
            None => Err(ProfileError::Closed(self.name.clone())),
        }
    }
}

/// Re-express a time miss with datetimes instead of encoded offsets.
fn time_not_found<S: ReadableStorageTraits + 'static>(
    err: ProfileError,
    archive: &OpenArchive<S>,
    query: &PointQuery,
    tolerance: &Tolerance,
) -> ProfileError {
    if !err.is_not_found() {
        return err;
    }
    let nearest = archive.time.nearest(archive.time_units.offset_of(query.time));
    let nearest = archive
        .time_units
        .datetime_at(archive.time.values()[nearest])
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|_| "unknown".to_string());
    ProfileError::not_found(
        TIME,
        query.time.to_rfc3339(),
        nearest,
        format!("{}s", tolerance.time.num_seconds()),
    )
}

fn open_array<S: ReadableStorageTraits + 'static>(storage: &Arc<S>, name: &str) -> Result<Array<S>> {
    Array::open(storage.clone(), &format!("/{}", name))
        .map_err(|e| ProfileError::open_failed(format!("array '{}': {}", name, e)))
}

fn string_attr<S: ReadableStorageTraits + 'static>(array: &Array<S>, key: &str) -> Option<String> {
    array
        .attributes()
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Dimension names of a variable: `_ARRAY_DIMENSIONS`, then Zarr v3
/// `dimension_names`, then the ERA5 convention by rank.
fn dimension_names<S: ReadableStorageTraits + 'static>(
    array: &Array<S>,
    vertical_dimension: Option<&str>,
) -> Result<Vec<String>> {
    let rank = array.shape().len();

    let from_attrs: Option<Vec<String>> = array
        .attributes()
        .get("_ARRAY_DIMENSIONS")
        .and_then(|v| v.as_array())
        .map(|dims| {
            dims.iter()
                .filter_map(|d| d.as_str().map(str::to_string))
                .collect()
        });

    let from_metadata: Option<Vec<String>> = array.dimension_names().as_ref().and_then(|names| {
        names
            .iter()
            .map(|n| n.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
    });

    let dims = match from_attrs.or(from_metadata) {
        Some(dims) => dims,
        None => match (rank, vertical_dimension) {
            (4, Some(vertical)) => vec![
                TIME.to_string(),
                vertical.to_string(),
                LATITUDE.to_string(),
                LONGITUDE.to_string(),
            ],
            (3, _) => vec![TIME.to_string(), LATITUDE.to_string(), LONGITUDE.to_string()],
            _ => {
                return Err(ProfileError::invalid_metadata(format!(
                    "cannot infer dimensions of a rank-{} array",
                    rank
                )))
            }
        },
    };

    if dims.len() != rank {
        return Err(ProfileError::invalid_metadata(format!(
            "{} dimension names for a rank-{} array",
            dims.len(),
            rank
        )));
    }
    Ok(dims)
}

/// Read one variable at a point, keeping every vertical level.
fn read_point<S: ReadableStorageTraits + 'static>(
    variable: &VariableArray<S>,
    t_idx: usize,
    lat_idx: usize,
    lon_idx: usize,
    vertical: Option<&VerticalCoordinate>,
) -> Result<Vec<f64>> {
    let mut start = Vec::with_capacity(variable.dims.len());
    let mut shape = Vec::with_capacity(variable.dims.len());

    for dim in &variable.dims {
        let (offset, len) = match dim.as_str() {
            TIME => (t_idx as u64, 1),
            LATITUDE => (lat_idx as u64, 1),
            LONGITUDE => (lon_idx as u64, 1),
            other => match vertical {
                Some(v) if v.name == other => (0, v.values.len() as u64),
                _ => {
                    return Err(ProfileError::invalid_metadata(format!(
                        "unknown dimension '{}'",
                        other
                    )))
                }
            },
        };
        start.push(offset);
        shape.push(len);
    }

    let subset = ArraySubset::new_with_start_shape(start, shape)
        .map_err(|e| ProfileError::read_failed(e.to_string()))?;
    read_subset(&variable.array, &subset)
}

fn read_all<S: ReadableStorageTraits + 'static>(array: &Array<S>) -> Result<Vec<f64>> {
    let subset = ArraySubset::new_with_shape(array.shape().to_vec());
    read_subset(array, &subset)
}

/// Read a subset as f64 whatever the stored numeric type.
fn read_subset<S: ReadableStorageTraits + 'static>(
    array: &Array<S>,
    subset: &ArraySubset,
) -> Result<Vec<f64>> {
    macro_rules! read_as {
        ($t:ty) => {
            array
                .retrieve_array_subset_elements::<$t>(subset)
                .map(|values| values.into_iter().map(|v| v as f64).collect::<Vec<f64>>())
        };
    }

    let values = match array.data_type() {
        DataType::Float32 => read_as!(f32),
        DataType::Float64 => read_as!(f64),
        DataType::Int8 => read_as!(i8),
        DataType::Int16 => read_as!(i16),
        DataType::Int32 => read_as!(i32),
        DataType::Int64 => read_as!(i64),
        DataType::UInt8 => read_as!(u8),
        DataType::UInt16 => read_as!(u16),
        DataType::UInt32 => read_as!(u32),
        DataType::UInt64 => read_as!(u64),
        other => {
            return Err(ProfileError::invalid_metadata(format!(
                "unsupported data type {:?}",
                other
            )))
        }
    };

    values.map_err(|e| ProfileError::read_failed(e.to_string()))
}
