//! Writers for small on-disk Zarr archives shaped like ARCO ERA5.
//!
//! The archives follow the xarray conventions of the public stores:
//! coordinate arrays at the root, `_ARRAY_DIMENSIONS` and `units`
//! attributes on every array, and CF-encoded hourly time.
//!
//! These are test helpers: they panic with a descriptive message if the
//! archive cannot be written.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use zarrs::array::{ArrayBuilder, DataType, Element, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use crate::fixtures::grid::{GridSpec, DENVER_SUBSET};
use crate::fixtures::times::HOURS_SINCE_1900_AT_START;
use crate::generators::{self, ERA5_PRESSURE_LEVELS, GRAVITY};

/// Surface pressure at the first latitude row, in Pa. Each row further south
/// adds 100 Pa.
pub const BASE_SURFACE_PRESSURE_PA: f64 = 83_000.0;

/// Layout of a synthetic archive.
#[derive(Debug, Clone)]
pub struct SyntheticGrid {
    pub grid: GridSpec,
    /// Hours since 1900-01-01.
    pub times: Vec<i64>,
}

impl Default for SyntheticGrid {
    /// Two hourly steps from 2021-01-01T00Z on the Denver subset.
    fn default() -> Self {
        Self {
            grid: DENVER_SUBSET,
            times: vec![HOURS_SINCE_1900_AT_START, HOURS_SINCE_1900_AT_START + 1],
        }
    }
}

impl SyntheticGrid {
    /// Surface pressure (Pa) written at a latitude row.
    pub fn surface_pressure(&self, lat_index: usize) -> f64 {
        BASE_SURFACE_PRESSURE_PA + 100.0 * lat_index as f64
    }

    /// Index of a latitude in the grid, if present.
    pub fn lat_index(&self, lat: f64) -> Option<usize> {
        self.grid.latitudes().iter().position(|l| (l - lat).abs() < 1e-9)
    }

    /// Index of a longitude (in [0, 360)) in the grid, if present.
    pub fn lon_index(&self, lon: f64) -> Option<usize> {
        self.grid.longitudes().iter().position(|l| (l - lon).abs() < 1e-9)
    }

    /// Small spatial and temporal perturbation so every column differs.
    fn perturbation(&self, t: usize, y: usize, x: usize) -> f64 {
        0.5 * t as f64 + 0.1 * y as f64 + 0.01 * x as f64
    }

    fn dims(&self) -> (u64, u64, u64) {
        (
            self.times.len() as u64,
            self.grid.height as u64,
            self.grid.width as u64,
        )
    }
}

/// Write an array and its data.
#[allow(clippy::too_many_arguments)]
fn write_array<T: Element>(
    store: &Arc<FilesystemStore>,
    name: &str,
    shape: Vec<u64>,
    chunks: Vec<u64>,
    data_type: DataType,
    fill_value: FillValue,
    data: &[T],
    attrs: serde_json::Value,
) {
    let chunk_grid: zarrs::array::ChunkGrid = chunks
        .try_into()
        .unwrap_or_else(|e| panic!("invalid chunk shape for {name}: {e:?}"));

    let mut builder = ArrayBuilder::new(shape.clone(), data_type, chunk_grid, fill_value);
    if let serde_json::Value::Object(map) = attrs {
        builder.attributes(map);
    }

    let array = builder
        .build(store.clone(), &format!("/{}", name))
        .unwrap_or_else(|e| panic!("failed to build array {name}: {e}"));
    array
        .store_metadata()
        .unwrap_or_else(|e| panic!("failed to store metadata for {name}: {e}"));
    array
        .store_array_subset_elements(&ArraySubset::new_with_shape(shape), data)
        .unwrap_or_else(|e| panic!("failed to write {name}: {e}"));
}

fn open_store(dir: &Path) -> Arc<FilesystemStore> {
    std::fs::create_dir_all(dir)
        .unwrap_or_else(|e| panic!("failed to create {}: {e}", dir.display()));
    Arc::new(
        FilesystemStore::new(dir)
            .unwrap_or_else(|e| panic!("failed to open store {}: {e}", dir.display())),
    )
}

/// Write the root group metadata and coordinate arrays shared by both archives.
fn write_coordinates(store: &Arc<FilesystemStore>, layout: &SyntheticGrid) {
    let (nt, ny, nx) = layout.dims();

    let group = zarrs::group::GroupBuilder::new()
        .build(store.clone(), "/")
        .unwrap_or_else(|e| panic!("failed to create root group: {e}"));
    group
        .store_metadata()
        .unwrap_or_else(|e| panic!("failed to write root group: {e}"));

    write_array(
        store,
        "time",
        vec![nt],
        vec![nt],
        DataType::Int64,
        FillValue::from(0i64),
        &layout.times,
        json!({
            "_ARRAY_DIMENSIONS": ["time"],
            "units": "hours since 1900-01-01",
            "calendar": "proleptic_gregorian"
        }),
    );

    let latitudes: Vec<f32> = layout.grid.latitudes().iter().map(|v| *v as f32).collect();
    write_array(
        store,
        "latitude",
        vec![ny],
        vec![ny],
        DataType::Float32,
        FillValue::from(f32::NAN),
        &latitudes,
        json!({"_ARRAY_DIMENSIONS": ["latitude"], "units": "degrees_north"}),
    );

    let longitudes: Vec<f32> = layout.grid.longitudes().iter().map(|v| *v as f32).collect();
    write_array(
        store,
        "longitude",
        vec![nx],
        vec![nx],
        DataType::Float32,
        FillValue::from(f32::NAN),
        &longitudes,
        json!({"_ARRAY_DIMENSIONS": ["longitude"], "units": "degrees_east"}),
    );
}

/// Fill a (time, level, latitude, longitude) cube from a per-level profile.
fn level_cube(layout: &SyntheticGrid, profile: &[f64], scale_perturbation: f64) -> Vec<f32> {
    let (nt, ny, nx) = layout.dims();
    let mut data = Vec::with_capacity(nt as usize * profile.len() * (ny * nx) as usize);
    for t in 0..nt as usize {
        for value in profile {
            for y in 0..ny as usize {
                for x in 0..nx as usize {
                    data.push((value + scale_perturbation * layout.perturbation(t, y, x)) as f32);
                }
            }
        }
    }
    data
}

/// Fill a (time, latitude, longitude) field.
fn surface_field(layout: &SyntheticGrid, f: impl Fn(usize, usize, usize) -> f64) -> Vec<f32> {
    let (nt, ny, nx) = layout.dims();
    let mut data = Vec::with_capacity((nt * ny * nx) as usize);
    for t in 0..nt as usize {
        for y in 0..ny as usize {
            for x in 0..nx as usize {
                data.push(f(t, y, x) as f32);
            }
        }
    }
    data
}

fn write_level_variables(
    store: &Arc<FilesystemStore>,
    layout: &SyntheticGrid,
    vertical: &str,
    levels_hpa: &[f64],
) {
    let (nt, ny, nx) = layout.dims();
    let nz = levels_hpa.len() as u64;
    let shape = vec![nt, nz, ny, nx];
    let chunks = vec![1, nz, ny, nx];
    let dims = json!(["time", vertical, "latitude", "longitude"]);
    let sounding = generators::standard_sounding(levels_hpa);

    let variables: [(&str, &[f64], f64, &str); 6] = [
        ("geopotential", &sounding.geopotential, GRAVITY, "m**2 s**-2"),
        ("temperature", &sounding.temperature, 1.0, "K"),
        ("specific_humidity", &sounding.specific_humidity, 0.0, "kg kg**-1"),
        ("u_component_of_wind", &sounding.u_wind, 1.0, "m s**-1"),
        ("v_component_of_wind", &sounding.v_wind, 1.0, "m s**-1"),
        ("vertical_velocity", &sounding.omega, 0.0, "Pa s**-1"),
    ];

    for (name, profile, scale, units) in variables {
        write_array(
            store,
            name,
            shape.clone(),
            chunks.clone(),
            DataType::Float32,
            FillValue::from(f32::NAN),
            &level_cube(layout, profile, scale),
            json!({"_ARRAY_DIMENSIONS": dims, "units": units}),
        );
    }
}

/// Write a pressure-level archive with the 37 ERA5 levels.
///
/// Level variables follow the standard atmosphere; surface pressure is
/// [`BASE_SURFACE_PRESSURE_PA`] plus 100 Pa per latitude row.
pub fn write_isobaric_archive(dir: &Path, layout: &SyntheticGrid) {
    let store = open_store(dir);
    write_coordinates(&store, layout);

    let levels: Vec<i64> = ERA5_PRESSURE_LEVELS.iter().map(|p| *p as i64).collect();
    write_array(
        &store,
        "level",
        vec![levels.len() as u64],
        vec![levels.len() as u64],
        DataType::Int64,
        FillValue::from(0i64),
        &levels,
        json!({"_ARRAY_DIMENSIONS": ["level"], "units": "millibars", "long_name": "pressure_level"}),
    );

    write_level_variables(&store, layout, "level", &ERA5_PRESSURE_LEVELS);

    let (nt, ny, nx) = layout.dims();
    let shape = vec![nt, ny, nx];
    let chunks = vec![1, ny, nx];
    let dims = json!(["time", "latitude", "longitude"]);

    let surface: [(&str, Vec<f32>, &str); 5] = [
        (
            "surface_pressure",
            surface_field(layout, |_, y, _| layout.surface_pressure(y)),
            "Pa",
        ),
        (
            "2m_temperature",
            surface_field(layout, |t, y, x| {
                generators::isa_temperature(layout.surface_pressure(y) / 100.0) - 1.0
                    + layout.perturbation(t, y, x)
            }),
            "K",
        ),
        (
            "2m_dewpoint_temperature",
            surface_field(layout, |t, y, x| {
                generators::isa_temperature(layout.surface_pressure(y) / 100.0) - 9.0
                    + layout.perturbation(t, y, x)
            }),
            "K",
        ),
        ("10m_u_component_of_wind", surface_field(layout, |_, _, _| 1.5), "m s**-1"),
        ("10m_v_component_of_wind", surface_field(layout, |_, _, _| -0.5), "m s**-1"),
    ];

    for (name, data, units) in surface {
        write_array(
            &store,
            name,
            shape.clone(),
            chunks.clone(),
            DataType::Float32,
            FillValue::from(f32::NAN),
            &data,
            json!({"_ARRAY_DIMENSIONS": dims, "units": units}),
        );
    }
}

/// Write a hybrid-level archive.
///
/// `level_pressures_hpa` gives the pressure of hybrid levels `1..=n`, top
/// first; it only shapes the synthetic fields.
pub fn write_native_archive(dir: &Path, layout: &SyntheticGrid, level_pressures_hpa: &[f64]) {
    let store = open_store(dir);
    write_coordinates(&store, layout);

    let hybrid: Vec<f64> = (1..=level_pressures_hpa.len()).map(|k| k as f64).collect();
    write_array(
        &store,
        "hybrid",
        vec![hybrid.len() as u64],
        vec![hybrid.len() as u64],
        DataType::Float64,
        FillValue::from(f64::NAN),
        &hybrid,
        json!({"_ARRAY_DIMENSIONS": ["hybrid"], "long_name": "hybrid level at layer midpoints"}),
    );

    write_level_variables(&store, layout, "hybrid", level_pressures_hpa);
}
