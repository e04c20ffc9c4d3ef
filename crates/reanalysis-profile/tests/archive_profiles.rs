//! End-to-end profile assembly over synthetic on-disk archives.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reanalysis_profile::{
    open_archive, parse_timestamp, surface_pressure, ArchiveConfig, DatasetHandle,
    DatasetHandlePool, IsobaricProfileBuilder, LookupConfig, NativeProfileBuilder, PointQuery,
    ProfileError, SelectionMethod, VerticalCoefficientTable,
};
use test_utils::{
    assert_approx_eq, points, temp_archive_dir, times, write_isobaric_archive,
    write_native_archive, SyntheticGrid, ERA5_PRESSURE_LEVELS,
};

fn isobaric_config(dir: &Path) -> ArchiveConfig {
    ArchiveConfig {
        url: dir.to_string_lossy().into_owned(),
        ..ArchiveConfig::era5_isobaric()
    }
}

fn native_config(dir: &Path) -> ArchiveConfig {
    ArchiveConfig {
        url: dir.to_string_lossy().into_owned(),
        ..ArchiveConfig::era5_native()
    }
}

fn query(time: &str, (lat, lon): (f64, f64)) -> PointQuery {
    PointQuery::new(parse_timestamp(time).unwrap(), lat, lon)
}

fn isobaric_pool(dir: &Path, size: usize) -> DatasetHandlePool {
    let config = isobaric_config(dir);
    DatasetHandlePool::initialize(&config.name, size, |_| open_archive(&config)).unwrap()
}

#[test]
fn test_isobaric_profile_at_denver() {
    let dir = temp_archive_dir("isobaric_");
    let grid = SyntheticGrid::default();
    write_isobaric_archive(dir.path(), &grid);

    let handle = open_archive(&isobaric_config(dir.path())).unwrap();
    let lookup = LookupConfig::default();
    let slice = handle
        .select_nearest(&query(times::ARCHIVE_START, points::DENVER), &lookup.tolerance())
        .unwrap();
    let profile = IsobaricProfileBuilder::new().build(&slice).unwrap();

    assert_eq!(profile.lat, 40.0);
    assert_eq!(profile.lon, 255.0);
    assert_eq!(profile.timestamp.to_rfc3339(), "2021-01-01T00:00:00+00:00");

    // 834 hPa at this row; only levels strictly above ground survive.
    let surface_hpa = grid.surface_pressure(grid.lat_index(40.0).unwrap()) / 100.0;
    let above_ground = ERA5_PRESSURE_LEVELS.iter().filter(|p| **p < surface_hpa).count();
    assert_eq!(profile.data.len(), above_ground + 1);
    assert_eq!(profile.data.pressure[0], Some(surface_hpa));
    assert_eq!(profile.data.pressure[1], Some(825.0));
    assert_eq!(profile.data.pressure.last(), Some(&Some(1.0)));

    let pressure: Vec<f64> = profile.data.pressure.iter().map(|p| p.unwrap()).collect();
    assert!(pressure.windows(2).all(|w| w[0] > w[1]));

    assert_eq!(profile.data.height[0], Some(0.0));
    let heights: Vec<f64> = profile.data.height.iter().map(|h| h.unwrap()).collect();
    assert!(heights.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(profile.data.omega[0], None);
    assert!(profile.data.omega[1..].iter().all(Option::is_some));

    for (t, td) in profile.data.temperature.iter().zip(&profile.data.dewpoint) {
        assert!(td.unwrap() <= t.unwrap());
    }

    assert_eq!(profile.units.pressure, "hPa");
    assert_eq!(profile.units.height, "m");
    assert_eq!(profile.units.temperature, "K");
    assert_eq!(profile.units.dewpoint, "K");
    assert_eq!(profile.units.u_wind, "m s**-1");
    assert_eq!(profile.units.omega, "Pa s**-1");

    handle.close().unwrap();
}

#[test]
fn test_longitude_forms_give_identical_profiles() {
    let dir = temp_archive_dir("isobaric_lon_");
    write_isobaric_archive(dir.path(), &SyntheticGrid::default());

    let handle = open_archive(&isobaric_config(dir.path())).unwrap();
    let tolerance = LookupConfig::default().tolerance();
    let builder = IsobaricProfileBuilder::new();

    let west = handle
        .select_nearest(&query(times::ARCHIVE_START, points::DENVER), &tolerance)
        .unwrap();
    let east = handle
        .select_nearest(&query(times::ARCHIVE_START, points::DENVER_EAST), &tolerance)
        .unwrap();

    assert_eq!(builder.build(&west).unwrap(), builder.build(&east).unwrap());
}

#[test]
fn test_nearest_selection_within_tolerance() {
    let dir = temp_archive_dir("isobaric_near_");
    write_isobaric_archive(dir.path(), &SyntheticGrid::default());

    let handle = open_archive(&isobaric_config(dir.path())).unwrap();
    let tolerance = LookupConfig::default().tolerance();

    let slice = handle
        .select_nearest(&query(times::NEAR_START, points::DENVER_OFFSET), &tolerance)
        .unwrap();
    assert_eq!(slice.latitude, 40.0);
    assert_eq!(slice.longitude, 255.0);
    assert_eq!(slice.time, parse_timestamp(times::ARCHIVE_START).unwrap());

    let exact = query(times::NEAR_START, points::DENVER).with_method(SelectionMethod::Exact);
    let err = handle.select_nearest(&exact, &tolerance).unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[test]
fn test_out_of_coverage_is_not_found() {
    let dir = temp_archive_dir("isobaric_nf_");
    write_isobaric_archive(dir.path(), &SyntheticGrid::default());

    let handle = open_archive(&isobaric_config(dir.path())).unwrap();
    let tolerance = LookupConfig::default().tolerance();

    let err = handle
        .select_nearest(&query(times::ARCHIVE_START, points::NEAR_POLE), &tolerance)
        .unwrap_err();
    match &err {
        ProfileError::NotFound { axis, .. } => assert_eq!(axis, "latitude"),
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(err.status_code(), 404);

    let err = handle
        .select_nearest(&query(times::OUTSIDE_COVERAGE, points::DENVER), &tolerance)
        .unwrap_err();
    match &err {
        ProfileError::NotFound { axis, nearest, .. } => {
            assert_eq!(axis, "time");
            assert_eq!(nearest, "2021-01-01T00:00:00+00:00");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_variable_subset_and_missing_variable() {
    let dir = temp_archive_dir("isobaric_vars_");
    write_isobaric_archive(dir.path(), &SyntheticGrid::default());

    let handle = open_archive(&isobaric_config(dir.path())).unwrap();
    let tolerance = LookupConfig::default().tolerance();

    let slice = handle
        .select_nearest(
            &query(times::ARCHIVE_SECOND_STEP, points::DENVER).with_variables(["surface_pressure"]),
            &tolerance,
        )
        .unwrap();
    assert_eq!(slice.variables.len(), 1);
    assert_eq!(surface_pressure(&slice).unwrap().value, 83_400.0);

    let err = handle
        .select_nearest(
            &query(times::ARCHIVE_START, points::DENVER).with_variables(["cloud_cover"]),
            &tolerance,
        )
        .unwrap_err();
    assert!(matches!(err, ProfileError::MissingVariable(ref v) if v == "cloud_cover"));
}

#[test]
fn test_missing_archive_fails_to_open() {
    let dir = temp_archive_dir("missing_");
    let config = isobaric_config(&dir.path().join("absent.zarr"));

    let err = DatasetHandlePool::initialize(&config.name, 3, |_| open_archive(&config)).unwrap_err();
    match err {
        ProfileError::StartupFailure { opened, requested, .. } => {
            assert_eq!(opened, 0);
            assert_eq!(requested, 3);
        }
        other => panic!("expected StartupFailure, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pool_lookups_over_local_archive() {
    let dir = temp_archive_dir("isobaric_pool_");
    write_isobaric_archive(dir.path(), &SyntheticGrid::default());

    let pool = Arc::new(isobaric_pool(dir.path(), 3));
    let lookup = LookupConfig::default();

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let pool = Arc::clone(&pool);
        let lookup = lookup.clone();
        tasks.push(tokio::spawn(async move {
            pool.lookup(
                query(times::ARCHIVE_START, points::DENVER),
                lookup.tolerance(),
                lookup.timeout(),
            )
            .await
        }));
    }

    let builder = IsobaricProfileBuilder::new();
    let mut profiles = Vec::new();
    for task in tasks {
        let slice = task.await.unwrap().unwrap();
        profiles.push(builder.build(&slice).unwrap());
    }
    assert!(profiles.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(pool.available_permits(), lookup.max_concurrent_lookups);

    pool.close_all().unwrap();
    let err = pool
        .lookup(
            query(times::ARCHIVE_START, points::DENVER),
            lookup.tolerance(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProfileError::Closed(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_native_profile_with_isobaric_surface_pressure() {
    let table = VerticalCoefficientTable::embedded().unwrap();
    let grid = SyntheticGrid::default();

    // Row 0 of the grid (41N) carries 830 hPa at the surface.
    let location = (41.0, -105.0);
    let surface_pa = grid.surface_pressure(0);
    let level_pressures: Vec<f64> = table
        .half_level_pressures(surface_pa)
        .iter()
        .map(|p| p / 100.0)
        .collect();

    let isobaric_dir = temp_archive_dir("isobaric_sp_");
    let native_dir = temp_archive_dir("native_");
    write_isobaric_archive(isobaric_dir.path(), &grid);
    write_native_archive(native_dir.path(), &grid, &level_pressures);

    let isobaric = isobaric_pool(isobaric_dir.path(), 2);
    let native_config = native_config(native_dir.path());
    let native =
        DatasetHandlePool::initialize(&native_config.name, 2, |_| open_archive(&native_config))
            .unwrap();

    let lookup = LookupConfig::default();
    let sp_query = query(times::ARCHIVE_START, location).with_variables(["surface_pressure"]);
    let (sp_slice, native_slice) = tokio::try_join!(
        isobaric.lookup(sp_query, lookup.tolerance(), lookup.timeout()),
        native.lookup(
            query(times::ARCHIVE_START, location),
            lookup.tolerance(),
            lookup.timeout()
        ),
    )
    .unwrap();

    let sp = surface_pressure(&sp_slice).unwrap();
    assert_eq!(sp.value, surface_pa);

    let profile = NativeProfileBuilder::new(&table)
        .build(&native_slice, &sp)
        .unwrap();

    assert_eq!(profile.data.len(), table.model_levels());
    assert_eq!(profile.lat, 41.0);
    assert_eq!(profile.lon, 255.0);
    assert_approx_eq!(profile.data.pressure[0].unwrap(), 830.0, 1e-9);

    let pressure: Vec<f64> = profile.data.pressure.iter().map(|p| p.unwrap()).collect();
    assert!(pressure.windows(2).all(|w| w[0] > w[1]));
    assert!(*pressure.last().unwrap() < 1.0);

    // No surface entry is prepended on model levels.
    assert!(profile.data.height[0].unwrap() > 0.0);
    assert!(profile.data.omega.iter().all(Option::is_some));

    isobaric.close_all().unwrap();
    native.close_all().unwrap();
}
