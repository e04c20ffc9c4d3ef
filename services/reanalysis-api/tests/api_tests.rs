//! Router tests over synthetic local archives.

use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use reanalysis_api::{router, state::AppState};
use reanalysis_profile::{
    open_archive, ArchiveConfig, DatasetHandlePool, LookupConfig, VerticalCoefficientTable,
};
use serde_json::Value;
use tempfile::TempDir;
use test_utils::{write_isobaric_archive, write_native_archive, SyntheticGrid};
use tower::ServiceExt;

struct Fixture {
    state: Arc<AppState>,
    _isobaric: TempDir,
    _native: TempDir,
}

fn pool(archive: ArchiveConfig, dir: &Path) -> DatasetHandlePool {
    let archive = ArchiveConfig {
        url: dir.to_string_lossy().into_owned(),
        pool_size: 2,
        ..archive
    };
    DatasetHandlePool::initialize(&archive.name, archive.pool_size, |_| open_archive(&archive))
        .unwrap()
}

fn fixture() -> Fixture {
    fixture_with_isobaric(SyntheticGrid::default())
}

/// Native archive on the default grid; the pressure-level archive on `isobaric`.
fn fixture_with_isobaric(isobaric: SyntheticGrid) -> Fixture {
    let grid = SyntheticGrid::default();
    let table = VerticalCoefficientTable::embedded().unwrap();
    let level_pressures: Vec<f64> = table
        .half_level_pressures(grid.surface_pressure(0))
        .iter()
        .map(|p| p / 100.0)
        .collect();

    let isobaric_dir = tempfile::tempdir().unwrap();
    let native_dir = tempfile::tempdir().unwrap();
    write_isobaric_archive(isobaric_dir.path(), &isobaric);
    write_native_archive(native_dir.path(), &grid, &level_pressures);

    let state = AppState::from_parts(
        pool(ArchiveConfig::era5_isobaric(), isobaric_dir.path()),
        pool(ArchiveConfig::era5_native(), native_dir.path()),
        Arc::new(table),
        LookupConfig::default(),
        None,
    );

    Fixture {
        state: Arc::new(state),
        _isobaric: isobaric_dir,
        _native: native_dir,
    }
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn column(body: &Value, field: &str) -> Vec<Value> {
    body["data"][field].as_array().unwrap().clone()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_isobaric_profile_response() {
    let fixture = fixture();
    let (status, body) = get(
        router(fixture.state.clone()),
        "/era5/isobaric?t=2021-01-01T00:00:00Z&lat=40.0&lon=-105.0",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lat"], 40.0);
    assert_eq!(body["lon"], 255.0);
    assert_eq!(body["timestamp"], "2021-01-01T00:00:00Z");
    assert_eq!(body["units"]["pressure"], "hPa");
    assert_eq!(body["units"]["height"], "m");

    let len = column(&body, "pressure").len();
    assert!(len > 1);
    for field in [
        "height",
        "temperature",
        "dewpoint",
        "u_wind",
        "v_wind",
        "omega",
    ] {
        assert_eq!(column(&body, field).len(), len, "{field}");
    }

    let surface = body["data"]["pressure"][0].as_f64().unwrap();
    assert!((600.0..=1050.0).contains(&surface));
    assert_eq!(body["data"]["height"][0], 0.0);
    assert!(body["data"]["omega"][0].is_null());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_longitude_forms_return_same_body() {
    let fixture = fixture();
    let (_, west) = get(
        router(fixture.state.clone()),
        "/era5/isobaric?t=2021-01-01T01:00:00Z&lat=40.25&lon=-105.0",
    )
    .await;
    let (_, east) = get(
        router(fixture.state.clone()),
        "/era5/isobaric?t=2021-01-01T01:00:00Z&lat=40.25&lon=255.0",
    )
    .await;
    assert_eq!(west, east);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_native_profile_response() {
    let fixture = fixture();
    let (status, body) = get(
        router(fixture.state.clone()),
        "/era5/native?t=2021-01-01T00:00:00Z&lat=41.0&lon=255.0",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let pressure: Vec<f64> = column(&body, "pressure")
        .iter()
        .map(|p| p.as_f64().unwrap())
        .collect();
    assert_eq!(pressure.len(), fixture.state.vertical_table.model_levels());
    assert!(pressure.windows(2).all(|w| w[0] > w[1]));
    assert!((pressure[0] - 830.0).abs() < 1e-6);
    assert!(column(&body, "omega").iter().all(|w| !w.is_null()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_out_of_coverage_is_404() {
    let fixture = fixture();

    let (status, body) = get(
        router(fixture.state.clone()),
        "/era5/isobaric?t=1850-06-01T00:00:00Z&lat=89.999&lon=0",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert!(body["detail"].as_str().unwrap().contains("time"));

    let (status, _) = get(
        router(fixture.state.clone()),
        "/era5/native?t=2021-01-01T00:00:00Z&lat=10.0&lon=255.0",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_native_404_when_surface_pressure_is_missing() {
    let mut isobaric = SyntheticGrid::default();
    isobaric.times.truncate(1);
    let fixture = fixture_with_isobaric(isobaric);

    let (status, _) = get(
        router(fixture.state.clone()),
        "/era5/native?t=2021-01-01T00:00:00Z&lat=41.0&lon=255.0",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The native archive has 01Z; only the surface pressure lookup misses.
    let (status, body) = get(
        router(fixture.state.clone()),
        "/era5/native?t=2021-01-01T01:00:00Z&lat=41.0&lon=255.0",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert!(body["detail"].as_str().unwrap().contains("time"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_parameters_are_400() {
    let fixture = fixture();

    for uri in [
        "/era5/isobaric?lat=40&lon=-105",
        "/era5/isobaric?t=2021-01-01T00:00:00Z&lat=95&lon=-105",
        "/era5/native?t=2021-01-01T00:00:00Z&lat=40&lon=400",
        "/era5/native?t=not-a-time&lat=40&lon=-105",
        "/era5/isobaric?t=2021-01-01T00:00:00Z&lat=north&lon=-105",
    ] {
        let (status, body) = get(router(fixture.state.clone()), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["status"], 400, "{uri}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_and_readiness_lifecycle() {
    let fixture = fixture();

    let (status, body) = get(router(fixture.state.clone()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = get(router(fixture.state.clone()), "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["pools"][0]["name"], "era5-isobaric");
    assert_eq!(body["pools"][1]["size"], 2);

    let (status, _) = get(router(fixture.state.clone()), "/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    fixture.state.shutdown();

    let (status, body) = get(router(fixture.state.clone()), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    let (status, _) = get(
        router(fixture.state.clone()),
        "/era5/isobaric?t=2021-01-01T00:00:00Z&lat=40.0&lon=-105.0",
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
