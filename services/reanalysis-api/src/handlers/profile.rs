//! Profile query handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Extension, Query},
    response::{IntoResponse, Response},
    Json,
};
use metrics::{counter, histogram};
use reanalysis_profile::{
    builder::vars, parse_timestamp, surface_pressure, IsobaricProfileBuilder, NativeProfileBuilder,
    PointQuery, Profile,
};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::ApiError;
use crate::state::AppState;

/// Query parameters shared by both profile endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQueryParams {
    /// Time as RFC 3339 / ISO 8601.
    pub t: Option<String>,
    pub lat: Option<String>,
    pub lon: Option<String>,
}

impl ProfileQueryParams {
    /// Validate and convert to a point query.
    pub fn to_query(&self) -> Result<PointQuery, ApiError> {
        let t = required(&self.t, "t")?;
        let time = parse_timestamp(t)
            .map_err(|_| ApiError::bad_request(format!("Invalid datetime for t: {}", t)))?;

        let lat = parse_coordinate(&self.lat, "lat")?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ApiError::bad_request(format!(
                "lat must be within [-90, 90], got {}",
                lat
            )));
        }

        let lon = parse_coordinate(&self.lon, "lon")?;
        if !(-180.0..360.0).contains(&lon) {
            return Err(ApiError::bad_request(format!(
                "lon must be within [-180, 360), got {}",
                lon
            )));
        }

        Ok(PointQuery::new(time, lat, lon))
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::bad_request(format!(
            "Missing required parameter: {}",
            name
        ))),
    }
}

fn parse_coordinate(value: &Option<String>, name: &str) -> Result<f64, ApiError> {
    let raw = required(value, name)?;
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::bad_request(format!("Invalid number for {}: {}", name, raw)))
}

/// GET /era5/isobaric
pub async fn isobaric_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ProfileQueryParams>,
) -> Response {
    let start = Instant::now();
    let result = isobaric_profile(&state, &params).await;
    respond("isobaric", start, result)
}

/// GET /era5/native
pub async fn native_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ProfileQueryParams>,
) -> Response {
    let start = Instant::now();
    let result = native_profile(&state, &params).await;
    respond("native", start, result)
}

async fn isobaric_profile(state: &AppState, params: &ProfileQueryParams) -> Result<Profile, ApiError> {
    let query = params.to_query()?;
    let slice = state
        .isobaric
        .lookup(query, state.lookup.tolerance(), state.lookup.timeout())
        .await?;
    Ok(IsobaricProfileBuilder::new().build(&slice)?)
}

/// Surface pressure comes from the pressure-level archive at the same point;
/// both lookups run concurrently.
async fn native_profile(state: &AppState, params: &ProfileQueryParams) -> Result<Profile, ApiError> {
    let query = params.to_query()?;
    let tolerance = state.lookup.tolerance();
    let timeout = state.lookup.timeout();

    let surface_query = query.clone().with_variables([vars::SURFACE_PRESSURE]);
    let (surface_slice, slice) = tokio::try_join!(
        state.isobaric.lookup(surface_query, tolerance, timeout),
        state.native.lookup(query, tolerance, timeout),
    )?;

    let sp = surface_pressure(&surface_slice)?;
    debug!(surface_pa = sp.value, "Resolved surface pressure");

    Ok(NativeProfileBuilder::new(&state.vertical_table).build(&slice, &sp)?)
}

fn respond(endpoint: &'static str, start: Instant, result: Result<Profile, ApiError>) -> Response {
    let response = match result {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                error!(endpoint, status = status.as_u16(), error = %err, "Profile request failed");
            } else {
                info!(endpoint, status = status.as_u16(), error = %err, "Profile request rejected");
            }
            err.into_response()
        }
    };

    let elapsed = start.elapsed().as_secs_f64();
    counter!(
        "profile_requests_total",
        "endpoint" => endpoint,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    histogram!("profile_request_duration_seconds", "endpoint" => endpoint).record(elapsed);

    response
}
