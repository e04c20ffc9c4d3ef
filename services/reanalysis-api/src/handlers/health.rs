//! Health, readiness and metrics handlers.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reanalysis_profile::DatasetHandlePool;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct PoolStatus {
    pub name: String,
    pub size: usize,
    pub closed: bool,
    /// Lookup slots currently free.
    pub available_permits: usize,
}

impl From<&DatasetHandlePool> for PoolStatus {
    fn from(pool: &DatasetHandlePool) -> Self {
        Self {
            name: pool.name().to_string(),
            size: pool.size(),
            closed: pool.is_closed(),
            available_permits: pool.available_permits(),
        }
    }
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub pools: Vec<PoolStatus>,
    pub model_levels: usize,
}

/// GET /health - Basic health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /ready - Readiness check (both pools open)
pub async fn ready_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let response = ReadyResponse {
        ready: state.is_ready(),
        pools: vec![
            PoolStatus::from(&state.isobaric),
            PoolStatus::from(&state.native),
        ],
        model_levels: state.vertical_table.model_levels(),
    };

    let status = if response.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response)).into_response()
}

/// GET /metrics - Prometheus metrics
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics recorder not installed",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler() {
        let response = health_handler().await;
        assert_eq!(response.status, "ok");
    }
}
