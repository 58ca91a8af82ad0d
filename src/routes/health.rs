use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::pipeline::WeatherPipeline;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok", or "degraded" when no station metadata is loaded)
    pub status: String,
    /// API version
    pub version: String,
    /// Number of stations in the metadata snapshot
    pub stations_loaded: usize,
}

/// Health check endpoint.
///
/// Returns status "degraded" (still 200) when the station snapshot is empty,
/// since historical lookups cannot succeed without it.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_check(State(pipeline): State<WeatherPipeline>) -> Json<HealthResponse> {
    let stations_loaded = pipeline.catalog().len();

    Json(HealthResponse {
        status: if stations_loaded > 0 {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        stations_loaded,
    })
}
