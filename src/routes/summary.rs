//! Summary JSON endpoint.
//!
//! - POST /api/v1/summary  `{ "city": "...", "date": "YYYY-MM-DD" }`

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{AppError, ErrorResponse};
use crate::models::{Coordinates, ObservationRecord};
use crate::services::period::DataPeriod;
use crate::services::pipeline::{RequestContext, WeatherPipeline};
use crate::services::stations::StationSelection;
use crate::services::summarize::TemperatureDigest;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SummaryRequest {
    /// City name, e.g. "Stockholm"
    pub city: String,
    /// Calendar date in ISO format, e.g. "2024-01-15"
    pub date: String,
}

/// Weather summary for one city and date.
#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    pub request_id: Uuid,
    /// City as submitted
    pub city_input: String,
    /// City used for the lookup (after typo correction)
    pub city: String,
    /// Present when the city name was corrected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub date: String,
    pub coordinates: Option<Coordinates>,
    /// Data product used: forecast, recent_historical or corrected_archive
    pub period: Option<DataPeriod>,
    /// Station used for historical data (also reported for forecasts when one is nearby)
    pub station: Option<StationSelection>,
    /// Upstream URL the readings were requested from
    pub source_url: Option<String>,
    /// Whether any readings were found for the date
    pub data_available: bool,
    pub observations: Vec<ObservationRecord>,
    pub digest: Option<TemperatureDigest>,
    pub summary: Option<String>,
    /// User-facing reason when no summary could be produced
    pub error: Option<String>,
}

impl From<RequestContext> for SummaryResponse {
    fn from(ctx: RequestContext) -> Self {
        Self {
            request_id: ctx.request_id,
            city_input: ctx.city_input,
            city: ctx.city,
            notice: ctx.notice,
            date: ctx
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or(ctx.date_input),
            coordinates: ctx.coordinates,
            period: ctx.period,
            station: ctx.station,
            source_url: ctx.source_url,
            data_available: ctx.digest.is_some(),
            observations: ctx.observations,
            digest: ctx.digest,
            summary: ctx.summary,
            error: ctx.error.map(|e| e.to_string()),
        }
    }
}

/// Summarize the weather for a city on a date.
///
/// "No result" outcomes (unknown city, no station, no data) are reported with
/// status 200 and a populated `error`; only malformed input is a 400.
#[utoipa::path(
    post,
    path = "/api/v1/summary",
    tag = "Summary",
    request_body = SummaryRequest,
    responses(
        (status = 200, description = "Summary or user-facing reason for its absence", body = SummaryResponse),
        (status = 400, description = "Missing city or malformed date", body = ErrorResponse),
    )
)]
pub async fn post_summary(
    State(pipeline): State<WeatherPipeline>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, AppError> {
    let ctx = pipeline.run(&request.city, &request.date).await;

    if let Some(err) = ctx.error.as_ref().filter(|e| e.is_input_error()) {
        return Err(AppError::BadRequest(err.to_string()));
    }

    Ok(Json(SummaryResponse::from(ctx)))
}
