//! GET /api/v1/stations: the station metadata snapshot loaded at startup.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::StationRecord;
use crate::services::pipeline::WeatherPipeline;

#[derive(Debug, Serialize, ToSchema)]
pub struct StationListResponse {
    pub count: usize,
    /// When the snapshot was loaded
    pub loaded_at: DateTime<Utc>,
    pub stations: Vec<StationRecord>,
}

/// List the stations in the metadata snapshot.
#[utoipa::path(
    get,
    path = "/api/v1/stations",
    tag = "Stations",
    responses(
        (status = 200, description = "Loaded station metadata", body = StationListResponse),
    )
)]
pub async fn list_stations(State(pipeline): State<WeatherPipeline>) -> Json<StationListResponse> {
    let catalog = pipeline.catalog();
    Json(StationListResponse {
        count: catalog.len(),
        loaded_at: catalog.loaded_at(),
        stations: catalog.stations().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geocode::GeocodingClient;
    use crate::services::smhi::SmhiClient;
    use crate::services::stations::StationCatalog;
    use crate::services::summarize::SummaryClient;
    use std::sync::Arc;

    fn station(id: &str, name: &str) -> StationRecord {
        StationRecord {
            id: id.to_string(),
            name: name.to_string(),
            latitude: 59.34,
            longitude: 18.05,
            last_updated: None,
        }
    }

    fn pipeline_with(catalog: StationCatalog) -> WeatherPipeline {
        let uri = "http://127.0.0.1:9";
        WeatherPipeline::new(
            Arc::new(catalog),
            GeocodingClient::new(uri, None, "ua").unwrap(),
            SmhiClient::new(uri, uri, "ua").unwrap(),
            SummaryClient::new(uri, None, "m", "ua").unwrap(),
            chrono_tz::UTC,
        )
    }

    #[tokio::test]
    async fn test_lists_snapshot_in_order() {
        let catalog = StationCatalog::new(vec![
            station("98210", "Stockholm"),
            station("97510", "Uppsala Aut"),
        ]);
        let loaded_at = catalog.loaded_at();

        let Json(response) = list_stations(State(pipeline_with(catalog))).await;
        assert_eq!(response.count, 2);
        assert_eq!(response.loaded_at, loaded_at);
        let ids: Vec<&str> = response.stations.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["98210", "97510"]);
    }

    #[tokio::test]
    async fn test_empty_snapshot() {
        let Json(response) = list_stations(State(pipeline_with(StationCatalog::empty()))).await;
        assert_eq!(response.count, 0);
        assert!(response.stations.is_empty());
    }
}
