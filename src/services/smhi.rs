//! SMHI open data client.
//!
//! Station metadata and historical observations come from the metobs API,
//! point forecasts from the pmp3g forecast API. Only air temperature
//! (metobs parameter 1, forecast parameter `t`) is used.
//! See: https://opendata.smhi.se/apidocs/metobs/ and https://opendata.smhi.se/apidocs/metfcst/

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use csv::StringRecord;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;
use crate::helpers::normalize_timestamp;
use crate::models::{Coordinates, ObservationRecord, StationRecord};
use crate::services::period::{local_date, DataPeriod, DayWindow};

/// metobs parameter id for hourly air temperature.
const TEMPERATURE_PARAMETER: u32 = 1;

/// Forecast parameter name for air temperature at 2 m.
const FORECAST_TEMPERATURE: &str = "t";

/// Client for the SMHI observation and forecast APIs.
#[derive(Debug, Clone)]
pub struct SmhiClient {
    client: reqwest::Client,
    observations_base_url: String,
    forecast_base_url: String,
}

/// Result of a weather fetch. Failures of any kind produce an empty list; the
/// attempted URL is always reported.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub observations: Vec<ObservationRecord>,
    pub url: String,
}

impl FetchOutcome {
    fn empty(url: String) -> Self {
        Self {
            observations: Vec::new(),
            url,
        }
    }
}

// --- SMHI JSON response types ---

#[derive(Debug, Deserialize)]
struct StationListResponse {
    #[serde(default)]
    station: Vec<RawStation>,
}

#[derive(Debug, Deserialize)]
struct RawStation {
    key: Value,
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    updated: Value,
}

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    #[serde(default)]
    value: Option<Vec<RawObservation>>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: Value,
    #[serde(default)]
    value: Value,
    quality: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastResponse {
    time_series: Vec<ForecastEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForecastEntry {
    valid_time: String,
    #[serde(default)]
    parameters: Vec<ForecastParameter>,
}

#[derive(Debug, Deserialize)]
struct ForecastParameter {
    name: String,
    #[serde(default)]
    values: Vec<Value>,
}

impl SmhiClient {
    pub fn new(
        observations_base_url: &str,
        forecast_base_url: &str,
        user_agent: &str,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            observations_base_url: observations_base_url.trim_end_matches('/').to_string(),
            forecast_base_url: forecast_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn stations_url(&self) -> String {
        format!(
            "{}/api/version/1.0/parameter/{}.json",
            self.observations_base_url, TEMPERATURE_PARAMETER
        )
    }

    /// URL of a station's historical product. `Forecast` has no station product
    /// and maps to the recent one.
    pub fn observations_url(&self, station_id: &str, period: DataPeriod) -> String {
        let product = match period {
            DataPeriod::CorrectedArchive => "corrected-archive/data.csv",
            DataPeriod::RecentHistorical | DataPeriod::Forecast => "latest-months/data.json",
        };
        format!(
            "{}/api/version/1.0/parameter/{}/station/{}/period/{}",
            self.observations_base_url, TEMPERATURE_PARAMETER, station_id, product
        )
    }

    /// Point forecast URL, coordinates rounded to 3 decimals.
    pub fn forecast_url(&self, coordinates: Coordinates) -> String {
        format!(
            "{}/api/category/pmp3g/version/2/geotype/point/lon/{:.3}/lat/{:.3}/data.json",
            self.forecast_base_url, coordinates.longitude, coordinates.latitude
        )
    }

    /// Fetch the full temperature station list.
    pub async fn fetch_stations(&self) -> Result<Vec<StationRecord>, AppError> {
        let url = self.stations_url();
        let body = self.get_text(&url).await?;
        parse_station_list(&body)
    }

    /// Fetch a station's historical series and keep the readings of `date`.
    pub async fn fetch_observations(
        &self,
        station_id: &str,
        period: DataPeriod,
        date: NaiveDate,
        tz: &Tz,
    ) -> FetchOutcome {
        let url = self.observations_url(station_id, period);
        tracing::debug!("Fetching {} observations: {}", period.label(), url);

        let parsed = match self.get_text(&url).await {
            Ok(body) => match period {
                DataPeriod::CorrectedArchive => parse_archive_csv(&body),
                _ => parse_observation_json(&body),
            },
            Err(e) => Err(e),
        };

        match parsed {
            Ok(series) => {
                let total = series.len();
                let observations = DayWindow::for_date(date, tz).filter(series);
                tracing::debug!(
                    "Kept {} of {} observations for {}",
                    observations.len(),
                    total,
                    date
                );
                FetchOutcome { observations, url }
            }
            Err(e) => {
                tracing::warn!("Observation fetch for station {} failed: {}", station_id, e);
                FetchOutcome::empty(url)
            }
        }
    }

    /// Fetch the point forecast and keep the temperatures valid on `date`.
    pub async fn fetch_forecast(
        &self,
        coordinates: Coordinates,
        date: NaiveDate,
        tz: &Tz,
    ) -> FetchOutcome {
        let url = self.forecast_url(coordinates);
        tracing::debug!("Fetching forecast: {}", url);

        let parsed = match self.get_text(&url).await {
            Ok(body) => extract_forecast_temperatures(&body, date, tz),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(observations) => FetchOutcome { observations, url },
            Err(e) => {
                tracing::warn!("Forecast fetch failed: {}", e);
                FetchOutcome::empty(url)
            }
        }
    }

    async fn get_text(&self, url: &str) -> Result<String, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("SMHI request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "SMHI returned HTTP {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("SMHI body read failed: {}", e)))
    }
}

/// Parse the station list. Entries with unparseable `updated` are kept with
/// `last_updated = None`; the selector skips them.
pub fn parse_station_list(body: &str) -> Result<Vec<StationRecord>, AppError> {
    let response: StationListResponse = serde_json::from_str(body).map_err(|e| {
        AppError::ExternalServiceError(format!("SMHI station list structure error: {}", e))
    })?;

    Ok(response
        .station
        .into_iter()
        .map(|raw| StationRecord {
            id: match raw.key {
                Value::String(s) => s,
                other => other.to_string(),
            },
            name: raw.name,
            latitude: raw.latitude,
            longitude: raw.longitude,
            last_updated: normalize_timestamp(&raw.updated),
        })
        .collect())
}

/// Parse a metobs JSON series (`{"value": [{"date", "value", "quality"}]}`).
/// A `null` series is an empty one; entries with an unparseable date are dropped.
pub fn parse_observation_json(body: &str) -> Result<Vec<ObservationRecord>, AppError> {
    let response: ObservationResponse = serde_json::from_str(body).map_err(|e| {
        AppError::ExternalServiceError(format!("SMHI observation structure error: {}", e))
    })?;

    Ok(response
        .value
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw| {
            let ts = normalize_timestamp(&raw.date)?;
            Some(ObservationRecord {
                timestamp_ms: ts.timestamp_millis(),
                value: raw.value,
                quality: raw.quality,
                local_time: None,
            })
        })
        .collect())
}

/// Parse a corrected-archive CSV export.
///
/// The export starts with free-text station and parameter blocks, then a
/// `Datum;Tid (UTC);...` header row followed by data rows
/// `YYYY-MM-DD;HH:MM:SS;value;quality;...` with times in UTC. A body without
/// that header row is not an archive export.
pub fn parse_archive_csv(body: &str) -> Result<Vec<ObservationRecord>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut saw_header = false;
    let mut rows = Vec::new();
    let mut record = StringRecord::new();

    while reader.read_record(&mut record).map_err(|e| {
        AppError::ExternalServiceError(format!("SMHI archive CSV read error: {}", e))
    })? {
        if !saw_header {
            saw_header = record
                .get(0)
                .is_some_and(|f| f.eq_ignore_ascii_case("datum"));
            continue;
        }
        if let Some(observation) = archive_row(&record) {
            rows.push(observation);
        }
    }

    if !saw_header {
        return Err(AppError::ExternalServiceError(
            "SMHI archive response is not a CSV export".to_string(),
        ));
    }
    Ok(rows)
}

fn archive_row(record: &StringRecord) -> Option<ObservationRecord> {
    let day = NaiveDate::parse_from_str(record.get(0)?, "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(record.get(1)?, "%H:%M:%S").ok()?;
    let value = record.get(2)?;
    let ts = NaiveDateTime::new(day, time).and_utc();

    Some(ObservationRecord {
        timestamp_ms: ts.timestamp_millis(),
        value: Value::String(value.to_string()),
        quality: record
            .get(3)
            .filter(|q| !q.is_empty())
            .map(str::to_string),
        local_time: None,
    })
}

/// Extract forecast temperatures valid on `date` (local calendar day in `tz`).
///
/// Takes the first value of the `t` parameter per time step; steps without it
/// are skipped.
pub fn extract_forecast_temperatures(
    body: &str,
    date: NaiveDate,
    tz: &Tz,
) -> Result<Vec<ObservationRecord>, AppError> {
    let response: ForecastResponse = serde_json::from_str(body).map_err(|e| {
        AppError::ExternalServiceError(format!("SMHI forecast structure error: {}", e))
    })?;

    Ok(response
        .time_series
        .into_iter()
        .filter_map(|entry| {
            let valid = normalize_timestamp(&Value::String(entry.valid_time))?;
            if local_date(valid, tz) != date {
                return None;
            }
            let value = entry
                .parameters
                .into_iter()
                .find(|p| p.name == FORECAST_TEMPERATURE)?
                .values
                .into_iter()
                .next()?;
            Some(ObservationRecord::new(valid.timestamp_millis(), value))
        })
        .collect())
}
