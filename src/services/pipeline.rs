//! Request pipeline: correct → geocode → select station → fetch → summarize.
//!
//! Every step is awaited before the next begins. Failures never escape as
//! errors; they end the run with a user-facing `PipelineError` recorded on the
//! `RequestContext`.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tracing::Instrument;
use uuid::Uuid;

use crate::models::{Coordinates, ObservationRecord};
use crate::services::geocode::{correct_city_name, GeocodingClient};
use crate::services::period::{today_in, DataPeriod};
use crate::services::smhi::{FetchOutcome, SmhiClient};
use crate::services::stations::{StationCatalog, StationSelection};
use crate::services::summarize::{SummaryClient, TemperatureDigest};

/// User-facing reasons a request produced no summary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Please enter a city name.")]
    MissingCity,

    #[error("Invalid date '{0}': expected YYYY-MM-DD.")]
    InvalidDate(String),

    #[error("Could not find a location named '{0}'.")]
    CityNotFound(String),

    #[error("No nearby weather station found.")]
    NoStation,

    #[error("No weather data available for {city} on {date}.")]
    NoData { city: String, date: NaiveDate },
}

impl PipelineError {
    /// Whether the request itself was malformed (as opposed to no result).
    pub fn is_input_error(&self) -> bool {
        matches!(self, PipelineError::MissingCity | PipelineError::InvalidDate(_))
    }
}

/// Per-request state, built up step by step and discarded after rendering.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    /// City as typed
    pub city_input: String,
    /// City actually geocoded (after correction)
    pub city: String,
    /// "Corrected to X" notice
    pub notice: Option<String>,
    pub date_input: String,
    pub date: Option<NaiveDate>,
    pub coordinates: Option<Coordinates>,
    pub period: Option<DataPeriod>,
    pub station: Option<StationSelection>,
    /// Upstream URL the weather data was requested from
    pub source_url: Option<String>,
    pub observations: Vec<ObservationRecord>,
    pub digest: Option<TemperatureDigest>,
    pub summary: Option<String>,
    pub error: Option<PipelineError>,
}

impl RequestContext {
    pub fn new(city_input: &str, date_input: &str) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            city_input: city_input.to_string(),
            city: city_input.trim().to_string(),
            notice: None,
            date_input: date_input.to_string(),
            date: None,
            coordinates: None,
            period: None,
            station: None,
            source_url: None,
            observations: Vec::new(),
            digest: None,
            summary: None,
            error: None,
        }
    }

    fn fail(mut self, error: PipelineError) -> Self {
        tracing::info!("Request ended without summary: {}", error);
        self.error = Some(error);
        self
    }
}

/// Everything a request needs: the station snapshot and the upstream clients.
#[derive(Debug, Clone)]
pub struct WeatherPipeline {
    catalog: Arc<StationCatalog>,
    geocoder: GeocodingClient,
    smhi: SmhiClient,
    summarizer: SummaryClient,
    timezone: Tz,
}

impl WeatherPipeline {
    pub fn new(
        catalog: Arc<StationCatalog>,
        geocoder: GeocodingClient,
        smhi: SmhiClient,
        summarizer: SummaryClient,
        timezone: Tz,
    ) -> Self {
        Self {
            catalog,
            geocoder,
            smhi,
            summarizer,
            timezone,
        }
    }

    pub fn catalog(&self) -> &StationCatalog {
        &self.catalog
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Run one request with "today" taken from the configured timezone.
    pub async fn run(&self, city: &str, date: &str) -> RequestContext {
        self.run_at(city, date, today_in(&self.timezone)).await
    }

    /// Run one request against an explicit "today".
    pub async fn run_at(&self, city: &str, date: &str, today: NaiveDate) -> RequestContext {
        let ctx = RequestContext::new(city, date);
        let span = tracing::info_span!("pipeline", request_id = %ctx.request_id);
        self.execute(ctx, today).instrument(span).await
    }

    async fn execute(&self, mut ctx: RequestContext, today: NaiveDate) -> RequestContext {
        let tz = self.timezone;

        if ctx.city.is_empty() {
            return ctx.fail(PipelineError::MissingCity);
        }
        let date = match NaiveDate::parse_from_str(ctx.date_input.trim(), "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                let raw = ctx.date_input.clone();
                return ctx.fail(PipelineError::InvalidDate(raw));
            }
        };
        ctx.date = Some(date);

        let correction = correct_city_name(&ctx.city, self.catalog.names());
        ctx.city = correction.name;
        ctx.notice = correction.notice;

        let Some(coordinates) = self.geocoder.resolve(&ctx.city).await else {
            let city = ctx.city.clone();
            return ctx.fail(PipelineError::CityNotFound(city));
        };
        ctx.coordinates = Some(coordinates);

        let period = DataPeriod::classify(date, today);
        ctx.period = Some(period);
        ctx.station = self.catalog.select(coordinates, date, &tz);
        tracing::info!(
            "City '{}' at ({:.3}, {:.3}), {} → {:?}, station {:?}",
            ctx.city,
            coordinates.latitude,
            coordinates.longitude,
            date,
            period,
            ctx.station.as_ref().map(|s| s.station.id.as_str())
        );

        let outcome: FetchOutcome = if period.is_historical() {
            let Some(selection) = ctx.station.as_ref() else {
                return ctx.fail(PipelineError::NoStation);
            };
            self.smhi
                .fetch_observations(&selection.station.id, period, date, &tz)
                .await
        } else {
            self.smhi.fetch_forecast(coordinates, date, &tz).await
        };

        ctx.source_url = Some(outcome.url);
        ctx.observations = outcome.observations;
        for obs in ctx.observations.iter_mut() {
            obs.annotate_local_time(&tz);
        }

        ctx.digest = TemperatureDigest::from_observations(&ctx.observations);
        if ctx.digest.is_none() {
            let city = ctx.city.clone();
            return ctx.fail(PipelineError::NoData { city, date });
        }

        let source = source_label(period, ctx.station.as_ref());
        ctx.summary = Some(
            self.summarizer
                .summarize(&ctx.city, date, &ctx.observations, &source)
                .await,
        );
        ctx
    }
}

fn source_label(period: DataPeriod, station: Option<&StationSelection>) -> String {
    match (period, station) {
        (DataPeriod::Forecast, _) => "SMHI point forecast".to_string(),
        (_, Some(selection)) => format!(
            "SMHI {} from station {} ({:.0} km away)",
            period.label(),
            selection.station.name,
            selection.distance_km
        ),
        (_, None) => format!("SMHI {}", period.label()),
    }
}
