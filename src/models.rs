//! Domain records shared by the services and the HTTP layer.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

use crate::helpers::parse_numeric;

/// A resolved position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One weather station from the metadata snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StationRecord {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Last time the station reported, `None` if the metadata value was unparseable.
    pub last_updated: Option<DateTime<Utc>>,
}

impl StationRecord {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// One temperature reading.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ObservationRecord {
    /// Epoch milliseconds (UTC)
    pub timestamp_ms: i64,
    /// Value as delivered upstream (number or numeric string)
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    /// Upstream quality code, when the source provides one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Human-readable local timestamp, attached before display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_time: Option<String>,
}

impl ObservationRecord {
    pub fn new(timestamp_ms: i64, value: serde_json::Value) -> Self {
        Self {
            timestamp_ms,
            value,
            quality: None,
            local_time: None,
        }
    }

    /// The reading as a number, `None` if the upstream value does not parse.
    pub fn numeric_value(&self) -> Option<f64> {
        parse_numeric(&self.value)
    }

    /// Attach `local_time` formatted in `tz` ("YYYY-MM-DD HH:MM").
    pub fn annotate_local_time(&mut self, tz: &Tz) {
        self.local_time = DateTime::from_timestamp_millis(self.timestamp_ms)
            .map(|dt| dt.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string());
    }
}
