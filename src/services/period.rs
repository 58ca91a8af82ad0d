//! Temporal routing: which data product answers a request for a given date,
//! and which instants make up that date.
//!
//! All calendar-day reasoning uses the configured local timezone. Windows are
//! half-open `[start, end)` in epoch milliseconds so a reading stamped exactly
//! at the next midnight belongs to the next day.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::ObservationRecord;

/// How far back the "latest-months" product reaches, in days.
pub const RECENT_PERIOD_DAYS: i64 = 90;

/// The data product used for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataPeriod {
    /// Target date is today or later: point forecast for the coordinates.
    Forecast,
    /// Target date within the last `RECENT_PERIOD_DAYS`: station "latest-months" product.
    RecentHistorical,
    /// Anything older: station "corrected-archive" product.
    CorrectedArchive,
}

impl DataPeriod {
    /// Pick the data product for `target`, given the current local date.
    pub fn classify(target: NaiveDate, today: NaiveDate) -> Self {
        if target >= today {
            DataPeriod::Forecast
        } else if target >= today - Duration::days(RECENT_PERIOD_DAYS) {
            DataPeriod::RecentHistorical
        } else {
            DataPeriod::CorrectedArchive
        }
    }

    /// Human-readable label used on the rendered page and in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            DataPeriod::Forecast => "forecast",
            DataPeriod::RecentHistorical => "recent observations",
            DataPeriod::CorrectedArchive => "corrected archive",
        }
    }

    pub fn is_historical(&self) -> bool {
        !matches!(self, DataPeriod::Forecast)
    }
}

/// Half-open millisecond interval covering one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DayWindow {
    /// Window from local midnight of `date` to local midnight of the next day.
    pub fn for_date(date: NaiveDate, tz: &Tz) -> Self {
        let next = date.succ_opt().unwrap_or(date);
        Self {
            start_ms: local_midnight(date, tz).timestamp_millis(),
            end_ms: local_midnight(next, tz).timestamp_millis(),
        }
    }

    pub fn contains(&self, timestamp_ms: i64) -> bool {
        self.start_ms <= timestamp_ms && timestamp_ms < self.end_ms
    }

    /// Keep only the observations inside the window, preserving order.
    pub fn filter(&self, observations: Vec<ObservationRecord>) -> Vec<ObservationRecord> {
        observations
            .into_iter()
            .filter(|o| self.contains(o.timestamp_ms))
            .collect()
    }
}

/// First instant of `date` in `tz`.
///
/// On DST-ambiguous midnights the earlier instant wins; where midnight does not
/// exist locally, the first instant of the following hour is used.
pub fn local_midnight(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let naive = NaiveDateTime::new(date, NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// Local calendar date of an instant.
pub fn local_date(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// Today's date in `tz`.
pub fn today_in(tz: &Tz) -> NaiveDate {
    local_date(Utc::now(), tz)
}
