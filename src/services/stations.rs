//! Station metadata snapshot and nearest-station selection.
//!
//! The snapshot is loaded once before the server accepts requests and is
//! shared read-only (`Arc<StationCatalog>`) for the lifetime of the process.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use geo::{GeodesicDistance, Point};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Coordinates, StationRecord};
use crate::services::period::local_midnight;
use crate::services::smhi::SmhiClient;

/// The station chosen for a request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StationSelection {
    pub station: StationRecord,
    /// Distance from the requested location in kilometres
    pub distance_km: f64,
    /// `true` when no station reports up to the target date and the nearest
    /// one was used anyway
    pub stale: bool,
}

/// Read-only station metadata loaded at startup.
#[derive(Debug, Clone)]
pub struct StationCatalog {
    stations: Vec<StationRecord>,
    loaded_at: DateTime<Utc>,
}

impl StationCatalog {
    pub fn new(stations: Vec<StationRecord>) -> Self {
        Self {
            stations,
            loaded_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Fetch the metadata once. A failed fetch yields an empty catalog so the
    /// service still starts and reports "no nearby station" per request.
    pub async fn load(client: &SmhiClient) -> Self {
        match client.fetch_stations().await {
            Ok(stations) => {
                let unparsed = stations.iter().filter(|s| s.last_updated.is_none()).count();
                tracing::info!(
                    "Loaded {} stations ({} without a usable last-updated timestamp)",
                    stations.len(),
                    unparsed
                );
                Self::new(stations)
            }
            Err(e) => {
                tracing::error!("Failed to load station metadata: {}", e);
                Self::empty()
            }
        }
    }

    pub fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stations.iter().map(|s| s.name.as_str())
    }

    pub fn select(
        &self,
        coordinates: Coordinates,
        target: NaiveDate,
        tz: &Tz,
    ) -> Option<StationSelection> {
        select_station(&self.stations, coordinates, target, tz)
    }
}

/// Geodesic distance on the WGS84 ellipsoid, in kilometres.
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let a = Point::new(from.longitude, from.latitude);
    let b = Point::new(to.longitude, to.latitude);
    a.geodesic_distance(&b) / 1000.0
}

/// Choose the nearest station that has reported up to `target`.
///
/// Stations without a parseable last-updated timestamp are skipped. If no
/// station is fresh enough the nearest one is returned with `stale = true`.
/// `None` only when no candidate remains. Equal distances keep input order.
pub fn select_station(
    stations: &[StationRecord],
    coordinates: Coordinates,
    target: NaiveDate,
    tz: &Tz,
) -> Option<StationSelection> {
    let mut candidates: Vec<(&StationRecord, DateTime<Utc>, f64)> = stations
        .iter()
        .filter_map(|s| {
            let updated = s.last_updated?;
            Some((s, updated, distance_km(coordinates, s.coordinates())))
        })
        .collect();

    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|a, b| a.2.total_cmp(&b.2));

    let target_start = local_midnight(target, tz);

    let (station, distance, stale) = candidates
        .iter()
        .find(|(_, updated, _)| *updated >= target_start)
        .map(|(s, _, d)| (*s, *d, false))
        .unwrap_or_else(|| {
            let (s, _, d) = candidates[0];
            (s, d, true)
        });

    if stale {
        tracing::debug!(
            "No station reports up to {}, falling back to nearest '{}'",
            target,
            station.name
        );
    }

    Some(StationSelection {
        station: station.clone(),
        distance_km: distance,
        stale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn station(id: &str, lat: f64, lon: f64, updated: Option<&str>) -> StationRecord {
        StationRecord {
            id: id.to_string(),
            name: format!("Station {}", id),
            latitude: lat,
            longitude: lon,
            last_updated: updated.map(|s| {
                DateTime::parse_from_rfc3339(s)
                    .unwrap()
                    .with_timezone(&Utc)
            }),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // Stockholm city centre
    const HOME: Coordinates = Coordinates {
        latitude: 59.3293,
        longitude: 18.0686,
    };

    #[test]
    fn test_empty_set_returns_none() {
        assert!(select_station(&[], HOME, date("2024-05-01"), &chrono_tz::UTC).is_none());
    }

    #[test]
    fn test_only_unparseable_returns_none() {
        let stations = vec![station("1", 59.33, 18.07, None)];
        assert!(select_station(&stations, HOME, date("2024-05-01"), &chrono_tz::UTC).is_none());
    }

    #[test]
    fn test_nearest_fresh_station_wins() {
        let stations = vec![
            // Uppsala, fresh
            station("far", 59.8586, 17.6389, Some("2024-06-01T00:00:00Z")),
            // Next door, stale
            station("near", 59.33, 18.07, Some("2024-01-01T00:00:00Z")),
            // Södertälje, fresh
            station("mid", 59.1955, 17.6253, Some("2024-06-01T00:00:00Z")),
        ];

        let selection =
            select_station(&stations, HOME, date("2024-05-01"), &chrono_tz::UTC).unwrap();
        assert_eq!(selection.station.id, "mid");
        assert!(!selection.stale);
        assert!(selection.distance_km > 20.0 && selection.distance_km < 40.0);
    }

    #[test]
    fn test_falls_back_to_nearest_when_none_fresh() {
        let stations = vec![
            station("far", 59.8586, 17.6389, Some("2023-01-01T00:00:00Z")),
            station("near", 59.33, 18.07, Some("2023-06-01T00:00:00Z")),
        ];

        let selection =
            select_station(&stations, HOME, date("2024-05-01"), &chrono_tz::UTC).unwrap();
        assert_eq!(selection.station.id, "near");
        assert!(selection.stale);
    }

    #[test]
    fn test_skips_unparseable_entries() {
        let stations = vec![
            station("broken", 59.3293, 18.0686, None),
            station("ok", 59.8586, 17.6389, Some("2024-06-01T00:00:00Z")),
        ];

        let selection =
            select_station(&stations, HOME, date("2024-05-01"), &chrono_tz::UTC).unwrap();
        assert_eq!(selection.station.id, "ok");
    }

    #[test]
    fn test_updated_exactly_at_target_start_is_fresh() {
        let stations = vec![
            station("near", 59.33, 18.07, Some("2024-05-01T00:00:00Z")),
            station("far", 59.8586, 17.6389, Some("2024-06-01T00:00:00Z")),
        ];

        let selection =
            select_station(&stations, HOME, date("2024-05-01"), &chrono_tz::UTC).unwrap();
        assert_eq!(selection.station.id, "near");
        assert!(!selection.stale);
    }

    #[test]
    fn test_freshness_uses_local_day_start() {
        // 22:30Z on April 30 is already May 1 in Stockholm (CEST, UTC+2)
        let updated = chrono::Utc.with_ymd_and_hms(2024, 4, 30, 22, 30, 0).unwrap();
        let mut near = station("near", 59.33, 18.07, None);
        near.last_updated = Some(updated);
        let stations = vec![near];

        let local = select_station(
            &stations,
            HOME,
            date("2024-05-01"),
            &chrono_tz::Europe::Stockholm,
        )
        .unwrap();
        assert!(!local.stale);

        let utc = select_station(&stations, HOME, date("2024-05-01"), &chrono_tz::UTC).unwrap();
        assert!(utc.stale);
    }

    #[test]
    fn test_ties_keep_metadata_order() {
        let stations = vec![
            station("first", 59.5, 18.0686, Some("2024-06-01T00:00:00Z")),
            station("second", 59.5, 18.0686, Some("2024-06-01T00:00:00Z")),
        ];

        let selection =
            select_station(&stations, HOME, date("2024-05-01"), &chrono_tz::UTC).unwrap();
        assert_eq!(selection.station.id, "first");
    }

    #[test]
    fn test_ranking_follows_ellipsoid_not_sphere() {
        // On a sphere "east" is marginally nearer; on WGS84 "north" is.
        let home = Coordinates::new(60.0, 18.0);
        let stations = vec![
            station("east", 60.0, 18.2003, Some("2024-06-01T00:00:00Z")),
            station("north", 60.1002, 18.0, Some("2024-06-01T00:00:00Z")),
        ];

        let selection =
            select_station(&stations, home, date("2024-05-01"), &chrono_tz::UTC).unwrap();
        assert_eq!(selection.station.id, "north");
        assert!((selection.distance_km - 11.16).abs() < 0.01);
    }

    #[test]
    fn test_catalog_names_and_len() {
        let catalog = StationCatalog::new(vec![
            station("1", 59.0, 18.0, None),
            station("2", 60.0, 18.0, None),
        ]);
        assert_eq!(catalog.len(), 2);
        assert!(!catalog.is_empty());
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["Station 1", "Station 2"]);
        assert!(StationCatalog::empty().is_empty());
    }

    #[test]
    fn test_distance_stockholm_uppsala() {
        let uppsala = Coordinates::new(59.8586, 17.6389);
        let d = distance_km(HOME, uppsala);
        assert!(d > 60.0 && d < 70.0, "distance was {}", d);
    }
}
