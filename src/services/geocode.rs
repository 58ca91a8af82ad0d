//! City name → coordinates, via the OpenWeather direct geocoding API.
//!
//! Before a lookup, the city name is matched against the known station names
//! so obvious typos are corrected (and the caller is told about it).

use serde::Deserialize;

use crate::errors::AppError;
use crate::models::Coordinates;

/// Normalized similarity a station name must exceed to replace the input.
pub const CORRECTION_THRESHOLD: f64 = 0.8;

/// Result of the fuzzy correction step.
#[derive(Debug, Clone, PartialEq)]
pub struct CityCorrection {
    /// Name to geocode (the input, or the corrected station name)
    pub name: String,
    /// "Corrected to X" notice, only when the name changed
    pub notice: Option<String>,
}

/// Compare `input` against `candidates` (case-insensitive normalized
/// Levenshtein) and substitute the best match if it scores above
/// `CORRECTION_THRESHOLD` and actually differs from the input.
pub fn correct_city_name<'a, I>(input: &str, candidates: I) -> CityCorrection
where
    I: IntoIterator<Item = &'a str>,
{
    let input = input.trim();
    let needle = input.to_lowercase();

    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = strsim::normalized_levenshtein(&needle, &candidate.trim().to_lowercase());
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate.trim(), score));
        }
    }

    match best {
        Some((name, score))
            if score > CORRECTION_THRESHOLD && name.to_lowercase() != needle =>
        {
            tracing::info!(
                "Corrected city '{}' to '{}' (similarity {:.2})",
                input,
                name,
                score
            );
            CityCorrection {
                name: name.to_string(),
                notice: Some(format!("Corrected '{}' to '{}'.", input, name)),
            }
        }
        _ => CityCorrection {
            name: input.to_string(),
            notice: None,
        },
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingHit {
    lat: f64,
    lon: f64,
}

/// Client for the OpenWeather geocoding endpoint.
#[derive(Debug, Clone)]
pub struct GeocodingClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GeocodingClient {
    pub fn new(base_url: &str, api_key: Option<String>, user_agent: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Resolve a city to coordinates. `None` when the provider has no match
    /// or cannot be reached; the reason is logged.
    pub async fn resolve(&self, city: &str) -> Option<Coordinates> {
        match self.lookup(city).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Geocoding '{}' failed: {}", city, e);
                None
            }
        }
    }

    async fn lookup(&self, city: &str) -> Result<Option<Coordinates>, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::InternalError("OPENWEATHER_API_KEY is not configured".to_string())
        })?;

        let url = format!("{}/geo/1.0/direct", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", city), ("limit", "1"), ("appid", api_key)])
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("Geocoding request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "Geocoding returned HTTP {}",
                response.status()
            )));
        }

        let hits: Vec<GeocodingHit> = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("Geocoding JSON parse error: {}", e))
        })?;

        Ok(hits
            .into_iter()
            .next()
            .map(|hit| Coordinates::new(hit.lat, hit.lon)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NAMES: [&str; 3] = ["Stockholm", "Uppsala", "Göteborg"];

    #[test]
    fn test_typo_is_corrected_with_notice() {
        let correction = correct_city_name("Stokholm", NAMES);
        assert_eq!(correction.name, "Stockholm");
        assert_eq!(
            correction.notice.as_deref(),
            Some("Corrected 'Stokholm' to 'Stockholm'.")
        );
    }

    #[test]
    fn test_exact_match_has_no_notice() {
        let correction = correct_city_name("Stockholm", NAMES);
        assert_eq!(correction.name, "Stockholm");
        assert!(correction.notice.is_none());
    }

    #[test]
    fn test_case_only_difference_is_not_a_correction() {
        let correction = correct_city_name("uppsala", NAMES);
        assert_eq!(correction.name, "uppsala");
        assert!(correction.notice.is_none());
    }

    #[test]
    fn test_below_threshold_keeps_input() {
        let correction = correct_city_name("Paris", NAMES);
        assert_eq!(correction.name, "Paris");
        assert!(correction.notice.is_none());
    }

    #[test]
    fn test_score_at_threshold_is_not_enough() {
        // One edit in five characters scores exactly 0.8
        assert_eq!(strsim::normalized_levenshtein("malmo", "malmö"), CORRECTION_THRESHOLD);
        let correction = correct_city_name("Malmo", ["Malmö"]);
        assert_eq!(correction.name, "Malmo");
        assert!(correction.notice.is_none());

        // One edit in eight scores 0.875
        let correction = correct_city_name("Uppsalla", NAMES);
        assert_eq!(correction.name, "Uppsala");
        assert!(correction.notice.is_some());
    }

    #[test]
    fn test_no_candidates_keeps_trimmed_input() {
        let correction = correct_city_name("  Lund ", std::iter::empty());
        assert_eq!(correction.name, "Lund");
        assert!(correction.notice.is_none());
    }

    #[tokio::test]
    async fn test_resolve_first_hit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .and(query_param("q", "Stockholm"))
            .and(query_param("limit", "1"))
            .and(query_param("appid", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "Stockholm", "lat": 59.3251, "lon": 18.0711, "country": "SE" }
            ])))
            .mount(&mock_server)
            .await;

        let client =
            GeocodingClient::new(&mock_server.uri(), Some("test-key".to_string()), "ua").unwrap();
        let coords = client.resolve("Stockholm").await.unwrap();
        assert_eq!(coords, Coordinates::new(59.3251, 18.0711));
    }

    #[tokio::test]
    async fn test_resolve_no_hits() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/geo/1.0/direct"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let client =
            GeocodingClient::new(&mock_server.uri(), Some("test-key".to_string()), "ua").unwrap();
        assert!(client.resolve("Atlantis").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_key_is_none() {
        let client = GeocodingClient::new("http://127.0.0.1:9", None, "ua").unwrap();
        assert!(client.resolve("Stockholm").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_unauthorized_is_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client =
            GeocodingClient::new(&mock_server.uri(), Some("bad".to_string()), "ua").unwrap();
        assert!(client.resolve("Stockholm").await.is_none());
    }
}
