//! Temperature digest and LLM-written summary.
//!
//! Only the digest (count, min, max, mean) goes into the prompt, never the raw
//! series. Any provider failure is replaced by `FALLBACK_SUMMARY`.

use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::helpers::f64_to_decimal_1dp;
use crate::models::ObservationRecord;

/// Fixed timeout for the chat-completions call.
pub const SUMMARY_TIMEOUT_SECS: u64 = 30;

/// Upper bound on generated tokens.
const SUMMARY_MAX_TOKENS: u32 = 300;

/// Returned whenever the provider cannot produce a summary.
pub const FALLBACK_SUMMARY: &str =
    "Sorry, a weather summary could not be generated right now. The readings above are still accurate.";

/// Min/max/mean of the parseable readings, rounded to 0.1 °C.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TemperatureDigest {
    /// Readings that parsed as numbers
    pub count: usize,
    /// Readings skipped because their value did not parse
    pub skipped: usize,
    #[schema(value_type = String)]
    pub min: Decimal,
    #[schema(value_type = String)]
    pub max: Decimal,
    #[schema(value_type = String)]
    pub mean: Decimal,
}

impl TemperatureDigest {
    /// `None` when no reading has a numeric value.
    pub fn from_observations(observations: &[ObservationRecord]) -> Option<Self> {
        let values: Vec<f64> = observations
            .iter()
            .filter_map(ObservationRecord::numeric_value)
            .collect();
        if values.is_empty() {
            return None;
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;

        Some(Self {
            count: values.len(),
            skipped: observations.len() - values.len(),
            min: f64_to_decimal_1dp(min),
            max: f64_to_decimal_1dp(max),
            mean: f64_to_decimal_1dp(mean),
        })
    }
}

/// Prompt text sent to the provider.
pub fn build_prompt(
    city: &str,
    date: NaiveDate,
    source: &str,
    digest: &TemperatureDigest,
) -> String {
    format!(
        "Explain this weather data for {city} on {date}.\n\
         Source: {source}.\n\
         Air temperature in °C from {count} readings: minimum {min}, maximum {max}, mean {mean}.\n\
         Write two or three friendly sentences for a general audience.",
        city = city,
        date = date.format("%Y-%m-%d"),
        source = source,
        count = digest.count,
        min = digest.min,
        max = digest.max,
        mean = digest.mean,
    )
}

// --- OpenAI chat-completions wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct SummaryClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl SummaryClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: &str,
        user_agent: &str,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        })
    }

    /// Summarize the readings of `date` in `city`. Never fails: provider
    /// errors, timeouts and empty digests all yield `FALLBACK_SUMMARY`.
    pub async fn summarize(
        &self,
        city: &str,
        date: NaiveDate,
        observations: &[ObservationRecord],
        source: &str,
    ) -> String {
        let Some(digest) = TemperatureDigest::from_observations(observations) else {
            return FALLBACK_SUMMARY.to_string();
        };
        let prompt = build_prompt(city, date, source, &digest);

        match self.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Summary generation failed: {}", e);
                FALLBACK_SUMMARY.to_string()
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::InternalError("OPENAI_API_KEY is not configured".to_string())
        })?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: SUMMARY_MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(SUMMARY_TIMEOUT_SECS))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError(format!("LLM request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "LLM returned HTTP {}",
                response.status()
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("LLM JSON parse error: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::ExternalServiceError("LLM returned no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn obs(values: &[serde_json::Value]) -> Vec<ObservationRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| ObservationRecord::new(i as i64 * 3_600_000, v.clone()))
            .collect()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_digest_skips_unparseable() {
        let digest =
            TemperatureDigest::from_observations(&obs(&[json!("-2.0"), json!(4.0), json!("x"), json!(1.0)]))
                .unwrap();
        assert_eq!(digest.count, 3);
        assert_eq!(digest.skipped, 1);
        assert_eq!(digest.min, Decimal::from_str("-2.0").unwrap());
        assert_eq!(digest.max, Decimal::from_str("4.0").unwrap());
        assert_eq!(digest.mean, Decimal::from_str("1.0").unwrap());
    }

    #[test]
    fn test_digest_none_when_nothing_parses() {
        assert!(TemperatureDigest::from_observations(&obs(&[json!("n/a")])).is_none());
        assert!(TemperatureDigest::from_observations(&[]).is_none());
    }

    #[test]
    fn test_prompt_contains_digest() {
        let digest = TemperatureDigest::from_observations(&obs(&[json!(1.25), json!(3.0)])).unwrap();
        let prompt = build_prompt("Uppsala", date("2024-02-03"), "recent observations", &digest);
        assert!(prompt.contains("Uppsala on 2024-02-03"));
        assert!(prompt.contains("2 readings"));
        assert!(prompt.contains("maximum 3.0"));
        assert!(prompt.contains("Source: recent observations."));
    }

    #[tokio::test]
    async fn test_summarize_returns_model_text() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-3.5-turbo", "max_tokens": 300 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "  A crisp winter day.  " } }
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = SummaryClient::new(
            &mock_server.uri(),
            Some("sk-test".to_string()),
            "gpt-3.5-turbo",
            "ua",
        )
        .unwrap();
        let text = client
            .summarize("Kiruna", date("2024-01-10"), &obs(&[json!(-20.0)]), "forecast")
            .await;
        assert_eq!(text, "A crisp winter day.");
    }

    #[tokio::test]
    async fn test_summarize_falls_back_on_provider_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client =
            SummaryClient::new(&mock_server.uri(), Some("sk".to_string()), "m", "ua").unwrap();
        let text = client
            .summarize("Kiruna", date("2024-01-10"), &obs(&[json!(-20.0)]), "forecast")
            .await;
        assert_eq!(text, FALLBACK_SUMMARY);
    }

    #[tokio::test]
    async fn test_summarize_falls_back_on_empty_choices() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&mock_server)
            .await;

        let client =
            SummaryClient::new(&mock_server.uri(), Some("sk".to_string()), "m", "ua").unwrap();
        let text = client
            .summarize("Kiruna", date("2024-01-10"), &obs(&[json!(-20.0)]), "forecast")
            .await;
        assert_eq!(text, FALLBACK_SUMMARY);
    }

    #[tokio::test]
    async fn test_summarize_without_key_falls_back() {
        let client = SummaryClient::new("http://127.0.0.1:9", None, "m", "ua").unwrap();
        let text = client
            .summarize("Kiruna", date("2024-01-10"), &obs(&[json!(-20.0)]), "forecast")
            .await;
        assert_eq!(text, FALLBACK_SUMMARY);
    }
}
