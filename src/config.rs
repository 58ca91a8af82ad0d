use chrono_tz::Tz;

const DEFAULT_GEOCODING_BASE_URL: &str = "http://api.openweathermap.org";
const DEFAULT_OBSERVATIONS_BASE_URL: &str = "https://opendata-download-metobs.smhi.se";
const DEFAULT_FORECAST_BASE_URL: &str = "https://opendata-download-metfcst.smhi.se";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_LLM_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TIMEZONE: &str = "Europe/Stockholm";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("PORT must be a valid u16, got '{0}'")]
    InvalidPort(String),

    #[error("LOCAL_TIMEZONE must be an IANA timezone name, got '{0}'")]
    InvalidTimezone(String),
}

/// Application configuration, parsed from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Key for the OpenWeather geocoding endpoint. Without it every city is unresolvable.
    pub openweather_api_key: Option<String>,
    /// Key for the chat-completions endpoint. Without it summaries use the apology text.
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    /// Timezone that defines calendar days for windows and forecast matching.
    pub timezone: Tz,
    pub geocoding_base_url: String,
    pub observations_base_url: String,
    pub forecast_base_url: String,
    pub llm_base_url: String,
    pub user_agent: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => 8080,
        };

        let tz_name = non_empty("LOCAL_TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = tz_name
            .trim()
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(tz_name.clone()))?;

        Ok(Self {
            port,
            openweather_api_key: non_empty("OPENWEATHER_API_KEY"),
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            timezone,
            geocoding_base_url: non_empty("GEOCODING_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEOCODING_BASE_URL.to_string()),
            observations_base_url: non_empty("OBSERVATIONS_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OBSERVATIONS_BASE_URL.to_string()),
            forecast_base_url: non_empty("FORECAST_BASE_URL")
                .unwrap_or_else(|| DEFAULT_FORECAST_BASE_URL.to_string()),
            llm_base_url: non_empty("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            user_agent: non_empty("HTTP_USER_AGENT").unwrap_or_else(|| {
                format!("WeatherDigest/{}", env!("CARGO_PKG_VERSION"))
            }),
        })
    }
}
