// Weather Digest v0.1
use axum::{routing::get, routing::post, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod helpers;
mod models;
mod routes;
mod services;

use config::AppConfig;
use services::geocode::GeocodingClient;
use services::pipeline::WeatherPipeline;
use services::smhi::SmhiClient;
use services::stations::StationCatalog;
use services::summarize::SummaryClient;

/// Weather Digest API: OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Digest API",
        version = "0.1.0",
        description = "Resolves a city, picks the nearest SMHI station or point forecast \
            for the requested date, extracts that day's temperatures and asks a \
            language model for a short plain-language summary.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Stations", description = "Station metadata snapshot"),
        (name = "Summary", description = "City + date weather summaries"),
    ),
    paths(
        routes::health::health_check,
        routes::stations::list_stations,
        routes::summary::post_summary,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::stations::StationListResponse,
            routes::summary::SummaryRequest,
            routes::summary::SummaryResponse,
            models::Coordinates,
            models::StationRecord,
            models::ObservationRecord,
            services::period::DataPeriod,
            services::stations::StationSelection,
            services::summarize::TemperatureDigest,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "weather_digest=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.openweather_api_key.is_none() {
        tracing::warn!("OPENWEATHER_API_KEY not set, city lookups will fail");
    }
    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set, summaries will use the fallback text");
    }

    let clients = SmhiClient::new(
        &config.observations_base_url,
        &config.forecast_base_url,
        &config.user_agent,
    )
    .and_then(|smhi| {
        let geocoder = GeocodingClient::new(
            &config.geocoding_base_url,
            config.openweather_api_key.clone(),
            &config.user_agent,
        )?;
        let summarizer = SummaryClient::new(
            &config.llm_base_url,
            config.openai_api_key.clone(),
            &config.openai_model,
            &config.user_agent,
        )?;
        Ok((smhi, geocoder, summarizer))
    });
    let (smhi, geocoder, summarizer) = match clients {
        Ok(clients) => clients,
        Err(e) => {
            tracing::error!("Failed to initialise HTTP clients: {}", e);
            std::process::exit(1);
        }
    };

    // Station metadata is loaded once, before the listener binds
    let catalog = Arc::new(StationCatalog::load(&smhi).await);
    if catalog.is_empty() {
        tracing::warn!("Station snapshot is empty; historical lookups will report no station");
    }

    let pipeline = WeatherPipeline::new(catalog, geocoder, smhi, summarizer, config.timezone);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(routes::page::index).post(routes::page::submit))
        .route("/api/v1/summary", post(routes::summary::post_summary))
        .route("/api/v1/stations", get(routes::stations::list_stations))
        .route("/api/v1/health", get(routes::health::health_check))
        .with_state(pipeline)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {} (timezone {})", addr, config.timezone);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
