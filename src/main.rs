use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use weather_oracle::adapters::http::{self, AppState};
use weather_oracle::config::OracleConfig;
use weather_oracle::pipeline::Pipeline;

/// Weather Oracle API — OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Weather Oracle API",
        version = "0.1.0",
        description = "Multi-model weather forecast pipeline: fans out to several \
            numerical weather models, reconciles their disagreements into a single \
            consensus forecast, and attaches an explainable confidence score.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Forecast", description = "Forecast retrieval and location search"),
    ),
    paths(
        http::health_check,
        http::get_forecast,
        http::get_search,
    ),
    components(
        schemas(
            http::HealthResponse,
            http::ForecastResponse,
            http::LocationDto,
            http::CoordinatesDto,
            http::WindDirectionDto,
            http::WeatherMetricsDto,
            http::HourlyDto,
            http::DailyDto,
            weather_oracle::errors::ErrorResponse,
            weather_oracle::geocoding::GeocodingResult,
            weather_oracle::aggregate::ModelWeight,
            weather_oracle::confidence::ConfidenceLevel,
            weather_oracle::confidence::FactorContribution,
            weather_oracle::confidence::Level,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_oracle=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = OracleConfig::from_env();

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .build()
        .expect("failed to build HTTP client");

    let pipeline = Arc::new(Pipeline::new(client, config.clone()));
    let state = AppState { pipeline };

    // Read-only API — restrict methods to GET.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let app = http::router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("weather-oracle listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("server terminated unexpectedly");
}
