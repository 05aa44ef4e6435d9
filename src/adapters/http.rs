//! HTTP adapter (C12a): axum router translating `GET` requests into C10
//! `forecast`/`search` calls, per spec.md §6.
//!
//! Grounded in the teacher's `routes/forecasts.rs` (query-param structs
//! with `IntoParams`, response DTOs with `ToSchema`, a cloneable
//! `AppState` extracted via `State`) and `routes/health.rs` (the health
//! handler is reused near-verbatim since it has no domain-specific
//! state).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use std::str::FromStr;

use crate::aggregate::{AggregatedDailyForecast, AggregatedForecast, AggregatedHourlyForecast, ModelWeight};
use crate::config::Units;
use crate::confidence::ConfidenceLevel;
use crate::domain::{Celsius, Coordinates};
use crate::errors::{ErrorResponse, GeocodingError, PipelineError};
use crate::geocoding::GeocodingResult;
use crate::pipeline::{Pipeline, PipelineOptions};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ForecastQuery {
    /// Location name to geocode (e.g. "Zurich, Switzerland")
    pub location: String,
    /// Forecast horizon in days, 1-16
    pub days: Option<u32>,
    /// Comma-separated model ids; defaults to every registered model
    pub models: Option<String>,
    /// Include the `hourly` array in the response (defaults to false)
    pub hourly: Option<bool>,
    /// Bypass the cache for this request
    pub no_cache: Option<bool>,
    /// "metric" or "imperial"; defaults to the server's configured units
    pub units: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Free-text location query
    pub q: String,
    /// Maximum number of candidates to return
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CoordinatesDto {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<Coordinates> for CoordinatesDto {
    fn from(c: Coordinates) -> Self {
        CoordinatesDto {
            latitude: c.latitude.value(),
            longitude: c.longitude.value(),
        }
    }
}

/// Resolved location, echoing the original query alongside the geocoded
/// match (spec.md §6: top-level `location` key).
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationDto {
    pub query: String,
    pub name: String,
    pub country: Option<String>,
    pub coordinates: CoordinatesDto,
    pub timezone: String,
}

/// Wind direction rendered both ways, per spec.md §6.
#[derive(Debug, Serialize, ToSchema)]
pub struct WindDirectionDto {
    pub degrees: f64,
    pub cardinal: &'static str,
}

/// Converts a Celsius reading to the requested unit system. Shared by
/// both adapters (HTTP and CLI) so unit conversion lives in one place.
pub fn convert_temperature(celsius: f64, units: Units) -> f64 {
    match units {
        Units::Metric => celsius,
        Units::Imperial => Celsius::new(celsius).to_fahrenheit().value(),
    }
}

/// Converts an m/s wind speed to the requested unit system (mph for
/// imperial, matching Open-Meteo's own `windspeed_unit=mph`).
pub fn convert_wind_speed(meters_per_second: f64, units: Units) -> f64 {
    match units {
        Units::Metric => meters_per_second,
        Units::Imperial => meters_per_second * 2.236_936,
    }
}

/// Converts a millimeter precipitation total to the requested unit system.
pub fn convert_precipitation(mm: f64, units: Units) -> f64 {
    match units {
        Units::Metric => mm,
        Units::Imperial => mm / 25.4,
    }
}

/// Converts a meter visibility distance to the requested unit system.
pub fn convert_visibility(meters: f64, units: Units) -> f64 {
    match units {
        Units::Metric => meters,
        Units::Imperial => meters / 1609.344,
    }
}

pub fn units_label(units: Units) -> &'static str {
    match units {
        Units::Metric => "metric",
        Units::Imperial => "imperial",
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WeatherMetricsDto {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub wind_speed: f64,
    pub wind_direction: WindDirectionDto,
    pub precipitation: f64,
    pub precip_probability: f64,
    pub cloud_cover_pct: f64,
    pub visibility: f64,
    pub uv_index: f64,
    pub weather_code: u32,
}

fn metrics_dto(m: crate::models::WeatherMetrics, units: Units) -> WeatherMetricsDto {
    WeatherMetricsDto {
        temperature: convert_temperature(m.temperature, units),
        feels_like: convert_temperature(m.feels_like, units),
        humidity_pct: m.humidity.value(),
        pressure_hpa: m.pressure.hpa(),
        wind_speed: convert_wind_speed(m.wind_speed, units),
        wind_direction: WindDirectionDto {
            degrees: m.wind_direction.degrees(),
            cardinal: m.wind_direction.cardinal(),
        },
        precipitation: convert_precipitation(m.precipitation.value(), units),
        precip_probability: m.precip_probability,
        cloud_cover_pct: m.cloud_cover.value(),
        visibility: convert_visibility(m.visibility.meters(), units),
        uv_index: m.uv_index.value(),
        weather_code: m.weather_code,
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HourlyDto {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub metrics: WeatherMetricsDto,
    pub confidence: ConfidenceLevel,
}

fn hourly_dto(h: &AggregatedHourlyForecast, units: Units) -> HourlyDto {
    HourlyDto {
        timestamp: h.timestamp,
        metrics: metrics_dto(h.metrics, units),
        confidence: h.confidence.clone(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DailyDto {
    pub date: chrono::NaiveDate,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub precipitation_total: f64,
    pub wind_speed_max: f64,
    pub wind_direction_dominant: WindDirectionDto,
    pub weather_code: u32,
    pub sunrise: chrono::DateTime<chrono::Utc>,
    pub sunset: chrono::DateTime<chrono::Utc>,
    pub confidence: ConfidenceLevel,
}

fn daily_dto(d: &AggregatedDailyForecast, units: Units) -> DailyDto {
    DailyDto {
        date: d.date,
        temperature_min: convert_temperature(d.forecast.temperature_range.min, units),
        temperature_max: convert_temperature(d.forecast.temperature_range.max, units),
        precipitation_total: convert_precipitation(d.forecast.precipitation_total.value(), units),
        wind_speed_max: convert_wind_speed(d.forecast.wind_speed_max, units),
        wind_direction_dominant: WindDirectionDto {
            degrees: d.forecast.wind_direction_dominant.degrees(),
            cardinal: d.forecast.wind_direction_dominant.cardinal(),
        },
        weather_code: d.forecast.weather_code,
        sunrise: d.forecast.sunrise,
        sunset: d.forecast.sunset,
        confidence: d.confidence.clone(),
    }
}

/// Forecast response. Top-level keys mirror spec.md §6: location,
/// generatedAt, validFrom, validTo, models, confidence, daily, and an
/// optional hourly array.
#[derive(Debug, Serialize, ToSchema)]
pub struct ForecastResponse {
    pub location: LocationDto,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub valid_from: chrono::DateTime<chrono::Utc>,
    pub valid_to: chrono::DateTime<chrono::Utc>,
    pub units: String,
    pub models: Vec<ModelWeight>,
    pub confidence: ConfidenceLevel,
    pub daily: Vec<DailyDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly: Option<Vec<HourlyDto>>,
}

#[allow(clippy::too_many_arguments)]
fn to_response(
    forecast: &AggregatedForecast,
    query: &str,
    location_name: &str,
    country: Option<String>,
    timezone: &str,
    include_hourly: bool,
    units: Units,
) -> ForecastResponse {
    ForecastResponse {
        location: LocationDto {
            query: query.to_string(),
            name: location_name.to_string(),
            country,
            coordinates: forecast.coordinates.into(),
            timezone: timezone.to_string(),
        },
        generated_at: forecast.generated_at,
        valid_from: forecast.valid_from,
        valid_to: forecast.valid_to,
        units: units_label(units).to_string(),
        models: forecast.model_weights.clone(),
        confidence: forecast.overall_confidence.clone(),
        daily: forecast.consensus.daily.iter().map(|d| daily_dto(d, units)).collect(),
        hourly: include_hourly.then(|| forecast.consensus.hourly.iter().map(|h| hourly_dto(h, units)).collect()),
    }
}

/// Fetch and aggregate a multi-model forecast for a location.
#[utoipa::path(
    get,
    path = "/api/v1/forecast",
    tag = "Forecast",
    params(ForecastQuery),
    responses(
        (status = 200, description = "Aggregated multi-model forecast", body = ForecastResponse),
        (status = 400, description = "Invalid location query", body = ErrorResponse),
        (status = 404, description = "Location not found", body = ErrorResponse),
        (status = 502, description = "Too few models responded", body = ErrorResponse),
        (status = 504, description = "Pipeline budget exceeded", body = ErrorResponse),
    )
)]
pub async fn get_forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> Result<Json<ForecastResponse>, PipelineError> {
    let config = state.pipeline.config_snapshot();
    let units = query
        .units
        .as_deref()
        .and_then(|v| Units::from_str(v).ok())
        .unwrap_or(config.units);
    let mut options = PipelineOptions::from_config(&config);
    if let Some(days) = query.days {
        options.forecast_days = days.clamp(1, 16);
    }
    if let Some(models) = &query.models {
        options.models = models.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    if query.no_cache.unwrap_or(false) {
        options.use_cache = false;
    }

    let forecast = state.pipeline.forecast(&query.location, &options, None).await?;
    let location = state
        .pipeline
        .search(&query.location, 1)
        .await
        .ok()
        .and_then(|mut r| r.pop());

    let (name, country, timezone) = location
        .map(|l| (l.name, l.country, l.timezone.as_str().to_string()))
        .unwrap_or_else(|| (query.location.clone(), None, options.timezone.clone()));

    Ok(Json(to_response(
        &forecast,
        &query.location,
        &name,
        country,
        &timezone,
        query.hourly.unwrap_or(false),
        units,
    )))
}

/// Resolve a free-text location query into geocoding candidates.
#[utoipa::path(
    get,
    path = "/api/v1/search",
    tag = "Forecast",
    params(SearchQuery),
    responses(
        (status = 200, description = "Candidate locations", body = [GeocodingResult]),
        (status = 400, description = "Invalid query", body = ErrorResponse),
    )
)]
pub async fn get_search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<GeocodingResult>>, GeocodingErrorResponse> {
    let results = state
        .pipeline
        .search(&query.q, query.limit.unwrap_or(5))
        .await
        .map_err(GeocodingErrorResponse)?;
    Ok(Json(results))
}

/// Newtype so `GeocodingError` (shared with the pipeline's `Result`
/// type) can implement `IntoResponse` without an orphan-rule conflict.
pub struct GeocodingErrorResponse(GeocodingError);

impl axum::response::IntoResponse for GeocodingErrorResponse {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            GeocodingError::InvalidInput { .. } => axum::http::StatusCode::BAD_REQUEST,
            GeocodingError::NotFound { .. } => axum::http::StatusCode::NOT_FOUND,
            GeocodingError::ServiceError { .. } => axum::http::StatusCode::BAD_GATEWAY,
        };
        (status, Json(ErrorResponse { error: self.0.to_string() })).into_response()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/forecast", get(get_forecast))
        .route("/api/v1/search", get(get_search))
        .with_state(state)
}
