//! Model Fetcher (C4): one model's forecast request, parsed and
//! unit-normalized, behind the retry policy of `retry.rs`.
//!
//! Grounded in the teacher's `YrClient::fetch_timeseries` for the
//! single-deserialize-then-extract shape and its `unwrap_or_warn`
//! pattern for defaulting missing mandatory fields.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::domain::{
    CloudCover, Coordinates, Humidity, Millimeters, Pressure, TimezoneId, UvIndex, Visibility,
    WindDirection,
};
use crate::errors::ApiError;

use super::registry;
use super::retry::RetryPolicy;
use super::{DailyForecast, FetchOptions, HourlyForecast, ModelForecast, TemperatureRange, WeatherMetrics};

const HOURLY_VARS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,\
precipitation_probability,precipitation,weather_code,pressure_msl,cloud_cover,visibility,\
wind_speed_10m,wind_direction_10m,uv_index";

const DAILY_VARS: &str = "weather_code,temperature_2m_max,temperature_2m_min,precipitation_sum,\
wind_speed_10m_max,wind_direction_10m_dominant,uv_index_max,sunrise,sunset,daylight_duration";

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    #[serde(default)]
    apparent_temperature: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<u32>>,
    #[serde(default)]
    pressure_msl: Vec<Option<f64>>,
    #[serde(default)]
    cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    visibility: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    uv_index: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    #[serde(default)]
    weather_code: Vec<Option<u32>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m_dominant: Vec<Option<f64>>,
    #[serde(default)]
    uv_index_max: Vec<Option<f64>>,
    #[serde(default)]
    sunrise: Vec<Option<String>>,
    #[serde(default)]
    sunset: Vec<Option<String>>,
    #[serde(default)]
    daylight_duration: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    reason: Option<String>,
    timezone: Option<String>,
    hourly: Option<HourlyBlock>,
    daily: Option<DailyBlock>,
}

/// Returns `default` and logs a warning when `value` is absent — mirrors
/// the teacher's `unwrap_or_warn` closure in `yr.rs`.
fn unwrap_or_warn<T: Copy>(value: Option<T>, default: T, model: &str, field: &str) -> T {
    match value {
        Some(v) => v,
        None => {
            tracing::warn!(model, field, "missing field in upstream response, defaulting");
            default
        }
    }
}

fn parse_hour(s: &str) -> Option<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    parse_hour(s)
}

fn random_unit_fraction() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1_000) as f64 / 1_000.0
}

/// Parses a `Retry-After` header value: either an integer delay in
/// seconds, or an HTTP-date (RFC 7231 IMF-fixdate, e.g. "Wed, 21 Oct
/// 2026 07:28:00 GMT"), converted to a delay relative to now. A date in
/// the past clamps to zero rather than going negative.
fn parse_retry_after(value: &str) -> Option<u64> {
    let trimmed = value.trim();
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Some(secs);
    }
    let without_zone = trimmed.strip_suffix("GMT").unwrap_or(trimmed).trim();
    let when = NaiveDateTime::parse_from_str(without_zone, "%a, %d %b %Y %H:%M:%S")
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .or_else(|| DateTime::parse_from_rfc2822(trimmed).ok().map(|dt| dt.with_timezone(&Utc)))?;
    Some((when - Utc::now()).num_seconds().max(0) as u64)
}

#[derive(Debug, Clone)]
pub struct ModelFetcher {
    client: reqwest::Client,
}

impl ModelFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        ModelFetcher { client }
    }

    fn build_request(&self, endpoint: &registry::ModelEndpoint, coordinates: Coordinates, options: &FetchOptions) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .get(endpoint.path_template)
            .query(&[
                ("latitude", coordinates.latitude.value().to_string()),
                ("longitude", coordinates.longitude.value().to_string()),
                ("hourly", HOURLY_VARS.to_string()),
                ("daily", DAILY_VARS.to_string()),
                ("timezone", options.timezone.clone()),
                ("forecast_days", options.forecast_days.to_string()),
            ])
            .timeout(Duration::from_millis(options.timeout_ms));
        if endpoint.requires_models_param {
            req = req.query(&[("models", endpoint.variant)]);
        }
        req
    }

    /// Single attempt, no retry. `fetch_one` wraps this with the policy.
    async fn attempt(
        &self,
        model_id: &str,
        endpoint: &registry::ModelEndpoint,
        coordinates: Coordinates,
        options: &FetchOptions,
    ) -> Result<ModelForecast, ApiError> {
        let response = self
            .build_request(endpoint, coordinates, options)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout {
                        model: model_id.to_string(),
                    }
                } else {
                    ApiError::NetworkError {
                        model: model_id.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(ApiError::RateLimited {
                model: model_id.to_string(),
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::RequestFailed {
                model: model_id.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let body: OpenMeteoResponse = response.json().await.map_err(|e| ApiError::Decode {
            model: model_id.to_string(),
            reason: e.to_string(),
        })?;

        if body.error {
            return Err(ApiError::InvalidResponse {
                model: model_id.to_string(),
                reason: body.reason.unwrap_or_else(|| "upstream reported error:true".to_string()),
            });
        }

        self.to_model_forecast(model_id, coordinates, body)
    }

    fn to_model_forecast(
        &self,
        model_id: &str,
        coordinates: Coordinates,
        body: OpenMeteoResponse,
    ) -> Result<ModelForecast, ApiError> {
        let timezone = TimezoneId::new(body.timezone.unwrap_or_else(|| "UTC".to_string()));
        let hourly_block = body.hourly.ok_or_else(|| ApiError::InvalidResponse {
            model: model_id.to_string(),
            reason: "missing hourly block".to_string(),
        })?;

        let mut hourly = Vec::with_capacity(hourly_block.time.len());
        for i in 0..hourly_block.time.len() {
            let Some(timestamp) = parse_hour(&hourly_block.time[i]) else {
                continue;
            };
            let temperature = unwrap_or_warn(hourly_block.temperature_2m.get(i).copied().flatten(), 0.0, model_id, "temperature_2m");
            let feels_like = unwrap_or_warn(hourly_block.apparent_temperature.get(i).copied().flatten(), temperature, model_id, "apparent_temperature");
            let humidity_raw = unwrap_or_warn(hourly_block.relative_humidity_2m.get(i).copied().flatten(), 0.0, model_id, "relative_humidity_2m");
            let pressure_raw = unwrap_or_warn(hourly_block.pressure_msl.get(i).copied().flatten(), 1013.0, model_id, "pressure_msl");
            let wind_kmh = unwrap_or_warn(hourly_block.wind_speed_10m.get(i).copied().flatten(), 0.0, model_id, "wind_speed_10m");
            let wind_dir = unwrap_or_warn(hourly_block.wind_direction_10m.get(i).copied().flatten(), 0.0, model_id, "wind_direction_10m");
            let precip_raw = unwrap_or_warn(hourly_block.precipitation.get(i).copied().flatten(), 0.0, model_id, "precipitation");
            let precip_prob = unwrap_or_warn(hourly_block.precipitation_probability.get(i).copied().flatten(), 0.0, model_id, "precipitation_probability");
            let cloud_raw = unwrap_or_warn(hourly_block.cloud_cover.get(i).copied().flatten(), 0.0, model_id, "cloud_cover");
            let visibility_raw = unwrap_or_warn(hourly_block.visibility.get(i).copied().flatten(), 10_000.0, model_id, "visibility");
            let uv_raw = unwrap_or_warn(hourly_block.uv_index.get(i).copied().flatten(), 0.0, model_id, "uv_index");
            let weather_code = unwrap_or_warn(hourly_block.weather_code.get(i).copied().flatten(), 0, model_id, "weather_code");

            let metrics = WeatherMetrics {
                temperature,
                feels_like,
                humidity: Humidity::new(humidity_raw.clamp(0.0, 100.0)).unwrap_or(Humidity::new(0.0).unwrap()),
                pressure: Pressure::new(pressure_raw.max(f64::MIN_POSITIVE)).unwrap_or(Pressure::new(1013.0).unwrap()),
                wind_speed: wind_kmh / 3.6,
                wind_direction: WindDirection::new(wind_dir),
                precipitation: Millimeters::clamped(precip_raw),
                precip_probability: (precip_prob / 100.0).clamp(0.0, 1.0),
                cloud_cover: CloudCover::new(cloud_raw.clamp(0.0, 100.0)).unwrap_or(CloudCover::new(0.0).unwrap()),
                visibility: Visibility::new(visibility_raw.max(0.0)).unwrap_or(Visibility::new(10_000.0).unwrap()),
                uv_index: UvIndex::new(uv_raw.max(0.0)).unwrap_or(UvIndex::new(0.0).unwrap()),
                weather_code,
            };
            hourly.push(HourlyForecast { timestamp, metrics });
        }
        hourly.sort_by_key(|h| h.timestamp);
        hourly.dedup_by_key(|h| h.timestamp);

        let mut daily = Vec::new();
        if let Some(daily_block) = body.daily {
            for i in 0..daily_block.time.len() {
                let Some(date) = parse_date(&daily_block.time[i]) else {
                    continue;
                };
                let temp_max = unwrap_or_warn(daily_block.temperature_2m_max.get(i).copied().flatten(), 0.0, model_id, "temperature_2m_max");
                let temp_min = unwrap_or_warn(daily_block.temperature_2m_min.get(i).copied().flatten(), 0.0, model_id, "temperature_2m_min");
                let precip_total = unwrap_or_warn(daily_block.precipitation_sum.get(i).copied().flatten(), 0.0, model_id, "precipitation_sum");
                let wind_max_kmh = unwrap_or_warn(daily_block.wind_speed_10m_max.get(i).copied().flatten(), 0.0, model_id, "wind_speed_10m_max");
                let wind_dom = unwrap_or_warn(daily_block.wind_direction_10m_dominant.get(i).copied().flatten(), 0.0, model_id, "wind_direction_10m_dominant");
                let uv_max = unwrap_or_warn(daily_block.uv_index_max.get(i).copied().flatten(), 0.0, model_id, "uv_index_max");
                let daylight_secs = unwrap_or_warn(daily_block.daylight_duration.get(i).copied().flatten(), 0.0, model_id, "daylight_duration");
                let code = unwrap_or_warn(daily_block.weather_code.get(i).copied().flatten(), 0, model_id, "weather_code");
                let sunrise = daily_block
                    .sunrise
                    .get(i)
                    .and_then(|o| o.as_deref())
                    .and_then(parse_instant)
                    .unwrap_or_else(|| date.and_hms_opt(6, 0, 0).map(|n| Utc.from_utc_datetime(&n)).unwrap());
                let sunset = daily_block
                    .sunset
                    .get(i)
                    .and_then(|o| o.as_deref())
                    .and_then(parse_instant)
                    .unwrap_or_else(|| date.and_hms_opt(18, 0, 0).map(|n| Utc.from_utc_datetime(&n)).unwrap());

                let day_start = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
                let day_end = Utc.from_utc_datetime(&date.and_hms_opt(23, 59, 59).unwrap());
                let hourly_subset: Vec<HourlyForecast> = hourly
                    .iter()
                    .copied()
                    .filter(|h| h.timestamp >= day_start && h.timestamp <= day_end)
                    .collect();

                daily.push(DailyForecast {
                    date,
                    temperature_range: TemperatureRange {
                        min: temp_min,
                        max: temp_max,
                    },
                    humidity_range: super::humidity_range_from_hourly(&hourly_subset),
                    pressure_range: super::pressure_range_from_hourly(&hourly_subset),
                    precipitation_total: Millimeters::clamped(precip_total),
                    wind_speed_max: wind_max_kmh / 3.6,
                    wind_direction_dominant: WindDirection::new(wind_dom),
                    cloud_cover_mean: super::cloud_cover_mean_from_hourly(&hourly_subset),
                    uv_index_max: UvIndex::new(uv_max.max(0.0)).unwrap_or(UvIndex::new(0.0).unwrap()),
                    sunrise,
                    sunset,
                    daylight_hours: daylight_secs / 3600.0,
                    weather_code: code,
                    hourly: hourly_subset,
                });
            }
        }
        daily.sort_by_key(|d| d.date);
        daily.dedup_by_key(|d| d.date);

        let valid_from = hourly.first().map(|h| h.timestamp).unwrap_or_else(Utc::now);
        let valid_to = hourly.last().map(|h| h.timestamp).unwrap_or(valid_from);

        Ok(ModelForecast {
            model_id: model_id.to_string(),
            coordinates,
            timezone,
            generated_at: Utc::now(),
            valid_from,
            valid_to,
            hourly,
            daily,
        })
    }

    /// Fetches, retrying transient failures per `policy` (spec.md §4.4).
    pub async fn fetch_one(
        &self,
        model_id: &str,
        coordinates: Coordinates,
        options: &FetchOptions,
        policy: &RetryPolicy,
    ) -> Result<ModelForecast, ApiError> {
        let endpoint = registry::lookup(model_id).ok_or_else(|| ApiError::ServiceUnavailable {
            model: model_id.to_string(),
        })?;

        let mut attempts_made = 0;
        loop {
            attempts_made += 1;
            match self.attempt(model_id, endpoint, coordinates, options).await {
                Ok(forecast) => return Ok(forecast),
                Err(err) => {
                    if !policy.should_retry(attempts_made, &err) {
                        return Err(err);
                    }
                    let delay = match &err {
                        ApiError::RateLimited {
                            retry_after_secs: Some(secs),
                            ..
                        } => Duration::from_secs(*secs),
                        _ => policy.delay_for(attempts_made, random_unit_fraction()),
                    };
                    tracing::debug!(model = model_id, attempt = attempts_made, ?delay, "retrying after transient failure");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
