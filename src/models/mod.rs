//! Per-model forecast types (C4/C5) and the fan-out coordinator.

pub mod fanout;
pub mod fetcher;
pub mod registry;
pub mod retry;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    CloudCover, Coordinates, Humidity, Millimeters, Pressure, TimezoneId, UvIndex, Visibility,
    WindDirection,
};
use crate::stats;

/// One timestep's worth of weather, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherMetrics {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: Humidity,
    pub pressure: Pressure,
    pub wind_speed: f64,
    pub wind_direction: WindDirection,
    pub precipitation: Millimeters,
    /// Fraction in `[0, 1]`, not a percent.
    pub precip_probability: f64,
    pub cloud_cover: CloudCover,
    pub visibility: Visibility,
    pub uv_index: UvIndex,
    pub weather_code: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HourlyForecast {
    pub timestamp: DateTime<Utc>,
    pub metrics: WeatherMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HumidityRange {
    pub min: Humidity,
    pub max: Humidity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PressureRange {
    pub min: Pressure,
    pub max: Pressure,
}

/// Derives a day's humidity range from its hourly subset, per spec.md
/// §3/§4.7. An empty subset falls back to the full physical range rather
/// than a single reading, since no real bound was observed.
pub(crate) fn humidity_range_from_hourly(hourly: &[HourlyForecast]) -> HumidityRange {
    let values: Vec<f64> = hourly.iter().map(|h| h.metrics.humidity.value()).collect();
    if values.is_empty() {
        return HumidityRange {
            min: Humidity::new(0.0).unwrap(),
            max: Humidity::new(100.0).unwrap(),
        };
    }
    let (min, max) = stats::min_max(&values);
    HumidityRange {
        min: Humidity::new(min).unwrap_or(Humidity::new(0.0).unwrap()),
        max: Humidity::new(max).unwrap_or(Humidity::new(100.0).unwrap()),
    }
}

/// Derives a day's pressure range from its hourly subset. An empty
/// subset falls back to standard sea-level pressure, matching the
/// fetcher's own missing-field default.
pub(crate) fn pressure_range_from_hourly(hourly: &[HourlyForecast]) -> PressureRange {
    let values: Vec<f64> = hourly.iter().map(|h| h.metrics.pressure.hpa()).collect();
    if values.is_empty() {
        let standard = Pressure::new(1013.0).unwrap();
        return PressureRange { min: standard, max: standard };
    }
    let (min, max) = stats::min_max(&values);
    PressureRange {
        min: Pressure::new(min).unwrap_or(Pressure::new(1013.0).unwrap()),
        max: Pressure::new(max).unwrap_or(Pressure::new(1013.0).unwrap()),
    }
}

/// Derives a day's mean cloud cover from its hourly subset.
pub(crate) fn cloud_cover_mean_from_hourly(hourly: &[HourlyForecast]) -> CloudCover {
    let values: Vec<f64> = hourly.iter().map(|h| h.metrics.cloud_cover.value()).collect();
    CloudCover::new(stats::mean(&values).clamp(0.0, 100.0)).unwrap_or(CloudCover::new(0.0).unwrap())
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temperature_range: TemperatureRange,
    pub humidity_range: HumidityRange,
    pub pressure_range: PressureRange,
    pub precipitation_total: Millimeters,
    pub wind_speed_max: f64,
    pub wind_direction_dominant: WindDirection,
    pub cloud_cover_mean: CloudCover,
    pub uv_index_max: UvIndex,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    pub daylight_hours: f64,
    pub weather_code: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hourly: Vec<HourlyForecast>,
}

/// One model's complete forecast for a location, as produced by C4 and
/// consumed by C7. `validFrom ≤ hourly[0].timestamp`; `hourly` is
/// strictly increasing by timestamp; `daily` strictly increasing by date.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelForecast {
    pub model_id: String,
    pub coordinates: Coordinates,
    pub timezone: TimezoneId,
    pub generated_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
}

impl ModelForecast {
    pub fn is_temporally_coherent(&self) -> bool {
        if self.valid_from > self.hourly.first().map(|h| h.timestamp).unwrap_or(self.valid_from) {
            return false;
        }
        self.hourly.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
            && self.daily.windows(2).all(|w| w[0].date < w[1].date)
    }
}

/// Fetch options shared by C4/C5/C10.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub forecast_days: u32,
    pub timezone: String,
    pub timeout_ms: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions {
            forecast_days: 7,
            timezone: "auto".to_string(),
            timeout_ms: 30_000,
        }
    }
}
