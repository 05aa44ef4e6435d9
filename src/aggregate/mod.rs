//! Aggregator (C7): aligns per-model time series on common timestamps,
//! computes per-metric per-timestep consensus, ranges, outliers, and
//! model weights, per spec.md §4.7.
//!
//! Grounded in the teacher's multi-step pipeline shape (fetch → extract
//! → batch-process → assemble in `resolve_race_forecasts`) and the
//! retrieval pack's `compress` function, which reduces several source
//! points into one bucket including a "most significant code" mode
//! selection directly analogous to this module's weather-code mode.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::confidence::{self, ConfidenceLevel, ConfidenceWeights, ScoreInputs};
use crate::domain::{
    CloudCover, Humidity, Millimeters, Pressure, TimezoneId, UvIndex, Visibility, WindDirection,
};
use crate::errors::AggregationError;
use crate::models::{DailyForecast, HourlyForecast, ModelForecast, WeatherMetrics};
use crate::stats::{find_outlier_indices, mean, trimmed_mean, MetricStatistics};

const OUTLIER_Z_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,
}

impl MetricRange {
    fn from_values(values: &[f64]) -> MetricRange {
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        MetricRange { min, max }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricRanges {
    pub temperature: MetricRange,
    pub feels_like: MetricRange,
    pub humidity: MetricRange,
    pub pressure: MetricRange,
    pub wind_speed: MetricRange,
    pub precipitation: MetricRange,
    pub precip_probability: MetricRange,
    pub cloud_cover: MetricRange,
    pub visibility: MetricRange,
    pub uv_index: MetricRange,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelConsensus {
    pub agreement_score: f64,
    pub models_in_agreement: BTreeSet<String>,
    pub outlier_models: BTreeSet<String>,
    pub temperature_stats: MetricStatistics,
    pub precipitation_stats: MetricStatistics,
    pub wind_stats: MetricStatistics,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AggregatedHourlyForecast {
    pub timestamp: DateTime<Utc>,
    pub metrics: WeatherMetrics,
    pub confidence: ConfidenceLevel,
    pub model_agreement: ModelConsensus,
    pub range: MetricRanges,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AggregatedDailyForecast {
    pub date: NaiveDate,
    pub forecast: DailyForecast,
    pub confidence: ConfidenceLevel,
    pub model_agreement: ModelConsensus,
    pub temperature_range: MetricRange,
    pub precipitation_range: MetricRange,
    pub wind_speed_range: MetricRange,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ModelWeight {
    pub model_id: String,
    pub weight: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Consensus {
    pub hourly: Vec<AggregatedHourlyForecast>,
    pub daily: Vec<AggregatedDailyForecast>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AggregatedForecast {
    pub coordinates: crate::domain::Coordinates,
    pub generated_at: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub contributing_models: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_forecasts: Option<Vec<ModelForecast>>,
    pub consensus: Consensus,
    pub model_weights: Vec<ModelWeight>,
    pub overall_confidence: ConfidenceLevel,
}

/// Uniform weights summing to 1 ± 1e-6, per spec.md's stated default
/// (open question resolved in the grounding ledger).
pub fn uniform_weights(model_ids: &[String]) -> Vec<ModelWeight> {
    let n = model_ids.len().max(1) as f64;
    model_ids
        .iter()
        .map(|id| ModelWeight {
            model_id: id.clone(),
            weight: 1.0 / n,
            reason: "uniform".to_string(),
        })
        .collect()
}

/// Lexicographically-smallest IANA name breaks a tie among timezones
/// reported with equal frequency (spec.md §9, open question resolved).
pub fn pick_timezone(forecasts: &[ModelForecast]) -> TimezoneId {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for f in forecasts {
        *counts.entry(f.timezone.as_str().to_string()).or_insert(0) += 1;
    }
    let max_count = counts.values().cloned().max().unwrap_or(0);
    counts
        .into_iter()
        .filter(|(_, c)| *c == max_count)
        .map(|(tz, _)| tz)
        .min()
        .map(TimezoneId::new)
        .unwrap_or_else(|| TimezoneId::new("UTC"))
}

fn required_coverage(total: usize) -> usize {
    ((total as f64) / 2.0).ceil() as usize
}

fn mode_weather_code(codes: &[u32]) -> u32 {
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for &c in codes {
        *counts.entry(c).or_insert(0) += 1;
    }
    let max_count = counts.values().cloned().max().unwrap_or(0);
    counts
        .into_iter()
        .filter(|(_, c)| *c == max_count)
        .map(|(code, _)| code)
        .min()
        .unwrap_or(0)
}

struct TimestepInputs<'a> {
    model_ids: Vec<&'a str>,
    temperature: Vec<f64>,
    feels_like: Vec<f64>,
    humidity: Vec<f64>,
    pressure: Vec<f64>,
    wind_speed: Vec<f64>,
    wind_direction: Vec<WindDirection>,
    precipitation: Vec<f64>,
    precip_probability: Vec<f64>,
    cloud_cover: Vec<f64>,
    visibility: Vec<f64>,
    uv_index: Vec<f64>,
    weather_code: Vec<u32>,
}

fn consensus_from_inputs(inputs: &TimestepInputs, total_models: usize) -> (WeatherMetrics, MetricRanges, ModelConsensus) {
    let temperature_stats = MetricStatistics::compute(&inputs.temperature);
    let precipitation_stats = MetricStatistics::compute(&inputs.precipitation);
    let wind_stats = MetricStatistics::compute(&inputs.wind_speed);

    let outlier_idx = find_outlier_indices(&inputs.temperature, OUTLIER_Z_THRESHOLD);
    let mut models_in_agreement = BTreeSet::new();
    let mut outlier_models = BTreeSet::new();
    for (i, id) in inputs.model_ids.iter().enumerate() {
        if outlier_idx.contains(&i) {
            outlier_models.insert(id.to_string());
        } else {
            models_in_agreement.insert(id.to_string());
        }
    }
    let agreement_score = if total_models == 0 {
        0.0
    } else {
        models_in_agreement.len() as f64 / total_models as f64
    };

    let metrics = WeatherMetrics {
        temperature: trimmed_mean(&inputs.temperature),
        feels_like: trimmed_mean(&inputs.feels_like),
        humidity: Humidity::new(trimmed_mean(&inputs.humidity).clamp(0.0, 100.0)).unwrap_or(Humidity::new(0.0).unwrap()),
        pressure: Pressure::new(trimmed_mean(&inputs.pressure).max(f64::MIN_POSITIVE)).unwrap_or(Pressure::new(1013.0).unwrap()),
        wind_speed: trimmed_mean(&inputs.wind_speed),
        wind_direction: WindDirection::circular_mean(&inputs.wind_direction),
        precipitation: Millimeters::clamped(trimmed_mean(&inputs.precipitation)),
        precip_probability: trimmed_mean(&inputs.precip_probability).clamp(0.0, 1.0),
        cloud_cover: CloudCover::new(trimmed_mean(&inputs.cloud_cover).clamp(0.0, 100.0)).unwrap_or(CloudCover::new(0.0).unwrap()),
        visibility: Visibility::new(trimmed_mean(&inputs.visibility).max(0.0)).unwrap_or(Visibility::new(0.0).unwrap()),
        uv_index: UvIndex::new(trimmed_mean(&inputs.uv_index).max(0.0)).unwrap_or(UvIndex::new(0.0).unwrap()),
        weather_code: mode_weather_code(&inputs.weather_code),
    };

    let ranges = MetricRanges {
        temperature: MetricRange::from_values(&inputs.temperature),
        feels_like: MetricRange::from_values(&inputs.feels_like),
        humidity: MetricRange::from_values(&inputs.humidity),
        pressure: MetricRange::from_values(&inputs.pressure),
        wind_speed: MetricRange::from_values(&inputs.wind_speed),
        precipitation: MetricRange::from_values(&inputs.precipitation),
        precip_probability: MetricRange::from_values(&inputs.precip_probability),
        cloud_cover: MetricRange::from_values(&inputs.cloud_cover),
        visibility: MetricRange::from_values(&inputs.visibility),
        uv_index: MetricRange::from_values(&inputs.uv_index),
    };

    let consensus = ModelConsensus {
        agreement_score,
        models_in_agreement,
        outlier_models,
        temperature_stats,
        precipitation_stats,
        wind_stats,
    };

    (metrics, ranges, consensus)
}

fn aggregate_hourly(forecasts: &[ModelForecast], weights: &ConfidenceWeights) -> Vec<AggregatedHourlyForecast> {
    let total_models = forecasts.len();
    let mut by_timestamp: BTreeMap<DateTime<Utc>, Vec<(&str, &HourlyForecast)>> = BTreeMap::new();
    for f in forecasts {
        for h in &f.hourly {
            by_timestamp.entry(h.timestamp).or_default().push((f.model_id.as_str(), h));
        }
    }

    let required = required_coverage(total_models);
    let generated_at = forecasts.iter().map(|f| f.generated_at).min().unwrap_or_else(Utc::now);

    let mut result = Vec::new();
    for (timestamp, entries) in by_timestamp {
        if entries.len() < required {
            continue;
        }
        let mut sorted_entries = entries;
        sorted_entries.sort_by_key(|(id, _)| id.to_string());

        let inputs = TimestepInputs {
            model_ids: sorted_entries.iter().map(|(id, _)| *id).collect(),
            temperature: sorted_entries.iter().map(|(_, h)| h.metrics.temperature).collect(),
            feels_like: sorted_entries.iter().map(|(_, h)| h.metrics.feels_like).collect(),
            humidity: sorted_entries.iter().map(|(_, h)| h.metrics.humidity.value()).collect(),
            pressure: sorted_entries.iter().map(|(_, h)| h.metrics.pressure.hpa()).collect(),
            wind_speed: sorted_entries.iter().map(|(_, h)| h.metrics.wind_speed).collect(),
            wind_direction: sorted_entries.iter().map(|(_, h)| h.metrics.wind_direction).collect(),
            precipitation: sorted_entries.iter().map(|(_, h)| h.metrics.precipitation.value()).collect(),
            precip_probability: sorted_entries.iter().map(|(_, h)| h.metrics.precip_probability).collect(),
            cloud_cover: sorted_entries.iter().map(|(_, h)| h.metrics.cloud_cover.value()).collect(),
            visibility: sorted_entries.iter().map(|(_, h)| h.metrics.visibility.meters()).collect(),
            uv_index: sorted_entries.iter().map(|(_, h)| h.metrics.uv_index.value()).collect(),
            weather_code: sorted_entries.iter().map(|(_, h)| h.metrics.weather_code).collect(),
        };

        let (metrics, ranges, model_agreement) = consensus_from_inputs(&inputs, total_models);

        let days_ahead = (timestamp - generated_at).num_hours() as f64 / 24.0;
        let score_inputs = ScoreInputs {
            spread_std_dev: if total_models > 1 {
                Some(model_agreement.temperature_stats.std_dev)
            } else {
                None
            },
            spread_high_thr: 1.0,
            spread_low_thr: 5.0,
            range: Some(ranges.temperature.max - ranges.temperature.min),
            range_high_thr: 2.0,
            range_low_thr: 10.0,
            days_ahead: days_ahead.max(0.0),
            models_in_agreement: model_agreement.models_in_agreement.len(),
            total_models,
        };
        let confidence = confidence::score(&score_inputs, weights);

        result.push(AggregatedHourlyForecast {
            timestamp,
            metrics,
            confidence,
            model_agreement,
            range: ranges,
        });
    }
    result.sort_by_key(|h| h.timestamp);
    result
}

fn aggregate_daily(
    forecasts: &[ModelForecast],
    hourly: &[AggregatedHourlyForecast],
    weights: &ConfidenceWeights,
) -> Vec<AggregatedDailyForecast> {
    let total_models = forecasts.len();
    let mut by_date: BTreeMap<NaiveDate, Vec<(&str, &DailyForecast)>> = BTreeMap::new();
    for f in forecasts {
        for d in &f.daily {
            by_date.entry(d.date).or_default().push((f.model_id.as_str(), d));
        }
    }
    let required = required_coverage(total_models);
    let generated_at = forecasts.iter().map(|f| f.generated_at).min().unwrap_or_else(Utc::now);

    let mut result = Vec::new();
    for (date, entries) in by_date {
        if entries.len() < required {
            continue;
        }
        let mut sorted_entries = entries;
        sorted_entries.sort_by_key(|(id, _)| id.to_string());

        let temp_min: Vec<f64> = sorted_entries.iter().map(|(_, d)| d.temperature_range.min).collect();
        let temp_max: Vec<f64> = sorted_entries.iter().map(|(_, d)| d.temperature_range.max).collect();
        let precip_total: Vec<f64> = sorted_entries.iter().map(|(_, d)| d.precipitation_total.value()).collect();
        let wind_max: Vec<f64> = sorted_entries.iter().map(|(_, d)| d.wind_speed_max).collect();
        let wind_dir: Vec<WindDirection> = sorted_entries.iter().map(|(_, d)| d.wind_direction_dominant).collect();
        let codes: Vec<u32> = sorted_entries.iter().map(|(_, d)| d.weather_code).collect();
        let uv_max: Vec<f64> = sorted_entries.iter().map(|(_, d)| d.uv_index_max.value()).collect();

        // Sunrise/sunset: majority model (first model alphabetically among the mode timestamp).
        let sunrise = majority_instant(sorted_entries.iter().map(|(_, d)| d.sunrise));
        let sunset = majority_instant(sorted_entries.iter().map(|(_, d)| d.sunset));

        let day_start = chrono::TimeZone::from_utc_datetime(&Utc, &date.and_hms_opt(0, 0, 0).unwrap());
        let day_end = chrono::TimeZone::from_utc_datetime(&Utc, &date.and_hms_opt(23, 59, 59).unwrap());
        let hourly_subset: Vec<HourlyForecast> = hourly
            .iter()
            .filter(|h| h.timestamp >= day_start && h.timestamp <= day_end)
            .map(|h| HourlyForecast {
                timestamp: h.timestamp,
                metrics: h.metrics,
            })
            .collect();

        let mean_min = trimmed_mean(&temp_min);
        let mean_max = trimmed_mean(&temp_max);
        let daylight_hours = (sunset - sunrise).num_minutes() as f64 / 60.0;

        let forecast = DailyForecast {
            date,
            temperature_range: crate::models::TemperatureRange { min: mean_min, max: mean_max },
            humidity_range: crate::models::humidity_range_from_hourly(&hourly_subset),
            pressure_range: crate::models::pressure_range_from_hourly(&hourly_subset),
            precipitation_total: Millimeters::clamped(trimmed_mean(&precip_total)),
            wind_speed_max: trimmed_mean(&wind_max),
            wind_direction_dominant: WindDirection::circular_mean(&wind_dir),
            cloud_cover_mean: crate::models::cloud_cover_mean_from_hourly(&hourly_subset),
            uv_index_max: UvIndex::new(trimmed_mean(&uv_max).max(0.0)).unwrap_or(UvIndex::new(0.0).unwrap()),
            sunrise,
            sunset,
            daylight_hours: daylight_hours.max(0.0),
            weather_code: mode_weather_code(&codes),
            hourly: hourly_subset,
        };

        let temp_all: Vec<f64> = temp_min.iter().chain(temp_max.iter()).cloned().collect();
        let temperature_stats = MetricStatistics::compute(&temp_all);
        let precipitation_stats = MetricStatistics::compute(&precip_total);
        let wind_stats = MetricStatistics::compute(&wind_max);

        let outlier_idx = find_outlier_indices(&temp_max, OUTLIER_Z_THRESHOLD);
        let mut models_in_agreement = BTreeSet::new();
        let mut outlier_models = BTreeSet::new();
        for (i, (id, _)) in sorted_entries.iter().enumerate() {
            if outlier_idx.contains(&i) {
                outlier_models.insert(id.to_string());
            } else {
                models_in_agreement.insert(id.to_string());
            }
        }
        let agreement_score = if total_models == 0 {
            0.0
        } else {
            models_in_agreement.len() as f64 / total_models as f64
        };

        let days_ahead = (day_start - generated_at).num_hours() as f64 / 24.0;
        let score_inputs = ScoreInputs {
            spread_std_dev: if total_models > 1 { Some(temperature_stats.std_dev) } else { None },
            spread_high_thr: 1.0,
            spread_low_thr: 5.0,
            range: Some(temperature_stats.range),
            range_high_thr: 2.0,
            range_low_thr: 10.0,
            days_ahead: days_ahead.max(0.0),
            models_in_agreement: models_in_agreement.len(),
            total_models,
        };
        let confidence = confidence::score(&score_inputs, weights);

        result.push(AggregatedDailyForecast {
            date,
            forecast,
            confidence,
            model_agreement: ModelConsensus {
                agreement_score,
                models_in_agreement,
                outlier_models,
                temperature_stats,
                precipitation_stats,
                wind_stats,
            },
            temperature_range: MetricRange::from_values(&temp_all),
            precipitation_range: MetricRange::from_values(&precip_total),
            wind_speed_range: MetricRange::from_values(&wind_max),
        });
    }
    result.sort_by_key(|d| d.date);
    result
}

fn majority_instant(values: impl Iterator<Item = DateTime<Utc>>) -> DateTime<Utc> {
    let mut counts: BTreeMap<DateTime<Utc>, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let max_count = counts.values().cloned().max().unwrap_or(0);
    counts
        .into_iter()
        .filter(|(_, c)| *c == max_count)
        .map(|(v, _)| v)
        .min()
        .unwrap_or_else(Utc::now)
}

/// `aggregate(forecasts) -> AggregatedForecast | AggregationError`, per
/// spec.md §4.7. Empty input fails with `EmptyForecasts`.
pub fn aggregate(
    mut forecasts: Vec<ModelForecast>,
    weights: &ConfidenceWeights,
    retain_model_forecasts: bool,
) -> Result<AggregatedForecast, AggregationError> {
    if forecasts.is_empty() {
        return Err(AggregationError::EmptyForecasts);
    }
    forecasts.sort_by(|a, b| a.model_id.cmp(&b.model_id));

    let coordinates = forecasts[0].coordinates;
    if forecasts.iter().any(|f| f.coordinates.rounded_key() != coordinates.rounded_key()) {
        return Err(AggregationError::IncoherentForecasts {
            reason: "contributing models disagree on coordinates".to_string(),
        });
    }

    let contributing_models: Vec<String> = forecasts.iter().map(|f| f.model_id.clone()).collect();
    let model_weights = uniform_weights(&contributing_models);

    let hourly = aggregate_hourly(&forecasts, weights);
    let daily = aggregate_daily(&forecasts, &hourly, weights);

    if hourly.is_empty() && forecasts.iter().any(|f| !f.hourly.is_empty()) {
        return Err(AggregationError::IncoherentForecasts {
            reason: "no hourly timestamp reached the coverage threshold".to_string(),
        });
    }

    let generated_at = forecasts.iter().map(|f| f.generated_at).min().unwrap_or_else(Utc::now);
    let valid_from = forecasts.iter().map(|f| f.valid_from).min().unwrap_or(generated_at);
    let valid_to = forecasts.iter().map(|f| f.valid_to).max().unwrap_or(generated_at);

    let total_models = forecasts.len();
    let total_agreement: usize = hourly
        .iter()
        .map(|h| h.model_agreement.models_in_agreement.len())
        .sum();
    let overall_agreement_fraction = if hourly.is_empty() || total_models == 0 {
        1.0
    } else {
        total_agreement as f64 / (hourly.len() * total_models) as f64
    };
    let overall_std_dev = if hourly.is_empty() {
        0.0
    } else {
        mean(&hourly.iter().map(|h| h.model_agreement.temperature_stats.std_dev).collect::<Vec<_>>())
    };
    let earliest_horizon = hourly
        .first()
        .map(|h| (h.timestamp - generated_at).num_hours() as f64 / 24.0)
        .unwrap_or(0.0)
        .max(0.0);

    let overall_inputs = ScoreInputs {
        spread_std_dev: if total_models > 1 { Some(overall_std_dev) } else { None },
        spread_high_thr: 1.0,
        spread_low_thr: 5.0,
        range: None,
        range_high_thr: 2.0,
        range_low_thr: 10.0,
        days_ahead: earliest_horizon,
        models_in_agreement: (overall_agreement_fraction * total_models as f64).round() as usize,
        total_models,
    };
    let overall_confidence = confidence::score(&overall_inputs, weights);

    Ok(AggregatedForecast {
        coordinates,
        generated_at,
        valid_from,
        valid_to,
        contributing_models,
        model_forecasts: if retain_model_forecasts { Some(forecasts) } else { None },
        consensus: Consensus { hourly, daily },
        model_weights,
        overall_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coordinates;

    fn sample_hourly(model: &str, base: DateTime<Utc>, temps: &[f64]) -> ModelForecast {
        let hourly = temps
            .iter()
            .enumerate()
            .map(|(i, &t)| HourlyForecast {
                timestamp: base + chrono::Duration::hours(i as i64),
                metrics: WeatherMetrics {
                    temperature: t,
                    feels_like: t,
                    humidity: Humidity::new(50.0).unwrap(),
                    pressure: Pressure::new(1013.0).unwrap(),
                    wind_speed: 5.0,
                    wind_direction: WindDirection::new(90.0),
                    precipitation: Millimeters::clamped(0.0),
                    precip_probability: 0.1,
                    cloud_cover: CloudCover::new(20.0).unwrap(),
                    visibility: Visibility::new(10_000.0).unwrap(),
                    uv_index: UvIndex::new(2.0).unwrap(),
                    weather_code: 1,
                },
            })
            .collect();
        ModelForecast {
            model_id: model.to_string(),
            coordinates: Coordinates::new(53.35, -6.26).unwrap(),
            timezone: TimezoneId::new("Europe/Dublin"),
            generated_at: base,
            valid_from: base,
            valid_to: base,
            hourly,
            daily: vec![],
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(
            aggregate(vec![], &ConfidenceWeights::default(), false).unwrap_err(),
            AggregationError::EmptyForecasts
        );
    }

    #[test]
    fn trimmed_mean_excludes_the_outlier_model() {
        let base = Utc::now();
        let forecasts = vec![
            sample_hourly("a", base, &[20.0]),
            sample_hourly("b", base, &[20.0]),
            sample_hourly("c", base, &[20.0]),
            sample_hourly("d", base, &[20.0]),
            sample_hourly("e", base, &[50.0]),
        ];
        let result = aggregate(forecasts, &ConfidenceWeights::default(), false).unwrap();
        let first_hour = &result.consensus.hourly[0];
        assert!((first_hour.metrics.temperature - 20.0).abs() < 1e-9);
        assert_eq!(first_hour.model_agreement.outlier_models.len(), 1);
        assert!(first_hour.model_agreement.outlier_models.contains("e"));
        assert!((first_hour.model_agreement.agreement_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn model_weights_sum_to_one() {
        let base = Utc::now();
        let forecasts = vec![sample_hourly("a", base, &[10.0]), sample_hourly("b", base, &[12.0])];
        let result = aggregate(forecasts, &ConfidenceWeights::default(), false).unwrap();
        let sum: f64 = result.model_weights.iter().map(|w| w.weight).sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(result.model_weights.iter().all(|w| w.weight > 0.0));
    }

    #[test]
    fn range_contains_consensus_value() {
        let base = Utc::now();
        let forecasts = vec![
            sample_hourly("a", base, &[10.0]),
            sample_hourly("b", base, &[12.0]),
            sample_hourly("c", base, &[14.0]),
        ];
        let result = aggregate(forecasts, &ConfidenceWeights::default(), false).unwrap();
        for h in &result.consensus.hourly {
            assert!(h.range.temperature.min <= h.metrics.temperature);
            assert!(h.metrics.temperature <= h.range.temperature.max);
        }
    }

    #[test]
    fn timestamps_below_half_coverage_are_dropped() {
        let base = Utc::now();
        // 4 models: one hour only covered by 1/4 should be dropped, but
        // constructing that requires differing hourly lengths.
        let mut a = sample_hourly("a", base, &[10.0, 11.0]);
        let b = sample_hourly("b", base, &[10.0]);
        let c = sample_hourly("c", base, &[10.0]);
        let d = sample_hourly("d", base, &[10.0]);
        a.hourly[1].timestamp = base + chrono::Duration::hours(5);
        let result = aggregate(vec![a, b, c, d], &ConfidenceWeights::default(), false).unwrap();
        assert_eq!(result.consensus.hourly.len(), 1);
    }

    #[test]
    fn retains_model_forecasts_only_when_requested() {
        let base = Utc::now();
        let forecasts = vec![sample_hourly("a", base, &[10.0])];
        let without = aggregate(forecasts.clone(), &ConfidenceWeights::default(), false).unwrap();
        assert!(without.model_forecasts.is_none());
        let with = aggregate(forecasts, &ConfidenceWeights::default(), true).unwrap();
        assert!(with.model_forecasts.is_some());
    }

    #[test]
    fn pick_timezone_breaks_ties_lexicographically() {
        let base = Utc::now();
        let mut a = sample_hourly("a", base, &[10.0]);
        let mut b = sample_hourly("b", base, &[10.0]);
        a.timezone = TimezoneId::new("Europe/Zurich");
        b.timezone = TimezoneId::new("Europe/Dublin");
        let picked = pick_timezone(&[a, b]);
        assert_eq!(picked.as_str(), "Europe/Dublin");
    }

    #[test]
    fn mode_weather_code_ties_broken_by_lowest_code() {
        assert_eq!(mode_weather_code(&[3, 3, 1, 1]), 1);
        assert_eq!(mode_weather_code(&[]), 0);
    }
}
