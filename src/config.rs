//! Configuration, parsed from environment variables, per SPEC_FULL.md's
//! ambient-stack section and spec.md §6. Grounded in the teacher's
//! `AppConfig::from_env` (env reads with `.unwrap_or_else` defaults and
//! `.expect` for the one required value).

use std::str::FromStr;
use std::time::Duration;

use crate::confidence::ConfidenceWeights;
use crate::models::retry::RetryPolicy;

/// Unit system for adapter-facing rendering, per spec.md §6. The pipeline
/// and aggregator always operate in metric/SI; conversion happens only at
/// the HTTP/CLI boundary (`adapters::http`, `bin/weather_oracle_cli`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Metric,
    Imperial,
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "metric" => Ok(Units::Metric),
            "imperial" => Ok(Units::Imperial),
            other => Err(format!("unrecognized units '{other}', expected 'metric' or 'imperial'")),
        }
    }
}

/// Application-wide configuration. Per-request options (`models`,
/// `forecastDays`, ...) layer on top of these defaults at the adapter
/// boundary rather than overriding them globally.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub port: u16,
    pub user_agent: String,
    pub default_forecast_days: u32,
    pub default_timezone: String,
    pub units: Units,
    pub request_delay: Option<Duration>,
    pub retry_policy: RetryPolicy,
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub min_success_rate: Option<f64>,
    pub confidence_weights: ConfidenceWeights,
    pub pipeline_budget: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        OracleConfig {
            port: 8080,
            user_agent: "weather-oracle/0.1".to_string(),
            default_forecast_days: 7,
            default_timezone: "auto".to_string(),
            units: Units::default(),
            request_delay: None,
            retry_policy: RetryPolicy::default(),
            cache_enabled: true,
            cache_ttl: Duration::from_secs(3600),
            min_success_rate: None,
            confidence_weights: ConfidenceWeights::default(),
            pipeline_budget: Duration::from_secs(90),
        }
    }
}

impl OracleConfig {
    pub fn from_env() -> Self {
        let defaults = OracleConfig::default();
        OracleConfig {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            user_agent: std::env::var("WEATHER_ORACLE_USER_AGENT").unwrap_or(defaults.user_agent),
            default_forecast_days: std::env::var("WEATHER_ORACLE_FORECAST_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_forecast_days)
                .clamp(1, 16),
            default_timezone: std::env::var("WEATHER_ORACLE_TIMEZONE").unwrap_or(defaults.default_timezone),
            units: std::env::var("WEATHER_ORACLE_UNITS")
                .ok()
                .and_then(|v| Units::from_str(&v).ok())
                .unwrap_or(defaults.units),
            request_delay: std::env::var("WEATHER_ORACLE_REQUEST_DELAY_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis),
            retry_policy: RetryPolicy {
                max_attempts: std::env::var("WEATHER_ORACLE_RETRY_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.retry_policy.max_attempts),
                ..defaults.retry_policy
            },
            cache_enabled: std::env::var("WEATHER_ORACLE_CACHE_ENABLED")
                .ok()
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.cache_enabled),
            cache_ttl: std::env::var("WEATHER_ORACLE_CACHE_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            min_success_rate: std::env::var("WEATHER_ORACLE_MIN_SUCCESS_RATE")
                .ok()
                .and_then(|v| v.parse().ok()),
            confidence_weights: defaults.confidence_weights,
            pipeline_budget: std::env::var("WEATHER_ORACLE_PIPELINE_BUDGET_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.pipeline_budget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_match_spec() {
        let config = OracleConfig::default();
        assert_eq!(config.default_forecast_days, 7);
        assert_eq!(config.cache_ttl, Duration::from_secs(3600));
        assert!(config.cache_enabled);
        assert_eq!(config.pipeline_budget, Duration::from_secs(90));
    }

    #[test]
    fn from_env_falls_back_to_defaults() {
        unsafe {
            std::env::remove_var("PORT");
            std::env::remove_var("WEATHER_ORACLE_USER_AGENT");
            std::env::remove_var("WEATHER_ORACLE_FORECAST_DAYS");
        }
        let config = OracleConfig::from_env();
        assert_eq!(config.port, 8080);
        assert!(config.user_agent.contains("weather-oracle"));
        assert_eq!(config.default_forecast_days, 7);
    }

    #[test]
    fn units_from_str_is_case_insensitive() {
        assert_eq!(Units::from_str("Metric").unwrap(), Units::Metric);
        assert_eq!(Units::from_str("IMPERIAL").unwrap(), Units::Imperial);
        assert!(Units::from_str("kelvin").is_err());
    }

    #[test]
    fn from_env_reads_units_override() {
        unsafe {
            std::env::set_var("WEATHER_ORACLE_UNITS", "imperial");
        }
        let config = OracleConfig::from_env();
        assert_eq!(config.units, Units::Imperial);
        unsafe {
            std::env::remove_var("WEATHER_ORACLE_UNITS");
        }
    }

    #[test]
    fn from_env_parses_overrides() {
        unsafe {
            std::env::set_var("WEATHER_ORACLE_FORECAST_DAYS", "20");
        }
        let config = OracleConfig::from_env();
        assert_eq!(config.default_forecast_days, 16, "forecastDays clamps to the documented 1-16 range");
        unsafe {
            std::env::remove_var("WEATHER_ORACLE_FORECAST_DAYS");
        }
    }
}
