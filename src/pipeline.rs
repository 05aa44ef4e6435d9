//! Pipeline Orchestrator (C10): binds C2 → C5 → C7 → C8 → C9, per
//! spec.md §4.10.
//!
//! Grounded in the teacher's `main.rs` wiring (one struct binding the
//! shared clients, consumed by handler-level orchestration functions)
//! and `routes/forecasts.rs`'s single orchestration function calling
//! into services in sequence before mapping to a response type.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::aggregate::{self, AggregatedForecast};
use crate::cache::{cache_key, Cache};
use crate::config::OracleConfig;
use crate::confidence::ConfidenceWeights;
use crate::domain::Coordinates;
use crate::errors::{ApiError, GeocodingError, PipelineError};
use crate::geocoding::{Geocoder, Location};
use crate::models::fanout::{fetch_many, FanOutOptions};
use crate::models::fetcher::ModelFetcher;
use crate::models::registry::known_model_ids;
use crate::models::FetchOptions;

/// Cooperative cancellation signal. Hand-rolled over `tokio::sync::Notify`
/// since `tokio-util`'s `CancellationToken` is not in the teacher's
/// dependency set (spec.md §9: "Implement using tasks/channels, thread
/// pools, or structured concurrency").
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    notify: Arc<Notify>,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Resolves once `cancel()` is called. The `notified()` future is
    /// created before the flag check so a `cancel()` racing in between
    /// can't be lost (tokio::sync::Notify's documented wait pattern).
    pub async fn cancelled(&self) {
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub models: Vec<String>,
    pub forecast_days: u32,
    pub timezone: String,
    pub min_success_rate: f64,
    pub confidence_weights: ConfidenceWeights,
    pub budget: Duration,
    pub retain_model_forecasts: bool,
    pub use_cache: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &OracleConfig) -> Self {
        let models: Vec<String> = known_model_ids().into_iter().map(String::from).collect();
        PipelineOptions {
            min_success_rate: config.min_success_rate.unwrap_or(1.0 / models.len().max(1) as f64),
            models,
            forecast_days: config.default_forecast_days,
            timezone: config.default_timezone.clone(),
            confidence_weights: config.confidence_weights,
            budget: config.pipeline_budget,
            retain_model_forecasts: false,
            use_cache: config.cache_enabled,
        }
    }
}

pub struct Pipeline {
    geocoder: Geocoder,
    fetcher: ModelFetcher,
    cache: Cache,
    config: OracleConfig,
}

impl Pipeline {
    pub fn new(client: reqwest::Client, config: OracleConfig) -> Self {
        Pipeline {
            geocoder: Geocoder::new(client.clone()),
            fetcher: ModelFetcher::new(client),
            cache: Cache::new(config.cache_enabled),
            config,
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Exposes the pipeline's configuration so adapters can derive
    /// per-request `PipelineOptions` without duplicating defaults.
    pub fn config_snapshot(&self) -> OracleConfig {
        self.config.clone()
    }

    async fn run_fanout_and_aggregate(
        &self,
        coordinates: Coordinates,
        options: &PipelineOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<AggregatedForecast, PipelineError> {
        let fetch_options = FetchOptions {
            forecast_days: options.forecast_days,
            timezone: options.timezone.clone(),
            timeout_ms: 30_000,
        };

        let fanout = fetch_many(
            &self.fetcher,
            &options.models,
            coordinates,
            &fetch_options,
            &self.config.retry_policy,
            &FanOutOptions {
                request_delay: self.config.request_delay,
            },
            cancellation,
        )
        .await;

        if fanout.success_rate < options.min_success_rate {
            let failures: Vec<(String, ApiError)> =
                fanout.failures.into_iter().map(|f| (f.model, f.error)).collect();
            return Err(PipelineError::AllModelsFailed { failures });
        }

        aggregate::aggregate(fanout.successes, &options.confidence_weights, options.retain_model_forecasts)
            .map_err(PipelineError::from)
    }

    /// `forecast(query, models?, options?) -> AggregatedForecast | PipelineError`.
    pub async fn forecast(
        &self,
        query: &str,
        options: &PipelineOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<AggregatedForecast, PipelineError> {
        let budget_result = tokio::time::timeout(options.budget, self.forecast_inner(query, options, cancellation)).await;
        match budget_result {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout),
        }
    }

    async fn forecast_inner(
        &self,
        query: &str,
        options: &PipelineOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<AggregatedForecast, PipelineError> {
        if let Some(token) = cancellation {
            if token.is_cancelled() {
                return Err(PipelineError::Cancelled(crate::errors::CancelError));
            }
        }

        let resolved = match cancellation {
            Some(token) => tokio::select! {
                result = self.geocoder.resolve(query) => result.map_err(PipelineError::Geocoding)?,
                _ = token.cancelled() => return Err(PipelineError::Cancelled(crate::errors::CancelError)),
            },
            None => self.geocoder.resolve(query).await.map_err(PipelineError::Geocoding)?,
        };
        let location = Location {
            original_query: query.to_string(),
            resolved: resolved.clone(),
        };

        if let Some(token) = cancellation {
            if token.is_cancelled() {
                return Err(PipelineError::Cancelled(crate::errors::CancelError));
            }
        }

        let coordinates = location.resolved.coordinates;
        let key = cache_key(coordinates, &options.models, chrono::Utc::now());

        if !options.use_cache {
            return self.run_fanout_and_aggregate(coordinates, options, cancellation).await;
        }

        let result = self
            .cache
            .get_or_compute(key, self.config.cache_ttl, || {
                self.run_fanout_and_aggregate(coordinates, options, cancellation)
            })
            .await?;

        Ok((*result).clone())
    }

    /// `search(query, limit) -> [GeocodingResult]`.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<crate::geocoding::GeocodingResult>, GeocodingError> {
        self.geocoder.search(query, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_options_default_min_success_rate_is_one_over_model_count() {
        let config = OracleConfig::default();
        let options = PipelineOptions::from_config(&config);
        let expected = 1.0 / options.models.len() as f64;
        assert!((options.min_success_rate - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cancellation_token_reports_cancelled_after_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts_before_geocoding_completes() {
        // A query long enough to reach the real HTTP call, which suspends
        // at an await point — the already-cancelled token then
        // deterministically wins the race, regardless of network
        // availability.
        let pipeline = Pipeline::new(reqwest::Client::new(), OracleConfig::default());
        let mut options = PipelineOptions::from_config(&pipeline.config.clone());
        options.models = vec!["ecmwf".to_string()];
        let token = CancellationToken::new();
        token.cancel();
        let err = pipeline.forecast("Zurich", &options, Some(&token)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled(_)));
    }

    #[tokio::test]
    async fn forecast_surfaces_geocoding_not_found() {
        let pipeline = Pipeline::new(reqwest::Client::new(), OracleConfig::default());
        let mut options = PipelineOptions::from_config(&pipeline.config.clone());
        options.models = vec!["ecmwf".to_string()];
        // Query too short triggers InvalidInput before any network call.
        let err = pipeline.forecast("a", &options, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Geocoding(GeocodingError::InvalidInput { .. })));
    }
}
