//! Fan-out Coordinator (C5): runs N Model Fetchers concurrently and
//! collects successes/failures without letting one cancel the others.
//!
//! Grounded in the teacher's `resolve_race_forecasts`, which fans out
//! over `futures::stream::buffer_unordered` and collects a `Result` per
//! item without short-circuiting on individual failure.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::domain::Coordinates;
use crate::errors::ApiError;
use crate::pipeline::CancellationToken;

use super::fetcher::ModelFetcher;
use super::retry::RetryPolicy;
use super::{FetchOptions, ModelForecast};

const MAX_CONCURRENT_FETCHES: usize = 8;

#[derive(Debug, Clone)]
pub struct ModelFailure {
    pub model: String,
    pub error: ApiError,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct FanOutResult {
    pub successes: Vec<ModelForecast>,
    pub failures: Vec<ModelFailure>,
    pub fetched_at: DateTime<Utc>,
    pub total_duration: Duration,
    pub success_rate: f64,
}

/// Optional pacing between fetch starts, to respect upstream rate
/// limits (spec.md §4.5).
#[derive(Debug, Clone, Copy, Default)]
pub struct FanOutOptions {
    pub request_delay: Option<Duration>,
}

pub async fn fetch_many(
    fetcher: &ModelFetcher,
    models: &[String],
    coordinates: Coordinates,
    fetch_options: &FetchOptions,
    retry_policy: &RetryPolicy,
    fanout_options: &FanOutOptions,
    cancellation: Option<&CancellationToken>,
) -> FanOutResult {
    let fetched_at = Utc::now();
    let start = Instant::now();

    let tasks = models.to_vec().into_iter().enumerate().map(|(k, model)| {
        let delay = fanout_options.request_delay.map(|d| d * k as u32);
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let attempt_start = Instant::now();
            let outcome = match cancellation {
                Some(token) => {
                    tokio::select! {
                        outcome = fetcher.fetch_one(&model, coordinates, fetch_options, retry_policy) => outcome,
                        _ = token.cancelled() => Err(ApiError::Cancelled { model: model.clone() }),
                    }
                }
                None => fetcher.fetch_one(&model, coordinates, fetch_options, retry_policy).await,
            };
            (model, outcome, attempt_start.elapsed())
        }
    });

    let results: Vec<_> = stream::iter(tasks)
        .buffer_unordered(MAX_CONCURRENT_FETCHES)
        .collect()
        .await;

    let mut successes = Vec::new();
    let mut failures = Vec::new();
    for (model, outcome, duration) in results {
        match outcome {
            Ok(forecast) => successes.push(forecast),
            Err(error) => failures.push(ModelFailure {
                model,
                error,
                duration,
            }),
        }
    }

    successes.sort_by(|a, b| a.model_id.cmp(&b.model_id));
    failures.sort_by(|a, b| a.model.cmp(&b.model));

    let requested = models.len();
    let success_rate = if requested == 0 {
        0.0
    } else {
        successes.len() as f64 / requested as f64
    };

    tracing::info!(
        requested,
        succeeded = successes.len(),
        failed = failures.len(),
        success_rate,
        "fan-out complete"
    );

    FanOutResult {
        successes,
        failures,
        fetched_at,
        total_duration: start.elapsed(),
        success_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_model_lands_in_exactly_one_bucket() {
        let fetcher = ModelFetcher::new(reqwest::Client::new());
        let coordinates = Coordinates::new(10.0, 10.0).unwrap();
        let models = vec!["not-a-model-a".to_string(), "not-a-model-b".to_string()];
        let result = fetch_many(
            &fetcher,
            &models,
            coordinates,
            &FetchOptions::default(),
            &RetryPolicy::default(),
            &FanOutOptions::default(),
            None,
        )
        .await;
        assert_eq!(result.successes.len() + result.failures.len(), models.len());
        assert_eq!(result.success_rate, 0.0);
    }

    #[tokio::test]
    async fn pre_cancelled_token_surfaces_cancelled_failures() {
        // A registered model id, so `fetch_one` actually suspends at an
        // await point (DNS/connect) instead of failing synchronously —
        // the already-cancelled token then deterministically wins the
        // race regardless of network availability.
        let fetcher = ModelFetcher::new(reqwest::Client::new());
        let coordinates = Coordinates::new(10.0, 10.0).unwrap();
        let models = vec!["gfs".to_string()];
        let token = CancellationToken::new();
        token.cancel();
        let result = fetch_many(
            &fetcher,
            &models,
            coordinates,
            &FetchOptions::default(),
            &RetryPolicy::default(),
            &FanOutOptions::default(),
            Some(&token),
        )
        .await;
        assert_eq!(result.failures.len(), 1);
        assert!(matches!(result.failures[0].error, ApiError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn empty_model_list_has_zero_success_rate_not_nan() {
        let fetcher = ModelFetcher::new(reqwest::Client::new());
        let coordinates = Coordinates::new(0.0, 0.0).unwrap();
        let result = fetch_many(
            &fetcher,
            &[],
            coordinates,
            &FetchOptions::default(),
            &RetryPolicy::default(),
            &FanOutOptions::default(),
            None,
        )
        .await;
        assert_eq!(result.success_rate, 0.0);
        assert!(result.successes.is_empty() && result.failures.is_empty());
    }
}
