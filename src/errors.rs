//! Failure Taxonomy (C11).
//!
//! Every error variant carries (a) the originating query or model
//! identifier, (b) a classified kind via `transient()`, (c) a
//! human-readable message through `Display`, and (d) the underlying
//! cause where applicable. Exit codes and message formatting beyond
//! that are adapter concerns (spec.md §7).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

pub use crate::domain::InvalidScalar;

/// Standard error response body for the HTTP adapter.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Geocoding failures (C2).
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeocodingError {
    #[error("invalid geocoding query '{query}': {reason}")]
    InvalidInput { query: String, reason: String },

    #[error("no geocoding results for '{query}'")]
    NotFound { query: String },

    #[error("geocoding service error for '{query}': {underlying}")]
    ServiceError { query: String, underlying: String },
}

impl GeocodingError {
    pub fn query(&self) -> &str {
        match self {
            GeocodingError::InvalidInput { query, .. } => query,
            GeocodingError::NotFound { query } => query,
            GeocodingError::ServiceError { query, .. } => query,
        }
    }
}

/// Model fetch failures (C4). `transient()` distinguishes kinds C5 should
/// retry from kinds that are fatal to the single model's attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("request to model '{model}' timed out")]
    Timeout { model: String },

    #[error("model '{model}' rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited {
        model: String,
        retry_after_secs: Option<u64>,
    },

    #[error("network error contacting model '{model}': {message}")]
    NetworkError { model: String, message: String },

    #[error("model '{model}' request failed with HTTP {status}: {message}")]
    RequestFailed {
        model: String,
        status: u16,
        message: String,
    },

    #[error("model '{model}' returned an invalid response: {reason}")]
    InvalidResponse { model: String, reason: String },

    #[error("failed to decode response from model '{model}': {reason}")]
    Decode { model: String, reason: String },

    #[error("model '{model}' is unavailable")]
    ServiceUnavailable { model: String },

    #[error("request to model '{model}' was cancelled")]
    Cancelled { model: String },
}

impl ApiError {
    pub fn model(&self) -> &str {
        match self {
            ApiError::Timeout { model }
            | ApiError::RateLimited { model, .. }
            | ApiError::NetworkError { model, .. }
            | ApiError::RequestFailed { model, .. }
            | ApiError::InvalidResponse { model, .. }
            | ApiError::Decode { model, .. }
            | ApiError::ServiceUnavailable { model }
            | ApiError::Cancelled { model } => model,
        }
    }

    /// Transient kinds are retried by C4, up to the retry policy's limit,
    /// then surfaced to C5 as a per-model failure. C5 never retries across
    /// models (spec.md §4.5, §7).
    pub fn transient(&self) -> bool {
        match self {
            ApiError::Timeout { .. }
            | ApiError::NetworkError { .. }
            | ApiError::RateLimited { .. }
            | ApiError::ServiceUnavailable { .. } => true,
            ApiError::RequestFailed { status, .. } => *status == 429 || *status >= 500,
            ApiError::InvalidResponse { .. } | ApiError::Decode { .. } => false,
            ApiError::Cancelled { .. } => false,
        }
    }
}

/// Aggregation failures (C7).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AggregationError {
    #[error("cannot aggregate an empty set of forecasts")]
    EmptyForecasts,

    #[error("incoherent forecasts: {reason}")]
    IncoherentForecasts { reason: String },
}

/// Cooperative cancellation, distinct from a `Timeout` (spec.md §4.11).
#[derive(Debug, Clone, thiserror::Error)]
#[error("operation cancelled")]
pub struct CancelError;

/// Top-level pipeline failure (C10).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("geocoding failed: {0}")]
    Geocoding(#[from] GeocodingError),

    #[error("all {} requested models failed", .failures.len())]
    AllModelsFailed { failures: Vec<(String, ApiError)> },

    #[error("aggregation failed: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("pipeline wall-clock budget exceeded")]
    Timeout,

    #[error(transparent)]
    Cancelled(#[from] CancelError),
}

impl PipelineError {
    pub fn transient(&self) -> bool {
        match self {
            PipelineError::Geocoding(GeocodingError::ServiceError { .. }) => true,
            PipelineError::AllModelsFailed { failures } => {
                failures.iter().any(|(_, e)| e.transient())
            }
            PipelineError::Timeout => true,
            PipelineError::Geocoding(_) | PipelineError::Aggregation(_) => false,
            PipelineError::Cancelled(_) => false,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            PipelineError::Geocoding(GeocodingError::InvalidInput { .. }) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            PipelineError::Geocoding(GeocodingError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            PipelineError::Geocoding(GeocodingError::ServiceError { .. }) => {
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            PipelineError::AllModelsFailed { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            PipelineError::Aggregation(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            PipelineError::Timeout => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            PipelineError::Cancelled(_) => (StatusCode::from_u16(499).unwrap(), self.to_string()),
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_transient_classification() {
        assert!(ApiError::Timeout {
            model: "gfs".into()
        }
        .transient());
        assert!(ApiError::RequestFailed {
            model: "gfs".into(),
            status: 503,
            message: "".into()
        }
        .transient());
        assert!(ApiError::RequestFailed {
            model: "gfs".into(),
            status: 429,
            message: "".into()
        }
        .transient());
        assert!(!ApiError::RequestFailed {
            model: "gfs".into(),
            status: 404,
            message: "".into()
        }
        .transient());
        assert!(!ApiError::Decode {
            model: "gfs".into(),
            reason: "bad json".into()
        }
        .transient());
    }

    #[test]
    fn cancelled_is_not_transient() {
        let err = ApiError::Cancelled { model: "gfs".into() };
        assert_eq!(err.model(), "gfs");
        assert!(!err.transient());
    }

    #[test]
    fn pipeline_error_echoes_query_on_geocoding_failure() {
        let err = GeocodingError::NotFound {
            query: "Nowhere".into(),
        };
        assert_eq!(err.query(), "Nowhere");
    }

    #[test]
    fn all_models_failed_is_transient_if_any_failure_is() {
        let err = PipelineError::AllModelsFailed {
            failures: vec![(
                "gfs".into(),
                ApiError::RequestFailed {
                    model: "gfs".into(),
                    status: 404,
                    message: "".into(),
                },
            ),
            (
                "icon".into(),
                ApiError::Timeout { model: "icon".into() },
            )],
        };
        assert!(err.transient());
    }
}
