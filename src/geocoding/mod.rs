//! Geocoder (C2): resolves free-text queries against Open-Meteo's
//! geocoding endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Coordinates, TimezoneId};
use crate::errors::GeocodingError;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

/// One candidate location returned by the geocoding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeocodingResult {
    pub name: String,
    pub coordinates: Coordinates,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub timezone: TimezoneId,
    pub elevation: Option<f64>,
    pub population: Option<u64>,
}

/// A resolved query: the original user text plus the best-match result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub original_query: String,
    pub resolved: GeocodingResult,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    name: String,
    latitude: f64,
    longitude: f64,
    elevation: Option<f64>,
    country: Option<String>,
    country_code: Option<String>,
    admin1: Option<String>,
    timezone: Option<String>,
    population: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Option<Vec<RawResult>>,
}

/// Thin async client over the Open-Meteo geocoding endpoint. Mirrors the
/// shape of the model clients (fixed base URL, shared `reqwest::Client`).
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    base_url: String,
}

impl Geocoder {
    pub fn new(client: reqwest::Client) -> Self {
        Geocoder {
            client,
            base_url: GEOCODING_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Geocoder {
            client,
            base_url: base_url.into(),
        }
    }

    fn validate_query(query: &str) -> Result<&str, GeocodingError> {
        let trimmed = query.trim();
        if trimmed.len() < 2 || trimmed.len() > 200 {
            return Err(GeocodingError::InvalidInput {
                query: query.to_string(),
                reason: "query length must be between 2 and 200 characters".to_string(),
            });
        }
        Ok(trimmed)
    }

    async fn fetch_results(
        &self,
        query: &str,
        count: u32,
    ) -> Result<Vec<GeocodingResult>, GeocodingError> {
        let trimmed = Self::validate_query(query)?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("name", trimmed),
                ("count", &count.to_string()),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| GeocodingError::ServiceError {
                query: query.to_string(),
                underlying: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(GeocodingError::ServiceError {
                query: query.to_string(),
                underlying: format!("HTTP {}", response.status()),
            });
        }

        let body: GeocodingResponse =
            response
                .json()
                .await
                .map_err(|e| GeocodingError::ServiceError {
                    query: query.to_string(),
                    underlying: e.to_string(),
                })?;

        let raw = body.results.unwrap_or_default();
        let mut results = Vec::with_capacity(raw.len());
        for r in raw {
            match Coordinates::new(r.latitude, r.longitude) {
                Ok(coordinates) => results.push(GeocodingResult {
                    name: r.name,
                    coordinates,
                    country: r.country,
                    country_code: r.country_code,
                    region: r.admin1,
                    timezone: TimezoneId::new(r.timezone.unwrap_or_else(|| "UTC".to_string())),
                    elevation: r.elevation,
                    population: r.population,
                }),
                Err(_) => {
                    tracing::warn!(query, "geocoding provider returned invalid coordinates, skipping result");
                }
            }
        }
        Ok(results)
    }

    /// Resolve `query` to its single best match.
    pub async fn resolve(&self, query: &str) -> Result<GeocodingResult, GeocodingError> {
        let results = self.fetch_results(query, 1).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| GeocodingError::NotFound {
                query: query.to_string(),
            })
    }

    /// Search for up to `limit` matches. Zero results is not an error.
    pub async fn search(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<GeocodingResult>, GeocodingError> {
        self.fetch_results(query, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn rejects_too_short_query() {
        let err = Geocoder::validate_query(" a ").unwrap_err();
        assert!(matches!(err, GeocodingError::InvalidInput { .. }));
    }

    #[test]
    fn rejects_too_long_query() {
        let long = "a".repeat(201);
        assert!(Geocoder::validate_query(&long).is_err());
    }

    #[test]
    fn accepts_boundary_lengths() {
        assert!(Geocoder::validate_query("ab").is_ok());
        assert!(Geocoder::validate_query(&"a".repeat(200)).is_ok());
    }

    #[tokio::test]
    async fn resolve_returns_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {
                        "name": "Dublin",
                        "latitude": 53.3498,
                        "longitude": -6.2603,
                        "country": "Ireland",
                        "country_code": "IE",
                        "admin1": "Leinster",
                        "timezone": "Europe/Dublin",
                        "population": 1_173_179u64
                    }
                ]
            })))
            .mount(&server)
            .await;

        let geocoder = Geocoder::with_base_url(reqwest::Client::new(), format!("{}/v1/search", server.uri()));
        let result = geocoder.resolve("Dublin, Ireland").await.unwrap();
        assert_eq!(result.name, "Dublin");
        assert_eq!(result.timezone.as_str(), "Europe/Dublin");
    }

    #[tokio::test]
    async fn resolve_surfaces_not_found_on_empty_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let geocoder = Geocoder::with_base_url(reqwest::Client::new(), format!("{}/v1/search", server.uri()));
        let err = geocoder.resolve("Nowhereville").await.unwrap_err();
        assert!(matches!(err, GeocodingError::NotFound { .. }));
    }

    #[tokio::test]
    async fn search_returns_empty_list_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let geocoder = Geocoder::with_base_url(reqwest::Client::new(), format!("{}/v1/search", server.uri()));
        let results = geocoder.search("Nowhereville", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn fetch_errors_collapse_to_service_error() {
        let geocoder = Geocoder::with_base_url(reqwest::Client::new(), "http://127.0.0.1:0/v1/search");
        let err = geocoder.resolve("Dublin").await.unwrap_err();
        assert!(matches!(err, GeocodingError::ServiceError { .. }));
    }
}
