//! Cache Manager (C9): content-addressed, TTL'd, single-flight
//! in-memory store for `AggregatedForecast` values, per spec.md §4.9.
//!
//! The teacher persists cached forecasts in Postgres
//! (`YrCachedResponse`, keyed by coordinates + elevation, with an
//! `expires_at` column). This crate has no database, so the same
//! key shape is reimplemented over `tokio::sync::Mutex`. Single-flight
//! is new relative to the teacher (which dedups writes via
//! `ON CONFLICT DO NOTHING`); grounded instead in spec.md §9's own
//! suggestion of "a mapping from key to a promise/future and a
//! per-map lock".

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};

use crate::aggregate::AggregatedForecast;
use crate::domain::Coordinates;

/// `(rounded latitude*1e4, rounded longitude*1e4, sorted model csv,
/// hour-bucket epoch seconds)` — deterministic per spec.md §4.9.
pub type CacheKey = (i64, i64, String, i64);

pub fn cache_key(coordinates: Coordinates, models: &[String], now: chrono::DateTime<chrono::Utc>) -> CacheKey {
    let (lat, lon) = coordinates.rounded_key();
    let mut sorted_models = models.to_vec();
    sorted_models.sort();
    let bucket = now.timestamp() / 3600 * 3600;
    (lat, lon, sorted_models.join(","), bucket)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

enum Slot {
    Ready { value: Arc<AggregatedForecast>, expires_at: Instant },
    InFlight { notify: Arc<Notify> },
}

pub struct Cache {
    enabled: bool,
    entries: Mutex<HashMap<CacheKey, Slot>>,
    stats: Mutex<CacheStats>,
}

impl Cache {
    pub fn new(enabled: bool) -> Self {
        Cache {
            enabled,
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        *self.stats.lock().await
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    /// Returns the cached value, treating expired entries as a miss and
    /// lazily evicting them.
    pub async fn get(&self, key: &CacheKey) -> Option<Arc<AggregatedForecast>> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(Slot::Ready { value, expires_at }) => {
                if *expires_at > Instant::now() {
                    let value = value.clone();
                    drop(entries);
                    self.stats.lock().await.hits += 1;
                    Some(value)
                } else {
                    entries.remove(key);
                    drop(entries);
                    let mut stats = self.stats.lock().await;
                    stats.misses += 1;
                    stats.evictions += 1;
                    None
                }
            }
            _ => {
                drop(entries);
                self.stats.lock().await.misses += 1;
                None
            }
        }
    }

    pub async fn set(&self, key: CacheKey, value: AggregatedForecast, ttl: Duration) {
        if !self.enabled {
            return;
        }
        let mut entries = self.entries.lock().await;
        entries.insert(
            key,
            Slot::Ready {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Runs `compute` at most once concurrently per key. Concurrent
    /// callers on the same key during a miss wait on the in-flight
    /// compute and observe the same result.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<AggregatedForecast>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AggregatedForecast, E>>,
    {
        if !self.enabled {
            let value = compute().await?;
            return Ok(Arc::new(value));
        }

        loop {
            let mut entries = self.entries.lock().await;
            match entries.get(&key) {
                Some(Slot::Ready { value, expires_at }) if *expires_at > Instant::now() => {
                    let value = value.clone();
                    drop(entries);
                    self.stats.lock().await.hits += 1;
                    return Ok(value);
                }
                Some(Slot::InFlight { notify }) => {
                    let notify = notify.clone();
                    drop(entries);
                    notify.notified().await;
                    continue;
                }
                _ => {
                    let notify = Arc::new(Notify::new());
                    entries.insert(key.clone(), Slot::InFlight { notify: notify.clone() });
                    drop(entries);
                    self.stats.lock().await.misses += 1;

                    let outcome = compute().await;
                    let mut entries = self.entries.lock().await;
                    match outcome {
                        Ok(value) => {
                            let value = Arc::new(value);
                            entries.insert(
                                key,
                                Slot::Ready {
                                    value: value.clone(),
                                    expires_at: Instant::now() + ttl,
                                },
                            );
                            drop(entries);
                            notify.notify_waiters();
                            return Ok(value);
                        }
                        Err(e) => {
                            entries.remove(&key);
                            drop(entries);
                            notify.notify_waiters();
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::{ConfidenceLevel, Level};
    use crate::domain::Coordinates;

    fn sample_forecast(coordinates: Coordinates) -> AggregatedForecast {
        AggregatedForecast {
            coordinates,
            generated_at: chrono::Utc::now(),
            valid_from: chrono::Utc::now(),
            valid_to: chrono::Utc::now(),
            contributing_models: vec!["gfs".to_string()],
            model_forecasts: None,
            consensus: crate::aggregate::Consensus {
                hourly: vec![],
                daily: vec![],
            },
            model_weights: vec![],
            overall_confidence: ConfidenceLevel {
                score: 1.0,
                level: Level::High,
                factors: vec![],
            },
        }
    }

    #[test]
    fn cache_key_rounds_coordinates_and_sorts_models() {
        let coordinates = Coordinates::new(53.34981, -6.26031).unwrap();
        let now = chrono::Utc::now();
        let k1 = cache_key(coordinates, &["gfs".to_string(), "ecmwf".to_string()], now);
        let k2 = cache_key(coordinates, &["ecmwf".to_string(), "gfs".to_string()], now);
        assert_eq!(k1, k2);
    }

    #[tokio::test]
    async fn disabled_cache_always_misses() {
        let cache = Cache::new(false);
        let coordinates = Coordinates::new(10.0, 10.0).unwrap();
        let key = cache_key(coordinates, &["gfs".to_string()], chrono::Utc::now());
        cache
            .set(key.clone(), sample_forecast(coordinates), Duration::from_secs(60))
            .await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn set_after_clear_does_not_resurrect_stale_value() {
        let cache = Cache::new(true);
        let coordinates = Coordinates::new(10.0, 10.0).unwrap();
        let key = cache_key(coordinates, &["gfs".to_string()], chrono::Utc::now());
        cache
            .set(key.clone(), sample_forecast(coordinates), Duration::from_secs(60))
            .await;
        cache.clear().await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_is_evicted() {
        let cache = Cache::new(true);
        let coordinates = Coordinates::new(10.0, 10.0).unwrap();
        let key = cache_key(coordinates, &["gfs".to_string()], chrono::Utc::now());
        cache
            .set(key.clone(), sample_forecast(coordinates), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn get_or_compute_runs_once_per_key_concurrently() {
        let cache = Arc::new(Cache::new(true));
        let coordinates = Coordinates::new(10.0, 10.0).unwrap();
        let key = cache_key(coordinates, &["gfs".to_string()], chrono::Utc::now());
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = cache.clone();
            let key = key.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(key, Duration::from_secs(60), || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, ()>(sample_forecast(coordinates))
                        }
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
