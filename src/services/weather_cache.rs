//! Read-through weather cache.
//!
//! Keyed by subscriber location id. On a miss the cache itself fetches a
//! snapshot, classifies it and stores the display-ready result for a fixed
//! TTL. Hits are returned as stored, with no revalidation.
//!
//! Concurrent misses for the same location are single-flighted: callers
//! queue on a per-location lock and re-check the map before fetching, so a
//! location is fetched at most once per expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::errors::SourceError;
use crate::helpers::round_temp_f;
use crate::services::disposition::{Classifier, Disposition};
use crate::services::wunderground::{resolve_icon_url, WeatherSource};

/// Reference expiry for cached weather (15 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(900);

/// Classified, display-ready weather for one location.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CachedWeatherResult {
    pub disposition: Disposition,
    pub subject_line: String,
    /// Current temperature rounded to the nearest degree Fahrenheit
    pub current_temp_f: i64,
    /// Sky description, lowercased
    pub sky_description: String,
    pub icon_display_url: String,
}

/// A cache read and whether it went to the source.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub value: CachedWeatherResult,
    pub fetched: bool,
}

impl Lookup {
    fn hit(value: CachedWeatherResult) -> Self {
        Self {
            value,
            fetched: false,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedWeatherResult,
    expires_at: Instant,
}

pub struct WeatherCache {
    source: Arc<dyn WeatherSource>,
    classifier: Classifier,
    ttl: Duration,
    entries: RwLock<HashMap<i64, CacheEntry>>,
    in_flight: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
    fetches: AtomicU64,
}

/// Shared cache handle.
pub type SharedWeatherCache = Arc<WeatherCache>;

impl WeatherCache {
    pub fn new(source: Arc<dyn WeatherSource>, classifier: Classifier, ttl: Duration) -> Self {
        Self {
            source,
            classifier,
            ttl,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            fetches: AtomicU64::new(0),
        }
    }

    /// Unexpired entry for a location, if any.
    pub async fn get(&self, location_id: i64) -> Option<CachedWeatherResult> {
        let entries = self.entries.read().await;
        entries
            .get(&location_id)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    /// Return the cached result for a location, fetching and classifying on a miss.
    ///
    /// Fetch failures are propagated and never stored.
    pub async fn get_cached_or_fetch(
        &self,
        location_id: i64,
        city: &str,
        region: &str,
    ) -> Result<CachedWeatherResult, SourceError> {
        self.lookup(location_id, city, region).await.map(|l| l.value)
    }

    /// Like `get_cached_or_fetch`, but also reports whether this call hit the source.
    pub async fn lookup(
        &self,
        location_id: i64,
        city: &str,
        region: &str,
    ) -> Result<Lookup, SourceError> {
        if let Some(hit) = self.get(location_id).await {
            tracing::debug!("Weather cache hit for location {}", location_id);
            return Ok(Lookup::hit(hit));
        }

        let key_lock = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(location_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = key_lock.lock().await;

            // Another caller may have populated the entry while we waited.
            match self.get(location_id).await {
                Some(hit) => Ok(Lookup::hit(hit)),
                None => self
                    .fetch_and_store(location_id, city, region)
                    .await
                    .map(|value| Lookup {
                        value,
                        fetched: true,
                    }),
            }
        };

        {
            let mut in_flight = self.in_flight.lock().await;
            // Map + our handle; anyone else still queued keeps the lock alive.
            let ours = in_flight
                .get(&location_id)
                .is_some_and(|l| Arc::ptr_eq(l, &key_lock));
            if ours && Arc::strong_count(&key_lock) <= 2 {
                in_flight.remove(&location_id);
            }
        }

        result
    }

    async fn fetch_and_store(
        &self,
        location_id: i64,
        city: &str,
        region: &str,
    ) -> Result<CachedWeatherResult, SourceError> {
        tracing::debug!(
            "Weather cache miss for location {} ({}, {}), fetching",
            location_id,
            city,
            region
        );

        self.fetches.fetch_add(1, Ordering::Relaxed);
        let snapshot = self.source.fetch_snapshot(city, region).await?;
        tracing::debug!(
            "Fetched {}, {}: {} at {}F ({} forecast days)",
            city,
            region,
            snapshot.icon_code,
            snapshot.current_temp_f,
            snapshot.forecast.len()
        );

        let disposition = self.classifier.classify(&snapshot.classifier_inputs());
        let value = CachedWeatherResult {
            disposition,
            subject_line: self.classifier.subject_line(disposition).to_string(),
            current_temp_f: round_temp_f(snapshot.current_temp_f),
            sky_description: snapshot.sky_description.to_lowercase(),
            icon_display_url: resolve_icon_url(&snapshot.icon_code, None),
        };

        self.insert(location_id, value.clone()).await;
        Ok(value)
    }

    /// Store a result, replacing any existing entry wholesale.
    pub async fn insert(&self, location_id: i64, value: CachedWeatherResult) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.write().await.insert(location_id, entry);
    }

    /// Remove all expired entries, returning how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// How many times the source has been called since creation.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
