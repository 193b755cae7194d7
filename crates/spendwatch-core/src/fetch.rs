//! Request-level cache glue.
//!
//! The check-cache / live-query / populate sequence every data route
//! runs through. Owns no state: it composes a [`ResponseCache`] with
//! whatever loader the route hands it (normally a pooled query).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::cache::ResponseCache;
use crate::error::{Error, Result};

/// Result of a cached fetch, carrying the freshness metadata the
/// response envelope reports.
///
/// Exactly one of `cache_age_ms` / `query_time_ms` is present:
/// `cache_age_ms` when the payload came from cache, `query_time_ms`
/// when it was computed live.
#[derive(Debug, Clone)]
pub struct FetchOutcome<T> {
    /// The payload, either cached or freshly loaded.
    pub payload: T,
    /// Whether the payload was served from cache.
    pub cached: bool,
    /// Age of the cached entry since insertion, present iff `cached`.
    pub cache_age_ms: Option<u64>,
    /// Duration of the live load, present iff not `cached`.
    pub query_time_ms: Option<u64>,
}

/// Runs the cache-or-load sequence for one request.
///
/// With `bypass` set (the request carried an explicit no-cache signal)
/// the cache read is skipped and the loader always runs; the fresh
/// result is still written back so later requests benefit.
///
/// A hit deserializes the stored value into `T`; a miss runs `load`,
/// times it, and populates the cache with `ttl`.
pub async fn cached_fetch<T, F, Fut>(
    cache: &ResponseCache,
    key: &str,
    ttl: Duration,
    bypass: bool,
    load: F,
) -> Result<FetchOutcome<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    if !bypass {
        if let Some(hit) = cache.get(key) {
            let payload = serde_json::from_value(hit.value)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            return Ok(FetchOutcome {
                payload,
                cached: true,
                cache_age_ms: Some(hit.age.as_millis() as u64),
                query_time_ms: None,
            });
        }
    }

    let started = Instant::now();
    let payload = load().await?;
    let elapsed = started.elapsed();

    let value = serde_json::to_value(&payload).map_err(|e| Error::Serialization(e.to_string()))?;
    cache.set(key, value, Some(ttl));

    Ok(FetchOutcome {
        payload,
        cached: false,
        cache_age_ms: None,
        query_time_ms: Some(elapsed.as_millis() as u64),
    })
}
