//! Advertiser list handler.

use axum::extract::{Query, State};
use axum::response::Response;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use spendwatch_core::{cache_key, cached_fetch, from_rows};

use crate::error::ApiError;
use crate::handlers::cached_response;
use crate::queries::{ADVERTISERS_SQL, DEFAULT_QUERY_ATTEMPTS};
use crate::types::{AdvertiserRow, ErrorBody};
use crate::AppState;

const TTL: Duration = Duration::from_secs(3600);
const CACHE_CONTROL: &str = "public, s-maxage=3600, stale-while-revalidate=7200";

/// Lists advertisers enrolled in burst protection.
///
/// The list changes rarely; it is cached for an hour under a
/// parameterless key.
#[utoipa::path(
    get,
    path = "/api/advertisers",
    tag = "dashboard",
    params(
        ("nocache" = Option<bool>, Query, description = "Skip the cache and query live")
    ),
    responses(
        (status = 200, description = "Advertiser list", body = Object),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    )
)]
pub async fn advertisers(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Response {
    let nocache = raw.get("nocache").is_some_and(|v| v == "true");
    let key = cache_key("bp:advertisers", &Map::new());

    let pool = Arc::clone(&state.pool);
    let outcome = cached_fetch::<Value, _, _>(&state.cache, &key, TTL, nocache, || async move {
        let rows = pool
            .query_with_retry(ADVERTISERS_SQL, DEFAULT_QUERY_ATTEMPTS)
            .await?;
        let advertisers: Vec<AdvertiserRow> = from_rows(rows)?;
        Ok(json!({ "advertisers": advertisers }))
    })
    .await;

    match outcome {
        Ok(outcome) => cached_response(outcome, CACHE_CONTROL),
        Err(e) => ApiError::from(e).into_response(state.dev_mode),
    }
}
