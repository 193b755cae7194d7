//! Aggregate metrics handler.

use axum::extract::{Query, State};
use axum::response::Response;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use spendwatch_core::{cache_key, cached_fetch, from_rows};

use crate::error::ApiError;
use crate::handlers::cached_response;
use crate::queries::{metrics_sql, DEFAULT_QUERY_ATTEMPTS};
use crate::types::{ErrorBody, FilterParams, MetricsRow};
use crate::AppState;

const TTL: Duration = Duration::from_secs(300);
const CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=600";

/// Aggregate spend metrics over the filtered range.
#[utoipa::path(
    get,
    path = "/api/metrics",
    tag = "dashboard",
    params(
        ("advertiser_id" = Option<i64>, Query, description = "Restrict to one advertiser"),
        ("campaign_id" = Option<i64>, Query, description = "Restrict to one campaign"),
        ("start_date" = Option<String>, Query, description = "Range start, YYYY-MM-DD"),
        ("end_date" = Option<String>, Query, description = "Range end, YYYY-MM-DD"),
        ("nocache" = Option<bool>, Query, description = "Skip the cache and query live")
    ),
    responses(
        (status = 200, description = "Aggregate metrics", body = Object),
        (status = 400, description = "Invalid parameters", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    )
)]
pub async fn metrics(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Response {
    let params = match FilterParams::from_query(&raw) {
        Ok(params) => params,
        Err(e) => return e.into_response(state.dev_mode),
    };

    let key = cache_key("bp:metrics", &params.key_params());
    let sql = metrics_sql(&params);

    let pool = Arc::clone(&state.pool);
    let outcome = cached_fetch::<Value, _, _>(&state.cache, &key, TTL, params.nocache, || async move {
        let rows = pool.query_with_retry(&sql, DEFAULT_QUERY_ATTEMPTS).await?;
        let mut parsed: Vec<MetricsRow> = from_rows(rows)?;
        let metrics = parsed.pop();
        Ok(json!({ "metrics": metrics }))
    })
    .await;

    match outcome {
        Ok(outcome) => cached_response(outcome, CACHE_CONTROL),
        Err(e) => ApiError::from(e).into_response(state.dev_mode),
    }
}
