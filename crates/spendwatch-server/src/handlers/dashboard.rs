//! Main dashboard data handler.

use axum::extract::{Query, State};
use axum::response::Response;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use spendwatch_core::{cache_key, cached_fetch, from_rows};

use crate::error::ApiError;
use crate::handlers::cached_response;
use crate::queries::{dashboard_sql, DEFAULT_QUERY_ATTEMPTS};
use crate::types::{DashboardRow, ErrorBody, FilterParams};
use crate::AppState;

const TTL: Duration = Duration::from_secs(300);
const CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=600";

/// The main dashboard rollup: one row per advertiser-day, with spend
/// depletion, spike and blocking figures.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    tag = "dashboard",
    params(
        ("advertiser_id" = Option<i64>, Query, description = "Restrict to one advertiser"),
        ("campaign_id" = Option<i64>, Query, description = "Restrict to one campaign"),
        ("start_date" = Option<String>, Query, description = "Range start, YYYY-MM-DD"),
        ("end_date" = Option<String>, Query, description = "Range end, YYYY-MM-DD"),
        ("page" = Option<u32>, Query, description = "1-based page number"),
        ("limit" = Option<u32>, Query, description = "Page size, up to 10000"),
        ("nocache" = Option<bool>, Query, description = "Skip the cache and query live")
    ),
    responses(
        (status = 200, description = "Dashboard rows with metadata", body = Object),
        (status = 400, description = "Invalid parameters", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    )
)]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Response {
    let params = match FilterParams::from_query(&raw) {
        Ok(params) => params,
        Err(e) => return e.into_response(state.dev_mode),
    };

    let key = cache_key("bp:data", &params.key_params());
    let sql = dashboard_sql(&params);
    let filters_applied = json!({
        "date_range": params.has_date_range(),
        "advertiser": params.advertiser_id.is_some(),
        "campaign": params.campaign_id.is_some(),
    });

    let pool = Arc::clone(&state.pool);
    let outcome = cached_fetch::<Value, _, _>(&state.cache, &key, TTL, params.nocache, || async move {
        let started = Instant::now();
        let rows = pool.query_with_retry(&sql, DEFAULT_QUERY_ATTEMPTS).await?;
        let data: Vec<DashboardRow> = from_rows(rows)?;
        let total_rows = data.len();

        Ok(json!({
            "data": data,
            "metadata": {
                "total_rows": total_rows,
                "query_time_ms": started.elapsed().as_millis() as u64,
                "filters_applied": filters_applied,
            }
        }))
    })
    .await;

    match outcome {
        Ok(outcome) => cached_response(outcome, CACHE_CONTROL),
        Err(e) => ApiError::from(e).into_response(state.dev_mode),
    }
}
