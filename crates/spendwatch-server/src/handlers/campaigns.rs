//! Campaign list handler.

use axum::extract::{Query, State};
use axum::response::Response;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use spendwatch_core::{cache_key, cached_fetch, from_rows};

use crate::error::ApiError;
use crate::handlers::cached_response;
use crate::queries::{campaigns_sql, DEFAULT_QUERY_ATTEMPTS};
use crate::types::{CampaignRow, ErrorBody, FilterParams};
use crate::AppState;

const TTL: Duration = Duration::from_secs(600);
const CACHE_CONTROL: &str = "public, s-maxage=600, stale-while-revalidate=1200";

/// Lists one advertiser's campaigns, optionally gated to those with
/// spend inside the date range.
#[utoipa::path(
    get,
    path = "/api/campaigns",
    tag = "dashboard",
    params(
        ("advertiser_id" = i64, Query, description = "Advertiser to list campaigns for"),
        ("start_date" = Option<String>, Query, description = "Range start, YYYY-MM-DD"),
        ("end_date" = Option<String>, Query, description = "Range end, YYYY-MM-DD"),
        ("nocache" = Option<bool>, Query, description = "Skip the cache and query live")
    ),
    responses(
        (status = 200, description = "Campaign list", body = Object),
        (status = 400, description = "Invalid parameters", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    )
)]
pub async fn campaigns(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Response {
    let params = match FilterParams::from_query(&raw) {
        Ok(params) => params,
        Err(e) => return e.into_response(state.dev_mode),
    };
    let Some(advertiser_id) = params.advertiser_id else {
        return ApiError::Validation("'advertiser_id' is required".to_string())
            .into_response(state.dev_mode);
    };

    let key = cache_key("bp:campaigns", &params.key_params());
    let sql = campaigns_sql(advertiser_id, &params);

    let pool = Arc::clone(&state.pool);
    let outcome = cached_fetch::<Value, _, _>(&state.cache, &key, TTL, params.nocache, || async move {
        let rows = pool.query_with_retry(&sql, DEFAULT_QUERY_ATTEMPTS).await?;
        let campaigns: Vec<CampaignRow> = from_rows(rows)?;
        Ok(json!({ "campaigns": campaigns }))
    })
    .await;

    match outcome {
        Ok(outcome) => cached_response(outcome, CACHE_CONTROL),
        Err(e) => ApiError::from(e).into_response(state.dev_mode),
    }
}
