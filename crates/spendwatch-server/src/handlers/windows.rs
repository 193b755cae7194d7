//! Blocking windows handler.

use axum::extract::{Query, State};
use axum::response::Response;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use spendwatch_core::{cache_key, cached_fetch, from_rows};

use crate::error::ApiError;
use crate::handlers::cached_response;
use crate::queries::{windows_sql, DEFAULT_QUERY_ATTEMPTS};
use crate::types::{ErrorBody, FilterParams, WindowRow};
use crate::AppState;

const TTL: Duration = Duration::from_secs(300);
const CACHE_CONTROL: &str = "public, s-maxage=300, stale-while-revalidate=600";

/// Lists burst-protection blocking windows, tagged with their source
/// and summarized per campaign.
#[utoipa::path(
    get,
    path = "/api/windows",
    tag = "dashboard",
    params(
        ("advertiser_id" = Option<i64>, Query, description = "Restrict to one advertiser"),
        ("campaign_id" = Option<i64>, Query, description = "Restrict to one campaign"),
        ("start_date" = Option<String>, Query, description = "Range start, YYYY-MM-DD"),
        ("end_date" = Option<String>, Query, description = "Range end, YYYY-MM-DD"),
        ("nocache" = Option<bool>, Query, description = "Skip the cache and query live")
    ),
    responses(
        (status = 200, description = "Blocking windows with metadata", body = Object),
        (status = 400, description = "Invalid parameters", body = ErrorBody),
        (status = 503, description = "Database unavailable", body = ErrorBody)
    )
)]
pub async fn windows(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Response {
    let params = match FilterParams::from_query(&raw) {
        Ok(params) => params,
        Err(e) => return e.into_response(state.dev_mode),
    };

    let key = cache_key("bp:windows", &params.key_params());
    let sql = windows_sql(&params);
    let date_range = params.has_date_range().then(|| {
        json!({
            "start": params.start_date,
            "end": params.end_date,
        })
    });

    let pool = Arc::clone(&state.pool);
    let outcome = cached_fetch::<Value, _, _>(&state.cache, &key, TTL, params.nocache, || async move {
        let rows = pool.query_with_retry(&sql, DEFAULT_QUERY_ATTEMPTS).await?;
        let windows: Vec<WindowRow> = from_rows(rows)?;

        let campaign_count = windows
            .iter()
            .map(|w| w.campaign_id)
            .collect::<HashSet<_>>()
            .len();
        let total_windows = windows.len();

        let data: Vec<Value> = windows
            .into_iter()
            .map(|w| {
                let mut tagged = serde_json::to_value(w).unwrap_or(Value::Null);
                if let Value::Object(map) = &mut tagged {
                    map.insert("source".to_string(), Value::from("database"));
                }
                tagged
            })
            .collect();

        Ok(json!({
            "data": data,
            "metadata": {
                "total_windows": total_windows,
                "campaign_count": campaign_count,
                "date_range": date_range,
            }
        }))
    })
    .await;

    match outcome {
        Ok(outcome) => cached_response(outcome, CACHE_CONTROL),
        Err(e) => ApiError::from(e).into_response(state.dev_mode),
    }
}
