//! Cache administration handlers: stats, flush and prefix invalidation.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::types::ErrorBody;
use crate::AppState;

/// Response cache statistics.
#[utoipa::path(
    get,
    path = "/api/cache/stats",
    tag = "ops",
    responses(
        (status = 200, description = "Cache statistics", body = Object)
    )
)]
pub async fn cache_stats(State(state): State<Arc<AppState>>) -> Response {
    let stats = state.cache.stats();
    Json(serde_json::json!({
        "success": true,
        "cache": {
            "keys": stats.keys,
            "hits": stats.hits,
            "misses": stats.misses,
            "ksize": stats.ksize,
            "vsize": stats.vsize,
        }
    }))
    .into_response()
}

/// Unconditionally clears the cache.
#[utoipa::path(
    post,
    path = "/api/cache/flush",
    tag = "ops",
    responses(
        (status = 200, description = "Cache cleared", body = Object)
    )
)]
pub async fn cache_flush(State(state): State<Arc<AppState>>) -> Response {
    state.cache.flush();
    Json(serde_json::json!({
        "success": true,
        "message": "cache flushed"
    }))
    .into_response()
}

/// Removes every cached entry under a key prefix.
///
/// Targeted invalidation for one logical resource (e.g. `bp:campaigns`)
/// without disturbing the rest of the cache.
#[utoipa::path(
    delete,
    path = "/api/cache",
    tag = "ops",
    params(
        ("prefix" = String, Query, description = "Key prefix to invalidate")
    ),
    responses(
        (status = 200, description = "Entries removed", body = Object),
        (status = 400, description = "Missing prefix", body = ErrorBody)
    )
)]
pub async fn cache_invalidate(
    State(state): State<Arc<AppState>>,
    Query(raw): Query<HashMap<String, String>>,
) -> Response {
    let Some(prefix) = raw.get("prefix").filter(|p| !p.is_empty()) else {
        return ApiError::Validation("'prefix' is required".to_string())
            .into_response(state.dev_mode);
    };

    let removed = state.cache.delete_by_prefix(prefix);
    tracing::info!(prefix, removed, "cache invalidated by prefix");

    Json(serde_json::json!({
        "success": true,
        "prefix": prefix,
        "removed": removed,
    }))
    .into_response()
}
