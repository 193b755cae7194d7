//! Pool status handler.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::AppState;

/// Connection pool snapshot plus an end-to-end health probe.
///
/// The probe runs a trivial query through the full pool path; this
/// endpoint is for operators and never sits in the request path.
#[utoipa::path(
    get,
    path = "/api/pool-stats",
    tag = "ops",
    responses(
        (status = 200, description = "Pool statistics and health", body = Object)
    )
)]
pub async fn pool_stats(State(state): State<Arc<AppState>>) -> Response {
    let stats = state.pool.stats();
    let healthy = state.pool.health_check().await;

    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    Json(serde_json::json!({
        "success": true,
        "pool": stats,
        "healthy": healthy,
        "timestamp_ms": timestamp_ms,
    }))
    .into_response()
}
