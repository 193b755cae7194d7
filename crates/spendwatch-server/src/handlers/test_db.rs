//! Database connectivity diagnostics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::types::ErrorBody;
use crate::AppState;

/// Exercises the database path end to end: a health probe, a trivial
/// query, and a peek at the burst-protection config table. Never
/// cached; intended for operators diagnosing connectivity.
#[utoipa::path(
    get,
    path = "/api/test-db",
    tag = "ops",
    responses(
        (status = 200, description = "Diagnostic results", body = Object),
        (status = 500, description = "A diagnostic step failed", body = ErrorBody)
    )
)]
pub async fn test_db(State(state): State<Arc<AppState>>) -> Response {
    let run = async {
        let healthy = state.pool.health_check().await;

        let current_time = state.pool.query("SELECT NOW() AS current_time").await?;

        let config_count = state
            .pool
            .query(
                "SELECT COUNT(*) AS count \
                 FROM trc.publisher_config \
                 WHERE attribute = 'spending-burst-protection:is-enabled-for-publisher'",
            )
            .await?;

        let sample_rows = state
            .pool
            .query(
                "SELECT publisher_id, DATE(update_time) AS feature_date \
                 FROM trc.publisher_config \
                 WHERE attribute = 'spending-burst-protection:is-enabled-for-publisher' \
                 LIMIT 5",
            )
            .await?;

        Ok::<_, spendwatch_core::Error>(serde_json::json!({
            "success": true,
            "tests": {
                "health_check": healthy,
                "current_time": current_time.first(),
                "config_count": config_count.first(),
                "sample_rows": sample_rows,
            }
        }))
    };

    match run.await {
        Ok(body) => Json(body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "database diagnostics failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: "Database test failed".to_string(),
                    message: None,
                    details: state.dev_mode.then(|| e.to_string()),
                    success: false,
                }),
            )
                .into_response()
        }
    }
}
