//! `SpendWatch` Server - REST API library for the spend-analytics
//! dashboard.
//!
//! Thin route handlers over the core pool + cache: validate query
//! parameters, run a parameterized SQL template through the pool, shape
//! the rows, and serve the result with freshness metadata.
//!
//! ## OpenAPI Documentation
//!
//! - Swagger UI: `GET /swagger-ui`
//! - OpenAPI JSON: `GET /api-docs/openapi.json`

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::cast_possible_truncation)]

pub mod error;
pub mod handlers;
pub mod queries;
pub mod types;

use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;

use spendwatch_core::{ConnectionPool, ResponseCache};

pub use error::ApiError;
pub use handlers::{
    advertisers, cache_flush, cache_invalidate, cache_stats, campaigns, dashboard, health_check,
    metrics, pool_stats, test_db, windows,
};
pub use types::*;

// ============================================================================
// OpenAPI Documentation
// ============================================================================

/// SpendWatch API documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SpendWatch API",
        version = "0.4.1",
        description = "Read-only spend-analytics API over Vertica. \
            Responses are cached per logical resource with short TTLs and \
            report their own freshness.",
        license(name = "MIT")
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    tags(
        (name = "health", description = "Liveness"),
        (name = "dashboard", description = "Dashboard data routes"),
        (name = "ops", description = "Operational surface: pool, cache, diagnostics")
    ),
    paths(
        handlers::health::health_check,
        handlers::advertisers::advertisers,
        handlers::campaigns::campaigns,
        handlers::dashboard::dashboard,
        handlers::windows::windows,
        handlers::metrics::metrics,
        handlers::pool_stats::pool_stats,
        handlers::test_db::test_db,
        handlers::cache_admin::cache_stats,
        handlers::cache_admin::cache_flush,
        handlers::cache_admin::cache_invalidate
    ),
    components(
        schemas(
            AdvertiserRow,
            CampaignRow,
            DashboardRow,
            WindowRow,
            MetricsRow,
            ErrorBody
        )
    )
)]
pub struct ApiDoc;

// ============================================================================
// Application State
// ============================================================================

/// Application state shared across handlers.
///
/// The pool and cache are each a process-wide singleton constructed in
/// `main` and injected here; handlers never reach for globals.
pub struct AppState {
    /// The connection pool.
    pub pool: Arc<ConnectionPool>,
    /// The response cache.
    pub cache: Arc<ResponseCache>,
    /// Development mode: error responses include diagnostic detail.
    pub dev_mode: bool,
}

/// Builds the API router over shared state. Used by `main` and by the
/// integration tests, so both exercise the same routing table.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/advertisers", get(advertisers))
        .route("/api/campaigns", get(campaigns))
        .route("/api/dashboard", get(dashboard))
        .route("/api/windows", get(windows))
        .route("/api/metrics", get(metrics))
        .route("/api/pool-stats", get(pool_stats))
        .route("/api/test-db", get(test_db))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/flush", post(cache_flush))
        .route("/api/cache", delete(cache_invalidate))
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_spec_generation() {
        let openapi = ApiDoc::openapi();
        let json = openapi.to_json().expect("Failed to serialize OpenAPI spec");
        assert!(!json.is_empty());
        assert!(json.contains("SpendWatch API"));
    }

    #[test]
    fn test_openapi_has_all_endpoints() {
        let openapi = ApiDoc::openapi();
        let json = openapi.to_json().expect("Failed to serialize OpenAPI spec");
        for path in [
            "/health",
            "/api/advertisers",
            "/api/campaigns",
            "/api/dashboard",
            "/api/windows",
            "/api/metrics",
            "/api/pool-stats",
            "/api/test-db",
            "/api/cache/stats",
            "/api/cache/flush",
            "/api/cache",
        ] {
            assert!(json.contains(&format!("\"{path}\"")), "missing {path}");
        }
    }

    #[test]
    fn test_openapi_has_schemas() {
        let openapi = ApiDoc::openapi();
        let json = openapi.to_json().expect("Failed to serialize OpenAPI spec");
        assert!(json.contains("AdvertiserRow"));
        assert!(json.contains("DashboardRow"));
        assert!(json.contains("ErrorBody"));
    }

    #[test]
    fn test_error_body_serialization_omits_absent_fields() {
        let body = ErrorBody {
            error: "Connection pool timeout".to_string(),
            message: None,
            details: None,
            success: false,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(!json.contains("message"));
        assert!(!json.contains("details"));
    }
}
