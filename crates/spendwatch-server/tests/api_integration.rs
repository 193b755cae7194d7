//! Integration tests for the SpendWatch REST API.
//!
//! Every test drives the real router over the real pool and cache; only
//! the Vertica driver is stubbed.

mod common;

use axum::http::StatusCode;
use common::{get_json, request_json, test_app, StubConnector};

#[tokio::test]
async fn test_health_check() {
    let app = test_app(StubConnector::new());
    let (status, _, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_advertisers_miss_then_hit() {
    let connector = StubConnector::new();
    let app = test_app(connector.clone());

    // First call: live query, MISS.
    let (status, headers, json) = get_json(&app, "/api/advertisers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["cached"], false);
    assert!(json["query_time_ms"].is_u64());
    assert!(json.get("cache_age_ms").is_none());
    assert_eq!(headers["x-cache"], "MISS");
    assert_eq!(json["advertisers"].as_array().unwrap().len(), 2);
    assert_eq!(connector.executed(), 1);

    // Second call: served from cache, the backend is not touched again.
    let (status, headers, json) = get_json(&app, "/api/advertisers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cached"], true);
    assert!(json["cache_age_ms"].is_u64());
    assert!(json.get("query_time_ms").is_none());
    assert_eq!(headers["x-cache"], "HIT");
    assert_eq!(json["advertisers"].as_array().unwrap().len(), 2);
    assert_eq!(connector.executed(), 1, "cache hit must not query the backend");
}

#[tokio::test]
async fn test_nocache_forces_a_live_query() {
    let connector = StubConnector::new();
    let app = test_app(connector.clone());

    let _ = get_json(&app, "/api/advertisers").await;
    assert_eq!(connector.executed(), 1);

    let (status, _, json) = get_json(&app, "/api/advertisers?nocache=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cached"], false);
    assert_eq!(connector.executed(), 2, "nocache must bypass the cache check");
}

#[tokio::test]
async fn test_campaigns_requires_advertiser_id() {
    let app = test_app(StubConnector::new());
    let (status, _, json) = get_json(&app, "/api/campaigns").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid request parameters");
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_malformed_parameter_is_rejected() {
    let app = test_app(StubConnector::new());
    let (status, _, json) = get_json(&app, "/api/dashboard?advertiser_id=abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (status, _, _) = get_json(&app, "/api/dashboard?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_campaigns_flow() {
    let connector = StubConnector::new();
    let app = test_app(connector.clone());

    let (status, _, json) = get_json(&app, "/api/campaigns?advertiser_id=5").await;
    assert_eq!(status, StatusCode::OK);
    let campaigns = json["campaigns"].as_array().unwrap();
    assert_eq!(campaigns.len(), 2);
    assert_eq!(campaigns[0]["name"], "Fall push");
    assert_eq!(campaigns[1]["status"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_dashboard_rows_and_metadata() {
    let app = test_app(StubConnector::new());

    let (status, _, json) = get_json(
        &app,
        "/api/dashboard?advertiser_id=5&start_date=2025-10-01&end_date=2025-10-24",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["blocking_status"], "BLOCKED");
    assert_eq!(json["metadata"]["total_rows"], 1);
    assert_eq!(json["metadata"]["filters_applied"]["advertiser"], true);
    assert_eq!(json["metadata"]["filters_applied"]["date_range"], true);
    assert_eq!(json["metadata"]["filters_applied"]["campaign"], false);
}

#[tokio::test]
async fn test_windows_metadata_counts_campaigns() {
    let app = test_app(StubConnector::new());

    let (status, _, json) = get_json(&app, "/api/windows?advertiser_id=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["metadata"]["total_windows"], 2);
    assert_eq!(json["metadata"]["campaign_count"], 1);
    let data = json["data"].as_array().unwrap();
    assert_eq!(data[0]["source"], "database");
}

#[tokio::test]
async fn test_prefix_invalidation_spares_other_namespaces() {
    let connector = StubConnector::new();
    let app = test_app(connector.clone());

    // Populate two campaign keys and one metrics key.
    let _ = get_json(&app, "/api/campaigns?advertiser_id=5").await;
    let _ = get_json(&app, "/api/campaigns?advertiser_id=6").await;
    let _ = get_json(&app, "/api/metrics?advertiser_id=5").await;
    assert_eq!(connector.executed(), 3);

    let (status, _, json) = request_json(&app, "DELETE", "/api/cache?prefix=bp:campaigns").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);

    // Campaign entries are gone: this is a live query again.
    let (_, _, json) = get_json(&app, "/api/campaigns?advertiser_id=5").await;
    assert_eq!(json["cached"], false);
    assert_eq!(connector.executed(), 4);

    // The metrics entry survived the targeted invalidation.
    let (_, _, json) = get_json(&app, "/api/metrics?advertiser_id=5").await;
    assert_eq!(json["cached"], true);
    assert_eq!(connector.executed(), 4);
}

#[tokio::test]
async fn test_cache_invalidate_requires_prefix() {
    let app = test_app(StubConnector::new());
    let (status, _, json) = request_json(&app, "DELETE", "/api/cache").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test(start_paused = true)]
async fn test_backend_down_maps_to_503() {
    let connector = StubConnector::new();
    connector.refuse_connections(true);
    let app = test_app(connector);

    let (status, _, json) = get_json(&app, "/api/advertisers").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "Database connection failed");
    assert_eq!(json["success"], false);
    assert!(
        json.get("details").is_none(),
        "driver detail must not leak outside development mode"
    );
}

#[tokio::test]
async fn test_pool_stats_endpoint() {
    let app = test_app(StubConnector::new());

    let (status, _, json) = get_json(&app, "/api/pool-stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["healthy"], true);
    assert_eq!(json["pool"]["max"], 4);
    assert_eq!(json["pool"]["borrowed"], 0);
    assert!(json["timestamp_ms"].is_u64());
}

#[tokio::test]
async fn test_cache_stats_and_flush() {
    let app = test_app(StubConnector::new());

    let _ = get_json(&app, "/api/advertisers").await;

    let (_, _, json) = get_json(&app, "/api/cache/stats").await;
    assert_eq!(json["cache"]["keys"], 1);

    let (status, _, json) = request_json(&app, "POST", "/api/cache/flush").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (_, _, json) = get_json(&app, "/api/cache/stats").await;
    assert_eq!(json["cache"]["keys"], 0);
}

#[tokio::test]
async fn test_db_diagnostics() {
    let app = test_app(StubConnector::new());

    let (status, _, json) = get_json(&app, "/api/test-db").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["tests"]["health_check"], true);
    assert_eq!(json["tests"]["config_count"]["count"], 42);
    assert!(json["tests"]["sample_rows"].is_array());
}
