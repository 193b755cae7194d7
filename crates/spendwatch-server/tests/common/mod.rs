//! Shared test fixtures: a stub Vertica driver and app construction.

use async_trait::async_trait;
use axum::Router;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spendwatch_core::config::PoolSettings;
use spendwatch_core::{
    ConnectionPool, Connector, Error, QueryOutput, ResponseCache, Result, Session,
};
use spendwatch_server::{api_router, AppState};

fn output(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryOutput {
    QueryOutput {
        columns: columns.iter().map(|c| (*c).to_string()).collect(),
        rows,
    }
}

/// Canned warehouse responses keyed off recognizable SQL fragments.
fn respond(sql: &str) -> QueryOutput {
    if sql.contains("SELECT 1") {
        output(&["probe"], vec![vec![json!(1)]])
    } else if sql.contains("SELECT NOW()") {
        output(&["current_time"], vec![vec![json!("2025-10-24 13:30:00")]])
    } else if sql.contains("COUNT(*) AS count") {
        output(&["count"], vec![vec![json!(42)]])
    } else if sql.contains("blocking_windows") {
        output(
            &[
                "syndicator_id",
                "campaign_id",
                "start_time",
                "end_time",
                "avg_expected_hourly_spend",
                "avg_current_period_spend",
            ],
            vec![
                vec![
                    json!(5),
                    json!(901),
                    json!("2025-10-20 10:00:00"),
                    json!("2025-10-20 11:30:00"),
                    json!(120.0),
                    json!(310.5),
                ],
                vec![
                    json!(5),
                    json!(901),
                    json!("2025-10-21 09:00:00"),
                    json!("2025-10-21 09:45:00"),
                    json!(120.0),
                    json!(250.0),
                ],
            ],
        )
    } else if sql.contains("COUNT(DISTINCT s.advertiser_id)") {
        output(
            &[
                "total_advertisers",
                "total_campaigns",
                "total_spend",
                "avg_depletion_rate",
                "blocked_advertisers",
            ],
            vec![vec![json!(3), json!(12), json!(4521.5), json!(87.2), json!(1)]],
        )
    } else if sql.contains("burst_protection_account_daily") {
        output(
            &[
                "advertiser_id",
                "description",
                "data_date",
                "feature_date",
                "avg_depletion_rate",
                "mac_avg",
                "spikes_count",
                "amount_of_blocking",
                "blocking_status",
            ],
            vec![vec![
                json!(5),
                json!("Acme"),
                json!("2025-10-20"),
                json!("2025-01-15"),
                json!(93.4),
                json!(101.2),
                json!(2),
                json!(15.0),
                json!("BLOCKED"),
            ]],
        )
    } else if sql.contains("sp_campaigns") {
        output(
            &["id", "name", "advertiser_id", "status"],
            vec![
                vec![json!(901), json!("Fall push"), json!(5), json!("RUNNING")],
                vec![json!(902), json!("Retargeting"), json!(5), Value::Null],
            ],
        )
    } else if sql.contains("AS id") {
        output(
            &["id", "description", "feature_date"],
            vec![
                vec![json!(1), json!("Acme"), json!("2025-01-15")],
                vec![json!(2), json!("Globex"), json!("2025-03-02")],
            ],
        )
    } else {
        output(
            &["publisher_id", "feature_date"],
            vec![vec![json!(5), json!("2025-01-15")]],
        )
    }
}

/// Stub driver: counts executed statements and can be told to refuse
/// connections.
#[derive(Default)]
pub struct StubConnector {
    executed: Arc<AtomicUsize>,
    refuse_connections: AtomicBool,
}

impl StubConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse_connections.store(refuse, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct StubSession {
    executed: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(&self) -> Result<Box<dyn Session>> {
        if self.refuse_connections.load(Ordering::SeqCst) {
            return Err(Error::ConnectionFailed("connection refused".to_string()));
        }
        Ok(Box::new(StubSession {
            executed: Arc::clone(&self.executed),
        }))
    }
}

#[async_trait]
impl Session for StubSession {
    async fn execute(&mut self, sql: &str) -> Result<QueryOutput> {
        self.executed.fetch_add(1, Ordering::SeqCst);
        Ok(respond(sql))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Builds an app over a fresh pool + cache wired to the stub driver.
pub fn test_app(connector: Arc<StubConnector>) -> Router {
    let settings = PoolSettings {
        min: 0,
        max: 4,
        acquire_timeout_ms: 1_000,
        query_timeout_ms: 5_000,
        ..PoolSettings::default()
    };
    let pool = Arc::new(ConnectionPool::new(connector, settings));
    let cache = Arc::new(ResponseCache::new(100, Duration::from_secs(300)));
    let state = Arc::new(AppState {
        pool,
        cache,
        dev_mode: false,
    });
    api_router(state)
}

/// Issues a GET and returns status plus parsed JSON body.
pub async fn get_json(
    app: &Router,
    uri: &str,
) -> (axum::http::StatusCode, HashMap<String, String>, Value) {
    request_json(app, "GET", uri).await
}

/// Issues a request of the given method and returns status, headers of
/// interest, and the parsed JSON body.
pub async fn request_json(
    app: &Router,
    method: &str,
    uri: &str,
) -> (axum::http::StatusCode, HashMap<String, String>, Value) {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .expect("Failed to build request"),
        )
        .await
        .expect("Request failed");

    let status = response.status();
    let mut headers = HashMap::new();
    for name in ["x-cache", "cache-control"] {
        if let Some(value) = response.headers().get(name) {
            headers.insert(name.to_string(), value.to_str().unwrap_or("").to_string());
        }
    }

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let json: Value = serde_json::from_slice(&bytes).expect("Invalid JSON");
    (status, headers, json)
}
