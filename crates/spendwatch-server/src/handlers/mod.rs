//! HTTP handlers for the SpendWatch API.

pub mod advertisers;
pub mod cache_admin;
pub mod campaigns;
pub mod dashboard;
pub mod health;
pub mod metrics;
pub mod pool_stats;
pub mod test_db;
pub mod windows;

pub use advertisers::advertisers;
pub use cache_admin::{cache_flush, cache_invalidate, cache_stats};
pub use campaigns::campaigns;
pub use dashboard::dashboard;
pub use health::health_check;
pub use metrics::metrics;
pub use pool_stats::pool_stats;
pub use test_db::test_db;
pub use windows::windows;

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};
use spendwatch_core::fetch::FetchOutcome;

/// Wraps a route payload in the response envelope and freshness headers.
///
/// The envelope adds `success`, `cached` and exactly one of
/// `cache_age_ms` / `query_time_ms` on top of the payload's own fields.
pub(crate) fn cached_response(outcome: FetchOutcome<Value>, cache_control: &'static str) -> Response {
    let mut body = match outcome.payload {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    };

    body.insert("success".to_string(), Value::Bool(true));
    body.insert("cached".to_string(), Value::Bool(outcome.cached));
    if let Some(age) = outcome.cache_age_ms {
        body.insert("cache_age_ms".to_string(), Value::from(age));
    }
    if let Some(elapsed) = outcome.query_time_ms {
        body.insert("query_time_ms".to_string(), Value::from(elapsed));
    }

    let mut response = Json(Value::Object(body)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        "X-Cache",
        HeaderValue::from_static(if outcome.cached { "HIT" } else { "MISS" }),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache_control));
    response
}
