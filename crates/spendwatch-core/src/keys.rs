//! Deterministic cache key construction.
//!
//! A cache key is derived from a namespace prefix plus the request's
//! filter parameters. Two logically identical requests must produce
//! byte-identical keys no matter what order the parameters arrived in,
//! and a parameter that is absent must key the same as one that is
//! explicitly null.

use serde_json::{Map, Value};

/// Builds a cache key from a prefix and a parameter map.
///
/// Null-valued parameters are dropped, the remaining names are sorted
/// lexicographically, and each pair is joined as `name:value` with `:`
/// between pairs. An empty (post-filter) map yields the bare prefix.
///
/// ```
/// use serde_json::{json, Map, Value};
/// use spendwatch_core::keys::cache_key;
///
/// let mut params = Map::new();
/// params.insert("advertiserId".into(), json!(5));
/// params.insert("campaignId".into(), Value::Null);
///
/// assert_eq!(cache_key("bp:data", &params), "bp:data:advertiserId:5");
/// assert_eq!(cache_key("bp:data", &Map::new()), "bp:data");
/// ```
#[must_use]
pub fn cache_key(prefix: &str, params: &Map<String, Value>) -> String {
    let mut pairs: Vec<(&String, &Value)> =
        params.iter().filter(|(_, value)| !value.is_null()).collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    if pairs.is_empty() {
        return prefix.to_string();
    }

    let joined = pairs
        .iter()
        .map(|(name, value)| format!("{name}:{}", value_text(value)))
        .collect::<Vec<_>>()
        .join(":");

    format!("{prefix}:{joined}")
}

/// Renders a parameter value the way it appears inside a key: strings
/// unquoted, everything else in its canonical JSON form.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
