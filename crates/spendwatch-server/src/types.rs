//! Request/response types for the SpendWatch REST API.
//!
//! Query parameters arrive as raw strings and are coerced here, the way
//! the dashboard's clients send them; anything that fails coercion is a
//! validation error, never a silent default.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::error::ApiError;

/// Upper bound on page size, matching the dashboard's largest export.
const MAX_LIMIT: u32 = 10_000;

/// Common filter parameters shared by the data routes.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct FilterParams {
    /// Inclusive start of the date range, `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// Inclusive end of the date range, `YYYY-MM-DD`.
    pub end_date: Option<String>,
    /// Restrict to a single advertiser.
    pub advertiser_id: Option<i64>,
    /// Restrict to a single campaign.
    pub campaign_id: Option<i64>,
    /// 1-based page number.
    pub page: Option<u32>,
    /// Page size, up to 10000.
    pub limit: Option<u32>,
    /// Explicit cache-bypass signal.
    #[serde(default)]
    pub nocache: bool,
}

impl FilterParams {
    /// Coerces and validates raw query parameters.
    pub fn from_query(raw: &HashMap<String, String>) -> Result<Self, ApiError> {
        let params = Self {
            start_date: raw.get("start_date").filter(|s| !s.is_empty()).cloned(),
            end_date: raw.get("end_date").filter(|s| !s.is_empty()).cloned(),
            advertiser_id: parse_i64(raw, "advertiser_id")?,
            campaign_id: parse_i64(raw, "campaign_id")?,
            page: parse_u32(raw, "page")?,
            limit: parse_u32(raw, "limit")?,
            nocache: raw.get("nocache").is_some_and(|v| v == "true"),
        };

        if let Some(id) = params.advertiser_id {
            if id <= 0 {
                return Err(ApiError::Validation(
                    "'advertiser_id' must be positive".to_string(),
                ));
            }
        }
        if let Some(id) = params.campaign_id {
            if id <= 0 {
                return Err(ApiError::Validation(
                    "'campaign_id' must be positive".to_string(),
                ));
            }
        }
        if let Some(page) = params.page {
            if page == 0 {
                return Err(ApiError::Validation("'page' must be at least 1".to_string()));
            }
        }
        if let Some(limit) = params.limit {
            if limit == 0 || limit > MAX_LIMIT {
                return Err(ApiError::Validation(format!(
                    "'limit' must be between 1 and {MAX_LIMIT}"
                )));
            }
        }

        Ok(params)
    }

    /// The parameter map the cache key is derived from. Absent filters
    /// are simply absent, so presence of an unused filter never changes
    /// the key.
    #[must_use]
    pub fn key_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(v) = &self.start_date {
            params.insert("start_date".to_string(), Value::from(v.clone()));
        }
        if let Some(v) = &self.end_date {
            params.insert("end_date".to_string(), Value::from(v.clone()));
        }
        if let Some(v) = self.advertiser_id {
            params.insert("advertiser_id".to_string(), Value::from(v));
        }
        if let Some(v) = self.campaign_id {
            params.insert("campaign_id".to_string(), Value::from(v));
        }
        if let Some(v) = self.page {
            params.insert("page".to_string(), Value::from(v));
        }
        if let Some(v) = self.limit {
            params.insert("limit".to_string(), Value::from(v));
        }
        params
    }

    /// Whether both ends of the date range are present.
    #[must_use]
    pub fn has_date_range(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_some()
    }
}

fn parse_i64(raw: &HashMap<String, String>, key: &str) -> Result<Option<i64>, ApiError> {
    match raw.get(key).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("'{key}' must be an integer"))),
    }
}

fn parse_u32(raw: &HashMap<String, String>, key: &str) -> Result<Option<u32>, ApiError> {
    match raw.get(key).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ApiError::Validation(format!("'{key}' must be a non-negative integer"))),
    }
}

// ============================================================================
// Row types
// ============================================================================

/// One advertiser enrolled in burst protection.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdvertiserRow {
    /// Advertiser (publisher) id.
    pub id: i64,
    /// Display name.
    pub description: String,
    /// The date burst protection was enabled.
    pub feature_date: String,
}

/// One campaign under a filtered advertiser.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CampaignRow {
    /// Campaign id.
    pub id: i64,
    /// Campaign name.
    pub name: String,
    /// Owning advertiser id.
    pub advertiser_id: i64,
    /// Campaign status, when the warehouse reports one.
    pub status: Option<String>,
}

/// One advertiser-day of the main dashboard rollup.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardRow {
    /// Advertiser id.
    pub advertiser_id: i64,
    /// Advertiser display name.
    pub description: String,
    /// Day the spend was reported for.
    pub data_date: String,
    /// The date burst protection was enabled.
    pub feature_date: Option<String>,
    /// Average budget depletion rate across the advertiser's campaigns.
    pub avg_depletion_rate: Option<f64>,
    /// Depletion average over max-conversions campaigns only.
    pub mac_avg: Option<f64>,
    /// Spend spikes detected that day.
    pub spikes_count: Option<i64>,
    /// Volume removed by the burst-protection filter.
    pub amount_of_blocking: Option<f64>,
    /// `BLOCKED` when any blocking occurred, else `NOT BLOCKED`.
    pub blocking_status: String,
}

/// One blocking window.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WindowRow {
    /// Advertiser (syndicator) id.
    pub syndicator_id: i64,
    /// Campaign id.
    pub campaign_id: i64,
    /// Window start timestamp.
    pub start_time: String,
    /// Window end timestamp.
    pub end_time: String,
    /// Expected hourly spend during the window.
    pub avg_expected_hourly_spend: Option<f64>,
    /// Observed spend during the window.
    pub avg_current_period_spend: Option<f64>,
}

/// Aggregate metrics over the filtered range.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MetricsRow {
    /// Distinct advertisers in range.
    pub total_advertisers: i64,
    /// Distinct campaigns in range.
    pub total_campaigns: i64,
    /// Total spend in range.
    pub total_spend: Option<f64>,
    /// Mean depletion rate in range.
    pub avg_depletion_rate: Option<f64>,
    /// Advertisers with at least one blocked day.
    pub blocked_advertisers: i64,
}

/// Structured error body returned by every failing route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Short human-readable error.
    pub error: String,
    /// Optional user-facing guidance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Diagnostic detail, present only in development mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Always false.
    pub success: bool,
}
