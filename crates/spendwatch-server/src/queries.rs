//! SQL construction for the dashboard routes.
//!
//! Filters arrive pre-validated; values are still escaped before
//! interpolation because Vertica's simple query protocol carries no
//! bind parameters. The analytical rollups these select from are owned
//! by the warehouse team.

use crate::types::FilterParams;

/// Default retry budget for route queries.
pub const DEFAULT_QUERY_ATTEMPTS: u32 = 3;

/// Escapes a string literal by doubling single quotes.
#[must_use]
pub fn escape_str(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Builds `column = value` for an optional integer filter.
#[must_use]
pub fn filter_condition(column: &str, value: Option<i64>) -> Option<String> {
    value.map(|v| format!("{column} = {v}"))
}

/// Builds an inclusive date-range condition.
///
/// The end date is made inclusive of its entire day by comparing with
/// `< end::date + interval '1 day'` instead of `<=`.
#[must_use]
pub fn date_range_condition(
    column: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Option<String> {
    let (start, end) = (start_date?, end_date?);
    Some(format!(
        "{column} >= {} AND {column} < ({}::date + interval '1 day')",
        escape_str(start),
        escape_str(end)
    ))
}

/// Joins present conditions into a `WHERE` clause, or returns an empty
/// string when nothing filters.
#[must_use]
pub fn where_clause(conditions: &[Option<String>]) -> String {
    let present: Vec<&str> = conditions
        .iter()
        .filter_map(|c| c.as_deref())
        .filter(|c| !c.is_empty())
        .collect();
    if present.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", present.join(" AND "))
    }
}

/// Appends `ORDER BY` plus `LIMIT`/`OFFSET` pagination.
fn paginate(sql: &mut String, order_by: &str, page: Option<u32>, limit: Option<u32>) {
    sql.push_str(&format!("\nORDER BY {order_by}"));
    if let Some(limit) = limit {
        sql.push_str(&format!("\nLIMIT {limit}"));
        if let Some(page) = page {
            if page > 1 {
                sql.push_str(&format!("\nOFFSET {}", (u64::from(page) - 1) * u64::from(limit)));
            }
        }
    }
}

/// All advertisers enrolled in burst protection, with the date the
/// feature was enabled.
pub const ADVERTISERS_SQL: &str = "\
SELECT DISTINCT
  a.advertiser_id AS id,
  p.description,
  a.feature_date
FROM (
  SELECT
    COALESCE(n.publisher_id, pc.publisher_id) AS advertiser_id,
    DATE(pc.update_time) AS feature_date
  FROM trc.publisher_config pc
  LEFT JOIN trc.networks n ON pc.publisher_id = n.network_owner
  WHERE pc.attribute = 'spending-burst-protection:is-enabled-for-publisher'
    AND pc.publisher_id IS NOT NULL
) a
JOIN trc.publishers p ON p.id = a.advertiser_id
ORDER BY p.description";

/// Campaigns of one advertiser; when a date range is given, only
/// campaigns with spend inside it.
#[must_use]
pub fn campaigns_sql(advertiser_id: i64, filters: &FilterParams) -> String {
    let mut sql = format!(
        "\
SELECT DISTINCT
  c.id,
  c.name,
  c.syndicator_id AS advertiser_id,
  c.status
FROM trc.sp_campaigns c
WHERE c.syndicator_id = {advertiser_id}"
    );

    if let Some(date_range) = date_range_condition(
        "a.data_timestamp_by_request_time",
        filters.start_date.as_deref(),
        filters.end_date.as_deref(),
    ) {
        sql.push_str(&format!(
            "\n  AND EXISTS (
    SELECT 1
    FROM reports.advertiser_dimensions_by_request_time_report_daily a
    WHERE a.campaign_id = c.id
      AND a.account_id = {advertiser_id}
      AND {date_range}
  )"
        ));
    }

    sql.push_str("\nORDER BY c.name");
    sql
}

/// The main dashboard rollup: one row per advertiser-day.
#[must_use]
pub fn dashboard_sql(filters: &FilterParams) -> String {
    let clause = where_clause(&[
        filter_condition("s.advertiser_id", filters.advertiser_id),
        filter_condition("s.campaign_id", filters.campaign_id),
        date_range_condition(
            "s.data_date",
            filters.start_date.as_deref(),
            filters.end_date.as_deref(),
        ),
    ]);

    let mut sql = format!(
        "\
SELECT
  s.advertiser_id,
  p.description,
  s.data_date,
  s.feature_date,
  s.avg_depletion_rate,
  s.mac_avg,
  s.spikes_count,
  s.amount_of_blocking,
  CASE
    WHEN s.amount_of_blocking IS NOT NULL AND s.amount_of_blocking > 0 THEN 'BLOCKED'
    ELSE 'NOT BLOCKED'
  END AS blocking_status
FROM reports.burst_protection_account_daily s
JOIN trc.publishers p ON p.id = s.advertiser_id
{clause}"
    );

    paginate(
        &mut sql,
        "s.advertiser_id, s.data_date",
        filters.page,
        filters.limit,
    );
    sql
}

/// Blocking windows over the filtered range.
#[must_use]
pub fn windows_sql(filters: &FilterParams) -> String {
    let clause = where_clause(&[
        filter_condition("w.syndicator_id", filters.advertiser_id),
        filter_condition("w.campaign_id", filters.campaign_id),
        date_range_condition(
            "w.start_time",
            filters.start_date.as_deref(),
            filters.end_date.as_deref(),
        ),
    ]);

    format!(
        "\
SELECT
  w.syndicator_id,
  w.campaign_id,
  w.start_time,
  w.end_time,
  w.avg_expected_hourly_spend,
  w.avg_current_period_spend
FROM reports.burst_protection_blocking_windows w
{clause}
ORDER BY w.start_time"
    )
}

/// Aggregate metrics over the filtered range, one row.
#[must_use]
pub fn metrics_sql(filters: &FilterParams) -> String {
    let clause = where_clause(&[
        filter_condition("s.advertiser_id", filters.advertiser_id),
        filter_condition("s.campaign_id", filters.campaign_id),
        date_range_condition(
            "s.data_date",
            filters.start_date.as_deref(),
            filters.end_date.as_deref(),
        ),
    ]);

    format!(
        "\
SELECT
  COUNT(DISTINCT s.advertiser_id) AS total_advertisers,
  COUNT(DISTINCT s.campaign_id) AS total_campaigns,
  SUM(s.sum_spent) AS total_spend,
  AVG(s.avg_depletion_rate) AS avg_depletion_rate,
  COUNT(DISTINCT CASE WHEN s.amount_of_blocking > 0 THEN s.advertiser_id END) AS blocked_advertisers
FROM reports.burst_protection_account_daily s
{clause}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(advertiser: Option<i64>, dates: bool) -> FilterParams {
        FilterParams {
            advertiser_id: advertiser,
            start_date: dates.then(|| "2025-10-01".to_string()),
            end_date: dates.then(|| "2025-10-24".to_string()),
            ..FilterParams::default()
        }
    }

    #[test]
    fn test_escape_str_doubles_quotes() {
        assert_eq!(escape_str("O'Brien"), "'O''Brien'");
        assert_eq!(escape_str("plain"), "'plain'");
    }

    #[test]
    fn test_date_range_is_end_inclusive() {
        let cond =
            date_range_condition("s.data_date", Some("2025-10-01"), Some("2025-10-24")).unwrap();
        assert!(cond.contains("s.data_date >= '2025-10-01'"));
        assert!(cond.contains("< ('2025-10-24'::date + interval '1 day')"));
    }

    #[test]
    fn test_date_range_requires_both_ends() {
        assert!(date_range_condition("c", Some("2025-10-01"), None).is_none());
        assert!(date_range_condition("c", None, Some("2025-10-24")).is_none());
    }

    #[test]
    fn test_where_clause_skips_absent_conditions() {
        assert_eq!(where_clause(&[None, None]), "");
        assert_eq!(
            where_clause(&[Some("a = 1".to_string()), None, Some("b = 2".to_string())]),
            "WHERE a = 1 AND b = 2"
        );
    }

    #[test]
    fn test_dashboard_sql_without_filters_has_no_where() {
        let sql = dashboard_sql(&FilterParams::default());
        assert!(!sql.contains("WHERE"));
        assert!(sql.contains("ORDER BY s.advertiser_id, s.data_date"));
    }

    #[test]
    fn test_dashboard_sql_applies_filters_and_pagination() {
        let mut f = filters(Some(5), true);
        f.page = Some(3);
        f.limit = Some(100);
        let sql = dashboard_sql(&f);
        assert!(sql.contains("WHERE s.advertiser_id = 5"));
        assert!(sql.contains("s.data_date >= '2025-10-01'"));
        assert!(sql.contains("LIMIT 100"));
        assert!(sql.contains("OFFSET 200"));
    }

    #[test]
    fn test_campaigns_sql_gates_on_spend_only_with_dates() {
        let plain = campaigns_sql(5, &filters(Some(5), false));
        assert!(!plain.contains("EXISTS"));

        let ranged = campaigns_sql(5, &filters(Some(5), true));
        assert!(ranged.contains("EXISTS"));
        assert!(ranged.contains("a.account_id = 5"));
    }

    #[test]
    fn test_metrics_sql_aggregates() {
        let sql = metrics_sql(&filters(None, false));
        assert!(sql.contains("COUNT(DISTINCT s.advertiser_id) AS total_advertisers"));
        assert!(sql.contains("blocked_advertisers"));
        assert!(!sql.contains("WHERE"));
    }
}
