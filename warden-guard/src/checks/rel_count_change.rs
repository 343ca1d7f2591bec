//! Relative change of a per-day distinct count against its rolling average.
//!
//! The rolling average covers the `rolling_days` days before the check date.
//! A day with no rows counts as zero distinct values, so a silent pipeline
//! shows up as a -1.0 change instead of a missing metric. The metric is NULL
//! when the rolling average itself is zero or absent.

use chrono::Days;

use super::CheckDefinition;

pub(super) fn metric_sql(
    def: &CheckDefinition,
    rolling_days: u32,
    date_column: &str,
) -> String {
    let start = def.window_start(rolling_days);
    let day_before = def
        .date_value
        .checked_sub_days(Days::new(1))
        .unwrap_or(def.date_value);
    format!(
        "WITH base AS (SELECT {date_column} AS obs_date, \
         COUNT(DISTINCT {col}) AS dist_cnt \
         FROM {table} {window} GROUP BY {date_column}), \
         rolling_avg AS (SELECT AVG(dist_cnt) AS avg_cnt FROM base \
         WHERE obs_date BETWEEN '{start}' AND '{day_before}'), \
         current_cnt AS (SELECT MAX(dist_cnt) AS dist_cnt FROM \
         (SELECT dist_cnt FROM base WHERE obs_date = '{date}' \
         UNION ALL SELECT 0 AS dist_cnt) AS candidates) \
         SELECT ROUND(CASE WHEN avg_cnt = 0 OR avg_cnt IS NULL THEN NULL \
         ELSE (dist_cnt - avg_cnt) / avg_cnt END, 3) AS {alias} \
         FROM current_cnt CROSS JOIN rolling_avg",
        col = def.column,
        table = def.table,
        window = def.windowed_where(date_column, rolling_days),
        date = def.date_value,
        alias = def.quoted_name(),
    )
}

#[cfg(test)]
mod tests {
    use crate::checks::test_support::*;
    use crate::checks::CheckDefinition;
    use crate::config::CheckType;

    #[test]
    fn test_rel_count_change_sql() {
        let ctx = build_ctx();
        let mut settings = with_date_filter(
            base_settings("orders", "sku_id"),
            "order_date",
            "2023-01-15",
        );
        settings.rolling_days = Some(7);
        let check = CheckDefinition::build(CheckType::RelCountChange, &settings, &ctx).unwrap();
        assert_eq!(
            check.metric_query(),
            "WITH base AS (SELECT order_date AS obs_date, \
             COUNT(DISTINCT sku_id) AS dist_cnt \
             FROM orders WHERE order_date BETWEEN '2023-01-08' AND '2023-01-15' \
             GROUP BY order_date), \
             rolling_avg AS (SELECT AVG(dist_cnt) AS avg_cnt FROM base \
             WHERE obs_date BETWEEN '2023-01-08' AND '2023-01-14'), \
             current_cnt AS (SELECT MAX(dist_cnt) AS dist_cnt FROM \
             (SELECT dist_cnt FROM base WHERE obs_date = '2023-01-15' \
             UNION ALL SELECT 0 AS dist_cnt) AS candidates) \
             SELECT ROUND(CASE WHEN avg_cnt = 0 OR avg_cnt IS NULL THEN NULL \
             ELSE (dist_cnt - avg_cnt) / avg_cnt END, 3) AS \"sku_id_count_change\" \
             FROM current_cnt CROSS JOIN rolling_avg"
        );
    }

    #[test]
    fn test_other_filters_survive_inside_the_window() {
        let ctx = build_ctx();
        let mut settings = with_date_filter(
            base_settings("orders", "sku_id"),
            "order_date",
            "2023-01-15",
        );
        settings = with_identifier_filter(settings, "shop", "shop_code", "SHOP01");
        settings.rolling_days = Some(7);
        let check = CheckDefinition::build(CheckType::RelCountChange, &settings, &ctx).unwrap();
        assert!(check.metric_query().contains(
            "WHERE order_date BETWEEN '2023-01-08' AND '2023-01-15' AND shop_code = 'SHOP01'"
        ));
    }

    #[test]
    fn test_existence_probe_pins_the_check_date() {
        let ctx = build_ctx();
        let mut settings = with_date_filter(
            base_settings("orders", "sku_id"),
            "order_date",
            "2023-01-15",
        );
        settings.rolling_days = Some(7);
        let check = CheckDefinition::build(CheckType::RelCountChange, &settings, &ctx).unwrap();
        assert_eq!(
            check.existence_query(),
            "SELECT CASE WHEN COUNT(*) > 0 THEN '' ELSE 'orders' END AS empty_table \
             FROM orders WHERE order_date = '2023-01-15'"
        );
    }
}
