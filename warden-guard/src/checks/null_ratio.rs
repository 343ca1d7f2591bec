//! Fraction of NULL values in a column.
//!
//! An empty slice yields 0.0 rather than NULL, so a fully filtered-out day
//! reads as "no nulls" instead of a missing metric.

use super::CheckDefinition;

pub(super) fn metric_sql(def: &CheckDefinition) -> String {
    def.select_metric(&format!(
        "CASE WHEN COUNT(*) = 0 THEN 0.0 \
         ELSE CAST(SUM(CASE WHEN {col} IS NULL THEN 1 ELSE 0 END) AS DOUBLE) / COUNT(*) \
         END AS {alias}",
        col = def.column,
        alias = def.quoted_name(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::checks::test_support::*;
    use crate::checks::CheckDefinition;
    use crate::config::CheckType;

    #[test]
    fn test_null_ratio_sql() {
        let ctx = build_ctx();
        let settings = with_date_filter(
            base_settings("orders", "category"),
            "order_date",
            "2023-01-15",
        );
        let check = CheckDefinition::build(CheckType::NullRatio, &settings, &ctx).unwrap();
        assert_eq!(
            check.metric_query(),
            "SELECT CASE WHEN COUNT(*) = 0 THEN 0.0 \
             ELSE CAST(SUM(CASE WHEN category IS NULL THEN 1 ELSE 0 END) AS DOUBLE) / COUNT(*) \
             END AS \"category_null_ratio\" \
             FROM orders WHERE order_date = '2023-01-15'"
        );
    }

    #[test]
    fn test_existence_probe_shares_the_where_clause() {
        let ctx = build_ctx();
        let settings = with_date_filter(
            base_settings("orders", "category"),
            "order_date",
            "2023-01-15",
        );
        let check = CheckDefinition::build(CheckType::NullRatio, &settings, &ctx).unwrap();
        assert_eq!(
            check.existence_query(),
            "SELECT CASE WHEN COUNT(*) > 0 THEN '' ELSE 'orders' END AS empty_table \
             FROM orders WHERE order_date = '2023-01-15'"
        );
    }
}
