//! Fraction of column values contained in an allowed set, with a rolling
//! variant that widens the date restriction into a trailing window.

use serde_json::Value;

use super::CheckDefinition;
use crate::error::{Result, WardenError};
use crate::filters::where_clause::sql_literal;

/// Normalizes the configured value set into a sorted, deduplicated list.
///
/// Accepted shapes: a native JSON array, a pre-rendered parenthesized list
/// such as `"('a', 'b')"`, or a single scalar.
pub(super) fn parse_value_set(raw: &Value) -> Result<Vec<Value>> {
    match raw {
        Value::Array(items) => Ok(normalize(items.clone())),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Some(inner) = trimmed
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
            {
                Ok(normalize(
                    inner
                        .split(',')
                        .map(str::trim)
                        .filter(|item| !item.is_empty())
                        .map(parse_list_item)
                        .collect(),
                ))
            } else {
                Ok(vec![Value::String(trimmed.to_string())])
            }
        }
        Value::Number(_) | Value::Bool(_) => Ok(vec![raw.clone()]),
        other => Err(WardenError::Configuration(format!(
            "'value_set' must be a list or scalar, got {other}"
        ))),
    }
}

/// Duplicate values must not leak into the rendered `IN (...)` list, so the
/// set is deduplicated and sorted on its SQL rendering.
fn normalize(mut values: Vec<Value>) -> Vec<Value> {
    values.sort_by(|a, b| sql_literal(a).cmp(&sql_literal(b)));
    values.dedup_by(|a, b| sql_literal(a) == sql_literal(b));
    values
}

fn parse_list_item(item: &str) -> Value {
    let unquoted = item
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''));
    if let Some(inner) = unquoted {
        return Value::String(inner.to_string());
    }
    item.parse::<i64>()
        .map(Value::from)
        .or_else(|_| item.parse::<f64>().map(Value::from))
        .unwrap_or_else(|_| Value::String(item.to_string()))
}

fn value_list(values: &[Value]) -> String {
    values
        .iter()
        .map(sql_literal)
        .collect::<Vec<_>>()
        .join(", ")
}

fn membership_ratio(def: &CheckDefinition, values: &[Value]) -> String {
    format!(
        "AVG(CASE WHEN {col} IN ({list}) THEN 1.0 ELSE 0.0 END) AS {alias}",
        col = def.column,
        list = value_list(values),
        alias = def.quoted_name(),
    )
}

pub(super) fn metric_sql(def: &CheckDefinition, values: &[Value]) -> String {
    def.select_metric(&membership_ratio(def, values))
}

pub(super) fn rolling_metric_sql(
    def: &CheckDefinition,
    values: &[Value],
    rolling_days: u32,
    date_column: &str,
) -> String {
    format!(
        "SELECT {expr} FROM {table} {where_clause}",
        expr = membership_ratio(def, values),
        table = def.table,
        where_clause = def.windowed_where(date_column, rolling_days),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::*;
    use crate::config::CheckType;
    use serde_json::json;

    #[test]
    fn test_parse_value_set_shapes() {
        assert_eq!(
            parse_value_set(&json!(["toys", 3])).unwrap(),
            vec![json!("toys"), json!(3)]
        );
        assert_eq!(
            parse_value_set(&json!("('toys', 'shoes', 3)")).unwrap(),
            vec![json!("shoes"), json!("toys"), json!(3)]
        );
        assert_eq!(parse_value_set(&json!("toys")).unwrap(), vec![json!("toys")]);
        assert_eq!(parse_value_set(&json!(3)).unwrap(), vec![json!(3)]);
        assert!(parse_value_set(&json!(null)).is_err());
    }

    #[test]
    fn test_value_sets_are_deduplicated_and_sorted() {
        assert_eq!(
            parse_value_set(&json!(["toys", "shoes", "toys"])).unwrap(),
            vec![json!("shoes"), json!("toys")]
        );
        assert_eq!(
            parse_value_set(&json!("('b', 'a', 'b')")).unwrap(),
            vec![json!("a"), json!("b")]
        );
    }

    #[test]
    fn test_values_in_set_sql() {
        let ctx = build_ctx();
        let mut settings = base_settings("orders", "category");
        settings.value_set = Some(json!(["toys", "shoes"]));
        let check = CheckDefinition::build(CheckType::ValuesInSet, &settings, &ctx).unwrap();
        assert_eq!(
            check.metric_query(),
            "SELECT AVG(CASE WHEN category IN ('shoes', 'toys') THEN 1.0 ELSE 0.0 END) \
             AS \"category_values_in_set_ratio\" FROM orders"
        );
    }

    #[test]
    fn test_rolling_variant_widens_the_date_restriction() {
        let ctx = build_ctx();
        let mut settings = with_date_filter(
            base_settings("orders", "category"),
            "order_date",
            "2023-01-15",
        );
        settings.value_set = Some(json!(["toys"]));
        settings.rolling_days = Some(7);
        let check =
            CheckDefinition::build(CheckType::RollingValuesInSet, &settings, &ctx).unwrap();
        assert_eq!(
            check.metric_query(),
            "SELECT AVG(CASE WHEN category IN ('toys') THEN 1.0 ELSE 0.0 END) \
             AS \"category_rolling_values_in_set_ratio\" FROM orders \
             WHERE order_date BETWEEN '2023-01-08' AND '2023-01-15'"
        );
    }

    #[test]
    fn test_rolling_window_defaults_to_fourteen_days() {
        let ctx = build_ctx();
        let mut settings = with_date_filter(
            base_settings("orders", "category"),
            "order_date",
            "2023-01-15",
        );
        settings.value_set = Some(json!(["toys"]));
        let check =
            CheckDefinition::build(CheckType::RollingValuesInSet, &settings, &ctx).unwrap();
        assert!(check
            .metric_query()
            .contains("BETWEEN '2023-01-01' AND '2023-01-15'"));
    }
}
