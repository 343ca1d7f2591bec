//! Rendering of resolved filters into SQL predicate text.
//!
//! Conditions are emitted in `BTreeMap` iteration order (sorted by filter
//! name), so the same filter set always renders the same SQL. That stability
//! is load-bearing: the bulk-fetch planner and the data-existence cache both
//! compare rendered fragments.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{FilterOperator, FilterSpec};

/// Renders a JSON value as a SQL literal.
///
/// Strings are single-quoted with `''` escaping; numbers and booleans render
/// raw; `null` renders as `NULL`.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Null => "NULL".to_string(),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

/// Renders a single filter into its SQL condition, or `None` when the filter
/// contributes no predicate (naming-only, or no column).
pub fn render_condition(spec: &FilterSpec) -> Option<String> {
    if spec.is_naming_only() {
        return None;
    }
    let column = spec.column.as_deref()?;

    let condition = match (&spec.value, spec.operator) {
        (None, FilterOperator::Eq) => format!("{column} IS NULL"),
        (None, FilterOperator::Ne) => format!("{column} IS NOT NULL"),
        (None, _) => return None,
        (Some(Value::Array(items)), op) => {
            let list = items.iter().map(sql_literal).collect::<Vec<_>>().join(", ");
            format!("{column} {} ({list})", op.as_sql())
        }
        (Some(value), op) => format!("{column} {} {}", op.as_sql(), sql_literal(value)),
    };
    Some(condition)
}

/// Renders each filter into a SQL condition, skipping naming-only filters
/// and filters without a column.
pub fn build_conditions(filters: &BTreeMap<String, FilterSpec>) -> Vec<String> {
    filters.values().filter_map(render_condition).collect()
}

/// Builds a full `WHERE` clause from the filter set.
///
/// Returns an empty string when no filter contributes a condition.
pub fn build_where_clause(filters: &BTreeMap<String, FilterSpec>) -> String {
    let conditions = build_conditions(filters);
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterKind;
    use serde_json::json;

    fn spec(
        name: &str,
        column: &str,
        value: Option<Value>,
        operator: FilterOperator,
        kind: FilterKind,
    ) -> (String, FilterSpec) {
        (
            name.to_string(),
            FilterSpec {
                name: name.to_string(),
                column: Some(column.to_string()),
                value,
                operator,
                kind,
            },
        )
    }

    #[test]
    fn test_empty_filters_render_empty_string() {
        assert_eq!(build_where_clause(&BTreeMap::new()), "");
    }

    #[test]
    fn test_equality_and_ordering() {
        let filters: BTreeMap<_, _> = [
            spec(
                "shop",
                "shop_code",
                Some(json!("SHOP01")),
                FilterOperator::Eq,
                FilterKind::Identifier,
            ),
            spec(
                "date",
                "order_date",
                Some(json!("2023-01-01")),
                FilterOperator::Eq,
                FilterKind::Date,
            ),
        ]
        .into_iter()
        .collect();

        // sorted by filter name: date before shop
        assert_eq!(
            build_where_clause(&filters),
            "WHERE order_date = '2023-01-01' AND shop_code = 'SHOP01'"
        );
    }

    #[test]
    fn test_null_values_render_is_null() {
        let filters: BTreeMap<_, _> = [
            spec("a", "category", None, FilterOperator::Eq, FilterKind::Other),
            spec("b", "category", None, FilterOperator::Ne, FilterKind::Other),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            build_where_clause(&filters),
            "WHERE category IS NULL AND category IS NOT NULL"
        );
    }

    #[test]
    fn test_in_renders_parenthesized_list() {
        let filters: BTreeMap<_, _> = [spec(
            "cat",
            "category",
            Some(json!(["toys", "shoes", 3])),
            FilterOperator::In,
            FilterKind::Other,
        )]
        .into_iter()
        .collect();
        assert_eq!(
            build_where_clause(&filters),
            "WHERE category IN ('toys', 'shoes', 3)"
        );
    }

    #[test]
    fn test_not_in_and_like() {
        let filters: BTreeMap<_, _> = [
            spec(
                "cat",
                "category",
                Some(json!(["toys"])),
                FilterOperator::NotIn,
                FilterKind::Other,
            ),
            spec(
                "sku",
                "sku_id",
                Some(json!("SHOP%")),
                FilterOperator::Like,
                FilterKind::Other,
            ),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            build_where_clause(&filters),
            "WHERE category NOT IN ('toys') AND sku_id LIKE 'SHOP%'"
        );
    }

    #[test]
    fn test_naming_only_identifier_is_skipped() {
        let filters: BTreeMap<_, _> = [
            (
                "shop".to_string(),
                FilterSpec {
                    name: "shop".to_string(),
                    column: Some("shop_code".to_string()),
                    value: None,
                    operator: FilterOperator::Eq,
                    kind: FilterKind::Identifier,
                },
            ),
            spec(
                "date",
                "order_date",
                Some(json!("2023-01-01")),
                FilterOperator::Eq,
                FilterKind::Date,
            ),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            build_where_clause(&filters),
            "WHERE order_date = '2023-01-01'"
        );
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(sql_literal(&json!("O'Brien")), "'O''Brien'");
        assert_eq!(sql_literal(&json!(1.5)), "1.5");
        assert_eq!(sql_literal(&json!(true)), "TRUE");
    }

    #[test]
    fn test_numeric_comparison_operators() {
        let filters: BTreeMap<_, _> = [spec(
            "min_orders",
            "num_orders",
            Some(json!(10)),
            FilterOperator::Ge,
            FilterKind::Other,
        )]
        .into_iter()
        .collect();
        assert_eq!(build_where_clause(&filters), "WHERE num_orders >= 10");
    }
}
