//! Frequency of the most or least frequent value in a column.

use super::{CheckDefinition, OccurrenceMode};
use crate::filters::build_where_clause;

pub(super) fn metric_sql(def: &CheckDefinition, mode: OccurrenceMode) -> String {
    let order = match mode {
        OccurrenceMode::Max => "DESC",
        OccurrenceMode::Min => "ASC",
    };
    let where_clause = build_where_clause(&def.filters);
    let restriction = if where_clause.is_empty() {
        String::new()
    } else {
        format!(" {where_clause}")
    };
    format!(
        "SELECT {col}, COUNT(*) AS {alias} FROM {table}{restriction} \
         GROUP BY {col} ORDER BY {alias} {order} LIMIT 1",
        col = def.column,
        alias = def.quoted_name(),
        table = def.table,
    )
}
