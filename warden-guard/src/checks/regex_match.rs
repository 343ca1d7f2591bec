//! Fraction of column values matching a regular expression.

use super::{escape_sql_string, CheckDefinition};

pub(super) fn metric_sql(def: &CheckDefinition, regex: &str) -> String {
    def.select_metric(&format!(
        "AVG(CASE WHEN regexp_like({col}, '{regex}') THEN 1.0 ELSE 0.0 END) AS {alias}",
        col = def.column,
        regex = escape_sql_string(regex),
        alias = def.quoted_name(),
    ))
}
