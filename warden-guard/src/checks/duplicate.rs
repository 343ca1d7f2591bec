//! Number of duplicated values in a column.

use super::CheckDefinition;

pub(super) fn metric_sql(def: &CheckDefinition) -> String {
    def.select_metric(&format!(
        "COUNT(*) - COUNT(DISTINCT {col}) AS {alias}",
        col = def.column,
        alias = def.quoted_name(),
    ))
}
