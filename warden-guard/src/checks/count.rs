//! Row or distinct-value counts.

use super::CheckDefinition;

pub(super) fn metric_sql(def: &CheckDefinition, distinct: bool) -> String {
    let target = if distinct {
        format!("DISTINCT {}", def.column)
    } else {
        def.column.clone()
    };
    def.select_metric(&format!(
        "COUNT({target}) AS {alias}",
        alias = def.quoted_name()
    ))
}
