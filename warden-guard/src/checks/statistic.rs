//! Average, maximum, and minimum of a numeric column.

use super::{CheckDefinition, StatisticKind};

pub(super) fn metric_sql(def: &CheckDefinition, stat: StatisticKind) -> String {
    def.select_metric(&format!(
        "{func}({col}) AS {alias}",
        func = stat.as_sql(),
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
    fn test_statistic_sql() {
        let ctx = build_ctx();
        let settings = base_settings("orders", "basket_value");

        let check = CheckDefinition::build(CheckType::Average, &settings, &ctx).unwrap();
        assert_eq!(
            check.metric_query(),
            "SELECT AVG(basket_value) AS \"basket_value_average\" FROM orders"
        );

        let check = CheckDefinition::build(CheckType::Max, &settings, &ctx).unwrap();
        assert_eq!(
            check.metric_query(),
            "SELECT MAX(basket_value) AS \"basket_value_max\" FROM orders"
        );

        let check = CheckDefinition::build(CheckType::Min, &settings, &ctx).unwrap();
        assert_eq!(
            check.metric_query(),
            "SELECT MIN(basket_value) AS \"basket_value_min\" FROM orders"
        );
    }
}
