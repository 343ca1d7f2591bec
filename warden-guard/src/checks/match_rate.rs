//! Match rate between two tables over a join.
//!
//! The left side is the reference population; the metric is the fraction of
//! left rows that find at least one partner in the (deduplicated) right side.
//! The rate is NULL when the left side is empty, which the existence probe
//! reports before the metric ever runs.

use std::collections::BTreeMap;

use super::{escape_sql_string, short_column, CheckDefinition};
use crate::filters::{build_where_clause, FilterSpec};

fn padded_where(filters: &BTreeMap<String, FilterSpec>) -> String {
    let clause = build_where_clause(filters);
    if clause.is_empty() {
        clause
    } else {
        format!(" {clause}")
    }
}

fn join_condition(join_left: &[String], join_right: &[String]) -> String {
    join_left
        .iter()
        .zip(join_right)
        .map(|(l, r)| format!("lefty.{l} = righty.{}", short_column(r)))
        .collect::<Vec<_>>()
        .join(" AND ")
}

#[allow(clippy::too_many_arguments)]
pub(super) fn metric_sql(
    def: &CheckDefinition,
    left_table: &str,
    right_table: &str,
    join_left: &[String],
    join_right: &[String],
    left_filters: &BTreeMap<String, FilterSpec>,
    right_filters: &BTreeMap<String, FilterSpec>,
) -> String {
    format!(
        "WITH righty AS (SELECT DISTINCT {right_cols}, TRUE AS in_right_table \
         FROM {right_table}{right_where}), \
         lefty AS (SELECT * FROM {left_table}{left_where}) \
         SELECT ROUND(CASE WHEN COUNT(*) = 0 THEN NULL \
         ELSE CAST(SUM(CASE WHEN in_right_table THEN 1 ELSE 0 END) AS DOUBLE) / COUNT(*) \
         END, 3) AS {alias} \
         FROM lefty LEFT JOIN righty ON {on}",
        right_cols = join_right.join(", "),
        right_where = padded_where(right_filters),
        left_where = padded_where(left_filters),
        alias = def.quoted_name(),
        on = join_condition(join_left, join_right),
    )
}

pub(super) fn existence_sql(
    left_table: &str,
    right_table: &str,
    left_filters: &BTreeMap<String, FilterSpec>,
    right_filters: &BTreeMap<String, FilterSpec>,
) -> String {
    format!(
        "WITH left_cnt AS (SELECT COUNT(*) AS cnt FROM {left_table}{left_where}), \
         right_cnt AS (SELECT COUNT(*) AS cnt FROM {right_table}{right_where}) \
         SELECT CASE WHEN left_cnt.cnt = 0 THEN '{left_name}' \
         WHEN right_cnt.cnt = 0 THEN '{right_name}' \
         ELSE '' END AS empty_table \
         FROM left_cnt CROSS JOIN right_cnt",
        left_where = padded_where(left_filters),
        right_where = padded_where(right_filters),
        left_name = escape_sql_string(left_table),
        right_name = escape_sql_string(right_table),
    )
}
