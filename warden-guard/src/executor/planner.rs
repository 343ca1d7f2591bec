//! Bulk-fetch planning for remote accessors.
//!
//! When a run reads through an accessor, every table is fetched once with a
//! query covering the union of all check restrictions on it, then registered
//! locally under its bare name so the per-check SQL runs unchanged. The
//! union is conservative: any check without a date restriction makes the
//! fetch date-unbounded, and any unfiltered check drops the filter clause.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use tracing::debug;

use crate::checks::{CheckDefinition, CheckKind};
use crate::engine::QueryEngine;
use crate::error::{ErrorContext, Result};
use crate::filters::{render_condition, FilterKind, FilterSpec};

/// Union of the restrictions all checks place on one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataRequirement {
    pub columns: BTreeSet<String>,
    pub select_all: bool,
    /// Date restrictions, OR-combined in the fetch.
    pub date_predicates: BTreeSet<String>,
    /// Set when some check has no date restriction at all.
    pub unbounded_date: bool,
    /// Per-check conjunctions of non-date conditions, OR-combined.
    pub filter_groups: BTreeSet<BTreeSet<String>>,
    /// Set when some check restricts the table by date only (or not at all).
    pub unfiltered: bool,
}

fn predicate_columns(filters: &BTreeMap<String, FilterSpec>) -> BTreeSet<String> {
    filters
        .values()
        .filter(|spec| render_condition(spec).is_some())
        .filter_map(|spec| spec.column.clone())
        .collect()
}

fn non_date_group(filters: &BTreeMap<String, FilterSpec>) -> BTreeSet<String> {
    filters
        .values()
        .filter(|spec| spec.kind != FilterKind::Date)
        .filter_map(render_condition)
        .collect()
}

fn date_predicate(filters: &BTreeMap<String, FilterSpec>) -> Option<String> {
    filters
        .values()
        .find(|spec| spec.kind == FilterKind::Date)
        .and_then(render_condition)
}

fn add_slice(
    plans: &mut BTreeMap<String, DataRequirement>,
    table: &str,
    columns: BTreeSet<String>,
    select_all: bool,
    date_predicate: Option<String>,
    group: BTreeSet<String>,
) {
    let req = plans.entry(table.to_string()).or_default();
    req.columns.extend(columns);
    req.select_all |= select_all;
    match date_predicate {
        Some(predicate) => {
            req.date_predicates.insert(predicate);
        }
        None => req.unbounded_date = true,
    }
    if group.is_empty() {
        req.unfiltered = true;
    } else {
        req.filter_groups.insert(group);
    }
}

fn window_predicate(def: &CheckDefinition, date_column: &str, window_days: u32) -> String {
    format!(
        "{date_column} BETWEEN '{start}' AND '{end}'",
        start = def.window_start(window_days),
        end = def.date_value,
    )
}

/// Computes one fetch requirement per table the checks read.
pub fn plan(checks: &[CheckDefinition]) -> BTreeMap<String, DataRequirement> {
    let mut plans = BTreeMap::new();
    for def in checks {
        match &def.kind {
            CheckKind::MatchRate {
                left_table,
                right_table,
                join_right,
                left_filters,
                right_filters,
                ..
            } => {
                add_slice(
                    &mut plans,
                    left_table,
                    BTreeSet::new(),
                    true,
                    date_predicate(left_filters),
                    non_date_group(left_filters),
                );
                let mut right_columns: BTreeSet<String> =
                    join_right.iter().cloned().collect();
                right_columns.extend(predicate_columns(right_filters));
                add_slice(
                    &mut plans,
                    right_table,
                    right_columns,
                    false,
                    date_predicate(right_filters),
                    non_date_group(right_filters),
                );
            }
            CheckKind::RollingValuesInSet {
                rolling_days,
                date_column,
                ..
            }
            | CheckKind::RelCountChange {
                rolling_days,
                date_column,
            } => {
                let mut columns = predicate_columns(&def.filters);
                columns.insert(date_column.clone());
                columns.insert(def.column.clone());
                add_slice(
                    &mut plans,
                    &def.table,
                    columns,
                    false,
                    Some(window_predicate(def, date_column, *rolling_days)),
                    non_date_group(&def.filters),
                );
            }
            CheckKind::IqrOutlier {
                interval_days,
                date_column,
                ..
            } => {
                let mut columns = predicate_columns(&def.filters);
                columns.insert(date_column.clone());
                columns.insert(def.column.clone());
                add_slice(
                    &mut plans,
                    &def.table,
                    columns,
                    false,
                    Some(window_predicate(def, date_column, *interval_days)),
                    non_date_group(&def.filters),
                );
            }
            _ => {
                let select_all = def.column == "*";
                let mut columns = predicate_columns(&def.filters);
                if !select_all {
                    columns.insert(def.column.clone());
                }
                add_slice(
                    &mut plans,
                    &def.table,
                    columns,
                    select_all,
                    date_predicate(&def.filters),
                    non_date_group(&def.filters),
                );
            }
        }
    }
    plans
}

fn any_of(alternatives: Vec<String>) -> String {
    if alternatives.len() > 1 {
        format!("({})", alternatives.join(" OR "))
    } else {
        alternatives.into_iter().next().unwrap_or_default()
    }
}

/// Renders the accessor-qualified fetch query for one table.
pub fn bulk_query(accessor: &str, table: &str, req: &DataRequirement) -> String {
    let select = if req.select_all || req.columns.is_empty() {
        "*".to_string()
    } else {
        req.columns.iter().cloned().collect::<Vec<_>>().join(", ")
    };

    let mut clauses = Vec::new();
    if !req.unbounded_date && !req.date_predicates.is_empty() {
        clauses.push(any_of(req.date_predicates.iter().cloned().collect()));
    }
    if !req.unfiltered && !req.filter_groups.is_empty() {
        let groups: Vec<String> = req
            .filter_groups
            .iter()
            .map(|group| {
                let conjunction = group.iter().cloned().collect::<Vec<_>>().join(" AND ");
                if group.len() > 1 {
                    format!("({conjunction})")
                } else {
                    conjunction
                }
            })
            .collect();
        clauses.push(any_of(groups));
    }

    let mut sql = format!("SELECT {select} FROM {accessor}.{table}");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql
}

/// Fetches every planned table slice through the engine and registers it in
/// the local session under its bare name.
pub async fn fetch_into_memory(
    engine: &dyn QueryEngine,
    accessor: &str,
    plans: &BTreeMap<String, DataRequirement>,
    ctx: &SessionContext,
) -> Result<()> {
    for (table, req) in plans {
        let sql = bulk_query(accessor, table, req);
        debug!(table = %table, sql = %sql, "fetching table slice");
        let (schema, batches) = engine.fetch(&sql).await?;
        let rows: usize = batches.iter().map(|batch| batch.num_rows()).sum();
        debug!(table = %table, rows, "registering local table");
        let mem = MemTable::try_new(schema, vec![batches])
            .with_context(|| format!("materializing fetched table '{table}'"))?;
        ctx.register_table(table.as_str(), Arc::new(mem))
            .with_context(|| format!("registering fetched table '{table}'"))?;
    }
    Ok(())
}
