//! The check-definition family.
//!
//! Check kinds form a closed sum type, [`CheckKind`], with one module per
//! kind providing its metric query, its data-existence probe, and (where the
//! raw rows need post-processing) its result interpretation. A
//! [`CheckDefinition`] is immutable: it is built once per declared check from
//! the merged settings by [`CheckDefinition::build`], which performs all
//! configuration validation before any query runs.

pub mod count;
pub mod duplicate;
pub mod iqr_outlier;
pub mod match_rate;
pub mod null_ratio;
pub mod occurrence;
pub mod regex_match;
pub mod rel_count_change;
pub mod statistic;
pub mod values_in_set;

use std::collections::{BTreeMap, BTreeSet};

use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate};
use serde_json::Value;

use crate::config::{CheckSettings, CheckType, IdentifierFormat, RunConfig};
use crate::engine;
use crate::error::{Result, WardenError};
use crate::filters::{
    build_conditions, build_where_clause, resolve_filters, FilterConfig, FilterKind, FilterSpec,
};

/// Aggregate statistic of a [`CheckKind::Statistic`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticKind {
    Average,
    Max,
    Min,
}

impl StatisticKind {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Average => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::Average => "average",
            Self::Max => "max",
            Self::Min => "min",
        }
    }
}

/// Whether an occurrence check looks at the most or least frequent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccurrenceMode {
    Max,
    Min,
}

impl OccurrenceMode {
    fn suffix(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::Min => "min",
        }
    }
}

/// Which IQR-derived bounds replace the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqrBounds {
    Both,
    Upper,
    Lower,
}

impl IqrBounds {
    fn label(&self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::Upper => "upper",
            Self::Lower => "lower",
        }
    }
}

/// Kind-specific parameters of a check.
#[derive(Debug, Clone)]
pub enum CheckKind {
    NullRatio,
    RegexMatch {
        regex: String,
    },
    ValuesInSet {
        values: Vec<Value>,
    },
    RollingValuesInSet {
        values: Vec<Value>,
        rolling_days: u32,
        date_column: String,
    },
    Duplicate,
    Count {
        distinct: bool,
    },
    Statistic {
        stat: StatisticKind,
    },
    Occurrence {
        mode: OccurrenceMode,
    },
    MatchRate {
        left_table: String,
        right_table: String,
        join_left: Vec<String>,
        join_right: Vec<String>,
        left_filters: BTreeMap<String, FilterSpec>,
        right_filters: BTreeMap<String, FilterSpec>,
    },
    RelCountChange {
        rolling_days: u32,
        date_column: String,
    },
    IqrOutlier {
        interval_days: u32,
        iqr_factor: f64,
        how: IqrBounds,
        date_column: String,
    },
}

/// The value a metric query produced, with the thresholds it is judged
/// against (IQR checks derive those bounds from the data itself).
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub value: Option<f64>,
    pub lower: f64,
    pub upper: f64,
}

/// Run-level inputs the check factory needs besides the merged settings.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub accessor: Option<String>,
    pub identifier_format: IdentifierFormat,
    pub identifier_placeholder: String,
    pub today: NaiveDate,
}

impl BuildContext {
    pub fn new(config: &RunConfig, today: NaiveDate) -> Self {
        Self {
            accessor: config.accessor.clone(),
            identifier_format: config.defaults.identifier_format,
            identifier_placeholder: config.defaults.identifier_placeholder.clone(),
            today,
        }
    }
}

/// An immutable, fully validated data-quality check.
#[derive(Debug, Clone)]
pub struct CheckDefinition {
    pub kind: CheckKind,
    /// Metric name, e.g. `category_null_ratio`.
    pub name: String,
    /// Reported table name (for joins, `{left}_JOIN_{right}`).
    pub table: String,
    pub column: String,
    /// Resolved filters. Windowed kinds carry their date restriction in the
    /// kind instead, so it never appears here twice.
    pub filters: BTreeMap<String, FilterSpec>,
    pub lower_threshold: f64,
    pub upper_threshold: f64,
    pub monitor_only: bool,
    /// Pre-padded suffix appended to failure messages, or empty.
    pub extra_info: String,
    /// Pre-padded parenthetical after the date in failure messages, or empty.
    pub date_info: String,
    /// The data slice this check belongs to.
    pub identifier: String,
    /// Column label under which the identifier is reported.
    pub identifier_column: String,
    pub date_value: NaiveDate,
    pub has_date_filter: bool,
    /// Remote accessor; part of the existence-cache key only, since by the
    /// time a check query runs its table is either local or directly
    /// addressable by its bare name.
    pub accessor: Option<String>,
}

fn conf(msg: impl Into<String>) -> WardenError {
    WardenError::Configuration(msg.into())
}

fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The last dotted segment of a possibly qualified column name.
pub(crate) fn short_column(column: &str) -> &str {
    column.rsplit('.').next().unwrap_or(column)
}

pub(crate) fn escape_sql_string(s: &str) -> String {
    s.replace('\'', "''")
}

fn factor_tag(factor: f64) -> String {
    let rendered = if factor.fract() == 0.0 {
        format!("{factor:.1}")
    } else {
        factor.to_string()
    };
    rendered.replace('.', "_")
}

fn metric_name(kind: &CheckKind, column: &str) -> String {
    let short = short_column(column);
    match kind {
        CheckKind::NullRatio => format!("{short}_null_ratio"),
        CheckKind::RegexMatch { .. } => format!("{short}_regex_match_ratio"),
        CheckKind::ValuesInSet { .. } => format!("{short}_values_in_set_ratio"),
        CheckKind::RollingValuesInSet { .. } => format!("{short}_rolling_values_in_set_ratio"),
        CheckKind::Duplicate => format!("{short}_duplicates"),
        CheckKind::Count { distinct } => {
            let suffix = if *distinct { "distinct_count" } else { "count" };
            if column == "*" {
                format!("row_{suffix}")
            } else {
                format!("{short}_{suffix}")
            }
        }
        CheckKind::Statistic { stat } => format!("{short}_{}", stat.suffix()),
        CheckKind::Occurrence { mode } => format!("{short}_occurrence_{}", mode.suffix()),
        CheckKind::MatchRate { .. } => format!("{short}_matchrate"),
        CheckKind::RelCountChange { .. } => format!("{short}_count_change"),
        CheckKind::IqrOutlier {
            how, iqr_factor, ..
        } => format!("{short}_outlier_iqr_{}_{}", how.label(), factor_tag(*iqr_factor)),
    }
}

fn resolve_identifier_label(
    format: IdentifierFormat,
    identifier_filter: Option<&FilterSpec>,
) -> Result<String> {
    match (format, identifier_filter) {
        (IdentifierFormat::Identifier, _) | (_, None) => Ok("IDENTIFIER".to_string()),
        (IdentifierFormat::FilterName, Some(spec)) => Ok(spec.name.to_uppercase()),
        (IdentifierFormat::ColumnName, Some(spec)) => spec
            .column
            .as_deref()
            .map(str::to_uppercase)
            .ok_or_else(|| {
                conf(format!(
                    "identifier_format 'column_name' requires the identifier filter \
                     '{}' to have a column",
                    spec.name
                ))
            }),
    }
}

struct ResolvedFilterSet {
    filters: BTreeMap<String, FilterSpec>,
    date_filter: Option<FilterSpec>,
    identifier_filter: Option<FilterSpec>,
    date_value: NaiveDate,
    has_date_filter: bool,
}

fn resolve_filter_set(
    raw: &BTreeMap<String, FilterConfig>,
    date_offset: i64,
    today: NaiveDate,
) -> Result<ResolvedFilterSet> {
    let filters = resolve_filters(raw, date_offset, today)?;
    let date_filter = filters
        .values()
        .find(|f| f.kind == FilterKind::Date)
        .cloned();
    let identifier_filter = filters
        .values()
        .find(|f| f.kind == FilterKind::Identifier)
        .cloned();

    let (date_value, has_date_filter) = match &date_filter {
        Some(spec) => {
            let raw_value = spec
                .value
                .as_ref()
                .and_then(Value::as_str)
                .ok_or_else(|| conf(format!("date filter '{}' requires a value", spec.name)))?;
            let parsed = NaiveDate::parse_from_str(raw_value, "%Y-%m-%d")
                .map_err(|e| WardenError::Parse(format!("invalid resolved date: {e}")))?;
            (parsed, true)
        }
        None => (today, false),
    };

    Ok(ResolvedFilterSet {
        filters,
        date_filter,
        identifier_filter,
        date_value,
        has_date_filter,
    })
}

impl CheckDefinition {
    /// Validates the merged settings and freezes them into a check.
    ///
    /// Configuration errors are raised here, before any query executes.
    pub fn build(
        check_type: CheckType,
        settings: &CheckSettings,
        ctx: &BuildContext,
    ) -> Result<Self> {
        let date_offset = settings.date_offset.unwrap_or(0);
        let resolved = resolve_filter_set(&settings.filters, date_offset, ctx.today)?;

        let identifier = resolved
            .identifier_filter
            .as_ref()
            .and_then(|f| f.value.as_ref())
            .map(value_to_plain_string)
            .unwrap_or_else(|| ctx.identifier_placeholder.clone());
        let identifier_column =
            resolve_identifier_label(ctx.identifier_format, resolved.identifier_filter.as_ref())?;

        let require_table = || {
            settings
                .table
                .clone()
                .ok_or_else(|| conf("'table' is required"))
        };
        let require_column = || {
            settings
                .column
                .clone()
                .ok_or_else(|| conf("'column' is required"))
        };
        let require_date_column = || {
            resolved
                .date_filter
                .as_ref()
                .and_then(|f| f.column.clone())
                .ok_or_else(|| conf("a date filter with a column and value is mandatory"))
        };

        let mut filters = resolved.filters.clone();
        let table;
        let column;
        let mut lower = settings.lower_threshold.unwrap_or(f64::NEG_INFINITY);
        let mut upper = settings.upper_threshold.unwrap_or(f64::INFINITY);

        let kind = match check_type {
            CheckType::NullRatio => {
                table = require_table()?;
                column = require_column()?;
                CheckKind::NullRatio
            }
            CheckType::RegexMatch => {
                table = require_table()?;
                column = require_column()?;
                let regex = settings
                    .regex
                    .clone()
                    .ok_or_else(|| conf("'regex' is required"))?;
                regex::Regex::new(&regex)
                    .map_err(|e| conf(format!("invalid 'regex' pattern: {e}")))?;
                CheckKind::RegexMatch { regex }
            }
            CheckType::ValuesInSet => {
                table = require_table()?;
                column = require_column()?;
                CheckKind::ValuesInSet {
                    values: Self::required_value_set(settings)?,
                }
            }
            CheckType::RollingValuesInSet => {
                table = require_table()?;
                column = require_column()?;
                let date_column = require_date_column()?;
                if let Some(spec) = &resolved.date_filter {
                    filters.remove(&spec.name);
                }
                CheckKind::RollingValuesInSet {
                    values: Self::required_value_set(settings)?,
                    rolling_days: settings.rolling_days.unwrap_or(14),
                    date_column,
                }
            }
            CheckType::Duplicate => {
                table = require_table()?;
                column = require_column()?;
                CheckKind::Duplicate
            }
            CheckType::Count => {
                table = require_table()?;
                column = settings.column.clone().unwrap_or_else(|| "*".to_string());
                let distinct = settings.distinct.unwrap_or(false);
                if distinct && column == "*" {
                    return Err(conf(
                        "cannot COUNT(DISTINCT *); set a column or distinct = false",
                    ));
                }
                CheckKind::Count { distinct }
            }
            CheckType::Average | CheckType::Max | CheckType::Min => {
                table = require_table()?;
                column = require_column()?;
                let stat = match check_type {
                    CheckType::Average => StatisticKind::Average,
                    CheckType::Max => StatisticKind::Max,
                    _ => StatisticKind::Min,
                };
                CheckKind::Statistic { stat }
            }
            CheckType::Occurrence => {
                table = require_table()?;
                column = require_column()?;
                let mode = match settings.max_or_min.as_deref() {
                    Some("max") => OccurrenceMode::Max,
                    Some("min") => OccurrenceMode::Min,
                    other => {
                        return Err(conf(format!(
                            "'max_or_min' must be 'max' or 'min', got {:?}",
                            other.unwrap_or("<missing>")
                        )))
                    }
                };
                CheckKind::Occurrence { mode }
            }
            CheckType::MatchRate => {
                let left_table = settings
                    .left_table
                    .clone()
                    .ok_or_else(|| conf("'left_table' is required"))?;
                let right_table = settings
                    .right_table
                    .clone()
                    .ok_or_else(|| conf("'right_table' is required"))?;
                column = require_column()?;
                table = format!("{left_table}_JOIN_{right_table}");

                let (join_left, join_right) = Self::resolve_join_columns(settings)?;

                let mut left_raw = settings.filters.clone();
                left_raw.extend(
                    settings
                        .filters_left
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                let mut right_raw = settings.filters.clone();
                right_raw.extend(
                    settings
                        .filters_right
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                let left = resolve_filter_set(&left_raw, date_offset, ctx.today)?;
                let right = resolve_filter_set(&right_raw, date_offset, ctx.today)?;

                CheckKind::MatchRate {
                    left_table,
                    right_table,
                    join_left,
                    join_right,
                    left_filters: left.filters,
                    right_filters: right.filters,
                }
            }
            CheckType::RelCountChange => {
                table = require_table()?;
                column = require_column()?;
                let date_column = require_date_column()?;
                if let Some(spec) = &resolved.date_filter {
                    filters.remove(&spec.name);
                }
                CheckKind::RelCountChange {
                    rolling_days: settings
                        .rolling_days
                        .ok_or_else(|| conf("'rolling_days' is required"))?,
                    date_column,
                }
            }
            CheckType::IqrOutlier => {
                table = require_table()?;
                column = require_column()?;
                let date_column = require_date_column()?;
                if let Some(spec) = &resolved.date_filter {
                    filters.remove(&spec.name);
                }
                let interval_days = settings
                    .interval_days
                    .ok_or_else(|| conf("'interval_days' is required"))?;
                if interval_days < 1 {
                    return Err(conf("'interval_days' must be at least 1"));
                }
                let iqr_factor = settings
                    .iqr_factor
                    .ok_or_else(|| conf("'iqr_factor' is required"))?;
                if iqr_factor < 1.5 {
                    return Err(conf("'iqr_factor' must be at least 1.5"));
                }
                let how = match settings.how.as_deref() {
                    Some("both") => IqrBounds::Both,
                    Some("upper") => IqrBounds::Upper,
                    Some("lower") => IqrBounds::Lower,
                    other => {
                        return Err(conf(format!(
                            "'how' must be one of 'both', 'upper', 'lower', got {:?}",
                            other.unwrap_or("<missing>")
                        )))
                    }
                };
                // the IQR method derives its bounds from the data
                lower = f64::NEG_INFINITY;
                upper = f64::INFINITY;
                CheckKind::IqrOutlier {
                    interval_days,
                    iqr_factor,
                    how,
                    date_column,
                }
            }
        };

        let name = metric_name(&kind, &column);
        Ok(Self {
            kind,
            name,
            table,
            column,
            filters,
            lower_threshold: lower,
            upper_threshold: upper,
            monitor_only: settings.monitor_only.unwrap_or(false),
            extra_info: settings
                .extra_info
                .as_deref()
                .map(|s| format!(" {s}"))
                .unwrap_or_default(),
            date_info: settings
                .date_info
                .as_deref()
                .map(|s| format!(" ({s})"))
                .unwrap_or_default(),
            identifier,
            identifier_column,
            date_value: resolved.date_value,
            has_date_filter: resolved.has_date_filter,
            accessor: ctx.accessor.clone(),
        })
    }

    fn required_value_set(settings: &CheckSettings) -> Result<Vec<Value>> {
        let raw = settings
            .value_set
            .as_ref()
            .ok_or_else(|| conf("'value_set' is required"))?;
        let values = values_in_set::parse_value_set(raw)?;
        if values.is_empty() {
            return Err(conf("'value_set' must not be empty"));
        }
        Ok(values)
    }

    fn resolve_join_columns(settings: &CheckSettings) -> Result<(Vec<String>, Vec<String>)> {
        let shared = settings.join_columns.clone().unwrap_or_default();
        let left = settings
            .join_columns_left
            .clone()
            .unwrap_or_else(|| shared.clone());
        let right = settings
            .join_columns_right
            .clone()
            .unwrap_or_else(|| shared.clone());
        if left.is_empty() || right.is_empty() {
            return Err(conf(
                "no join columns given; use 'join_columns' or both \
                 'join_columns_left' and 'join_columns_right'",
            ));
        }
        if left.len() != right.len() {
            return Err(conf(format!(
                "'join_columns_left' and 'join_columns_right' must have equal length \
                 ({} vs. {})",
                left.len(),
                right.len()
            )));
        }
        Ok((left, right))
    }

    /// Assembles the metric-producing query for this check.
    pub fn metric_query(&self) -> String {
        match &self.kind {
            CheckKind::NullRatio => null_ratio::metric_sql(self),
            CheckKind::RegexMatch { regex } => regex_match::metric_sql(self, regex),
            CheckKind::ValuesInSet { values } => values_in_set::metric_sql(self, values),
            CheckKind::RollingValuesInSet {
                values,
                rolling_days,
                date_column,
            } => values_in_set::rolling_metric_sql(self, values, *rolling_days, date_column),
            CheckKind::Duplicate => duplicate::metric_sql(self),
            CheckKind::Count { distinct } => count::metric_sql(self, *distinct),
            CheckKind::Statistic { stat } => statistic::metric_sql(self, *stat),
            CheckKind::Occurrence { mode } => occurrence::metric_sql(self, *mode),
            CheckKind::MatchRate {
                left_table,
                right_table,
                join_left,
                join_right,
                left_filters,
                right_filters,
            } => match_rate::metric_sql(
                self,
                left_table,
                right_table,
                join_left,
                join_right,
                left_filters,
                right_filters,
            ),
            CheckKind::RelCountChange {
                rolling_days,
                date_column,
            } => rel_count_change::metric_sql(self, *rolling_days, date_column),
            CheckKind::IqrOutlier {
                interval_days,
                date_column,
                ..
            } => iqr_outlier::metric_sql(self, *interval_days, date_column),
        }
    }

    /// Assembles the data-existence probe for this check.
    ///
    /// The probe returns an `empty_table` marker column: an empty string when
    /// data is present, otherwise the name of the empty table. Windowed
    /// checks probe only the single check date, not the widened window.
    pub fn existence_query(&self) -> String {
        match &self.kind {
            CheckKind::MatchRate {
                left_table,
                right_table,
                left_filters,
                right_filters,
                ..
            } => match_rate::existence_sql(left_table, right_table, left_filters, right_filters),
            CheckKind::RollingValuesInSet { date_column, .. }
            | CheckKind::RelCountChange { date_column, .. } => {
                let where_clause = self.single_day_where(date_column);
                format!(
                    "SELECT CASE WHEN COUNT(*) > 0 THEN '' ELSE '{table}' END AS empty_table \
                     FROM {from} {where_clause}",
                    table = escape_sql_string(&self.table),
                    from = self.table,
                )
            }
            CheckKind::IqrOutlier { date_column, .. } => {
                iqr_outlier::existence_sql(self, date_column)
            }
            _ => self.select_metric(&format!(
                "CASE WHEN COUNT(*) > 0 THEN '' ELSE '{table}' END AS empty_table",
                table = escape_sql_string(&self.table),
            )),
        }
    }

    /// Reads the metric value (and, for IQR checks, the derived bounds)
    /// out of the raw query result.
    pub fn interpret(&self, batches: &[RecordBatch]) -> Result<MetricReading> {
        match &self.kind {
            CheckKind::IqrOutlier {
                iqr_factor, how, ..
            } => iqr_outlier::interpret(batches, *iqr_factor, *how),
            _ => Ok(MetricReading {
                value: engine::scalar_f64(batches, &self.name)?,
                lower: self.lower_threshold,
                upper: self.upper_threshold,
            }),
        }
    }

    /// Structural signatures of every filter restricting this check's data,
    /// including the side-specific filters of a join.
    pub fn filter_signatures(&self) -> BTreeSet<String> {
        let mut signatures: BTreeSet<String> =
            self.filters.values().map(FilterSpec::signature).collect();
        if let CheckKind::MatchRate {
            left_filters,
            right_filters,
            ..
        } = &self.kind
        {
            signatures.extend(left_filters.values().map(FilterSpec::signature));
            signatures.extend(right_filters.values().map(FilterSpec::signature));
        }
        signatures
    }

    /// The metric alias, double-quoted so the result schema preserves it.
    pub(crate) fn quoted_name(&self) -> String {
        format!("\"{}\"", self.name)
    }

    /// `SELECT {expr} FROM {table}` plus this check's WHERE clause.
    pub(crate) fn select_metric(&self, expr: &str) -> String {
        let where_clause = build_where_clause(&self.filters);
        if where_clause.is_empty() {
            format!("SELECT {expr} FROM {}", self.table)
        } else {
            format!("SELECT {expr} FROM {} {where_clause}", self.table)
        }
    }

    /// WHERE clause pinning the check date plus all other conditions.
    pub(crate) fn single_day_where(&self, date_column: &str) -> String {
        let mut conditions = build_conditions(&self.filters);
        conditions.push(format!("{date_column} = '{}'", self.date_value));
        format!("WHERE {}", conditions.join(" AND "))
    }

    /// WHERE clause covering an inclusive trailing window ending at the
    /// check date, plus all other conditions.
    pub(crate) fn windowed_where(&self, date_column: &str, window_days: u32) -> String {
        let start = self.window_start(window_days);
        let mut conditions = vec![format!(
            "{date_column} BETWEEN '{start}' AND '{end}'",
            end = self.date_value
        )];
        conditions.extend(build_conditions(&self.filters));
        format!("WHERE {}", conditions.join(" AND "))
    }

    pub(crate) fn window_start(&self, window_days: u32) -> NaiveDate {
        self.date_value
            .checked_sub_days(Days::new(window_days as u64))
            .unwrap_or(self.date_value)
    }
}
