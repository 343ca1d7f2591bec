//! Filter predicates and their resolution.
//!
//! A check restricts the data it inspects through a set of named filters.
//! Each filter carries a column, a value, an operator, and a kind that gives
//! it typed semantics: `date` filters undergo relative-date resolution,
//! `identifier` filters label the data slice a result belongs to, and `other`
//! filters pass through verbatim. Filters are kept in a `BTreeMap` so that
//! every rendering of them (WHERE clauses, cache signatures) is deterministic.

pub(crate) mod where_clause;

pub use where_clause::{build_conditions, build_where_clause, render_condition, sql_literal};

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, WardenError};

/// Comparison operator of a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum FilterOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "LIKE")]
    Like,
}

impl FilterOperator {
    /// The SQL spelling of this operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
        }
    }

    /// Whether this operator takes a parenthesized list of values.
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// Typed semantics of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// The filter restricts the check date; its value undergoes
    /// relative-date resolution. At most one per check.
    Date,
    /// The filter names the data slice (tenant, shop, ...) a result belongs
    /// to. At most one per check. With no value it is a naming-only hint.
    Identifier,
    /// A generic predicate; the value passes through verbatim.
    #[default]
    Other,
}

/// Declarative filter as it appears in configuration, before resolution.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Column the predicate applies to. A `kind = identifier` filter without
    /// a column contributes nothing to the WHERE clause.
    #[serde(default)]
    pub column: Option<String>,
    /// Filter value; `null` renders as `IS [NOT] NULL`.
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub operator: FilterOperator,
    #[serde(default)]
    pub kind: FilterKind,
    /// Resolve the value as a (possibly relative) date even though the
    /// filter kind is not `date`.
    #[serde(default)]
    pub parse_as_date: bool,
}

/// A resolved, validated filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    pub name: String,
    pub column: Option<String>,
    pub value: Option<Value>,
    pub operator: FilterOperator,
    pub kind: FilterKind,
}

impl FilterSpec {
    /// A naming-only identifier filter labels results but never appears in
    /// the predicate.
    pub fn is_naming_only(&self) -> bool {
        self.kind == FilterKind::Identifier && self.value.is_none()
    }

    /// Structural signature used to key the data-existence cache.
    pub fn signature(&self) -> String {
        let value = match &self.value {
            Some(v) => v.to_string(),
            None => "null".to_string(),
        };
        format!(
            "{}|{}|{}|{:?}",
            self.column.as_deref().unwrap_or(""),
            self.operator.as_sql(),
            value,
            self.kind
        )
    }
}

static RELATIVE_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(today|yesterday|tomorrow)(?:([+-][0-9]+))?$").expect("valid regex")
});

/// Resolves a date expression to a concrete date.
///
/// The grammar accepts `today`, `yesterday`, and `tomorrow`, each optionally
/// suffixed with an inline integer offset (`today-2`, `yesterday+3`). Any
/// other input is parsed as an ISO-8601 date (`2023-01-01`) or its compact
/// form (`20230101`). The `offset_days` parameter composes additively with
/// the inline suffix.
pub fn parse_relative_date(raw: &str, offset_days: i64, today: NaiveDate) -> Result<NaiveDate> {
    let normalized = raw.trim().to_ascii_lowercase();

    let (base, inline_offset) = if let Some(caps) = RELATIVE_DATE_RE.captures(&normalized) {
        let keyword_offset = match &caps[1] {
            "yesterday" => -1,
            "tomorrow" => 1,
            _ => 0,
        };
        let inline = caps
            .get(2)
            .map(|m| m.as_str().parse::<i64>())
            .transpose()
            .map_err(|e| WardenError::Parse(format!("invalid date offset in '{raw}': {e}")))?
            .unwrap_or(0);
        (today, keyword_offset + inline)
    } else {
        let parsed = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&normalized, "%Y%m%d"))
            .map_err(|_| {
                WardenError::Parse(format!(
                    "could not parse '{raw}' as a date; expected 'today', 'yesterday', \
                     'tomorrow', an inline offset like 'today-2', or an ISO-8601 date"
                ))
            })?;
        (parsed, 0)
    };

    shift_date(base, offset_days + inline_offset, raw)
}

fn shift_date(date: NaiveDate, days: i64, raw: &str) -> Result<NaiveDate> {
    let shifted = if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    shifted.ok_or_else(|| WardenError::Parse(format!("date offset overflow for '{raw}'")))
}

/// Resolves and validates a set of declared filters.
///
/// Validation rules:
/// - at most one `date` and one `identifier` filter per set,
/// - list values only with `IN`/`NOT IN`, and `IN`/`NOT IN` only with lists,
/// - `null` values only with `=`/`!=` (naming-only identifiers excepted),
/// - `date` (and `parse_as_date`) values resolve through
///   [`parse_relative_date`] with the check's `date_offset`.
pub fn resolve_filters(
    raw: &BTreeMap<String, FilterConfig>,
    date_offset: i64,
    today: NaiveDate,
) -> Result<BTreeMap<String, FilterSpec>> {
    let mut date_count = 0usize;
    let mut identifier_count = 0usize;
    let mut resolved = BTreeMap::new();

    for (name, config) in raw {
        match config.kind {
            FilterKind::Date => date_count += 1,
            FilterKind::Identifier => identifier_count += 1,
            FilterKind::Other => {}
        }

        let mut value = config.value.clone();

        match &value {
            None => {
                let naming_only = config.kind == FilterKind::Identifier;
                if !naming_only && !matches!(config.operator, FilterOperator::Eq | FilterOperator::Ne)
                {
                    return Err(WardenError::Configuration(format!(
                        "filter '{name}': a null value is only valid with '=' or '!='"
                    )));
                }
            }
            Some(Value::Array(_)) => {
                if !config.operator.takes_list() {
                    return Err(WardenError::Configuration(format!(
                        "filter '{name}': list values require the 'IN' or 'NOT IN' operator"
                    )));
                }
            }
            Some(_) => {
                if config.operator.takes_list() {
                    return Err(WardenError::Configuration(format!(
                        "filter '{name}': the '{}' operator requires a list value",
                        config.operator.as_sql()
                    )));
                }
            }
        }

        if config.kind == FilterKind::Date || config.parse_as_date {
            value = match value {
                Some(v) => {
                    let raw_date = match &v {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        _ => {
                            return Err(WardenError::Configuration(format!(
                                "filter '{name}': date filters take a single scalar value"
                            )))
                        }
                    };
                    let date = parse_relative_date(&raw_date, date_offset, today)?;
                    Some(Value::String(date.to_string()))
                }
                None => None,
            };
        }

        resolved.insert(
            name.clone(),
            FilterSpec {
                name: name.clone(),
                column: config.column.clone(),
                value,
                operator: config.operator,
                kind: config.kind,
            },
        );
    }

    if date_count > 1 {
        return Err(WardenError::Configuration(
            "at most one filter may have kind 'date'".to_string(),
        ));
    }
    if identifier_count > 1 {
        return Err(WardenError::Configuration(
            "at most one filter may have kind 'identifier'".to_string(),
        ));
    }

    Ok(resolved)
}
