//! Resolved run configuration and the three-layer defaults merge.
//!
//! A run is declared as a set of check bundles under a shared set of
//! defaults. Settings are merged per field in three layers (global defaults,
//! bundle defaults, the check itself, later layers overriding earlier ones)
//! by the pure [`CheckSettings::layered`] function; the check factory then
//! validates and freezes the merged settings into an immutable
//! `CheckDefinition`. All structs derive `Deserialize` so an embedding
//! application can load them from YAML or JSON; the loading surface itself
//! lives outside this crate.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::filters::FilterConfig;

/// Tag naming a check kind in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    NullRatio,
    RegexMatch,
    ValuesInSet,
    RollingValuesInSet,
    Duplicate,
    Count,
    Average,
    Max,
    Min,
    Occurrence,
    MatchRate,
    RelCountChange,
    IqrOutlier,
}

/// How the identifier column of result records is labeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierFormat {
    /// Always label the column `IDENTIFIER`.
    #[default]
    Identifier,
    /// Label the column with the upper-cased name of the identifier filter.
    FilterName,
    /// Label the column with the upper-cased column of the identifier filter.
    ColumnName,
}

/// Flat, partially specified check settings.
///
/// Every field is optional; a concrete check sees the field-wise merge of the
/// global, bundle, and check layers. Filter maps merge per key instead of
/// wholesale, so a bundle can add a date filter without repeating the global
/// identifier filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckSettings {
    pub table: Option<String>,
    pub left_table: Option<String>,
    pub right_table: Option<String>,
    pub column: Option<String>,
    pub lower_threshold: Option<f64>,
    pub upper_threshold: Option<f64>,
    pub monitor_only: Option<bool>,
    pub extra_info: Option<String>,
    pub date_info: Option<String>,
    /// Day offset applied during relative-date resolution of date filters.
    pub date_offset: Option<i64>,
    #[serde(default)]
    pub filters: BTreeMap<String, FilterConfig>,
    /// Additional filters applied only to the left side of a match-rate join.
    #[serde(default)]
    pub filters_left: BTreeMap<String, FilterConfig>,
    /// Additional filters applied only to the right side of a match-rate join.
    #[serde(default)]
    pub filters_right: BTreeMap<String, FilterConfig>,
    pub regex: Option<String>,
    pub value_set: Option<Value>,
    pub rolling_days: Option<u32>,
    pub distinct: Option<bool>,
    pub max_or_min: Option<String>,
    pub join_columns: Option<Vec<String>>,
    pub join_columns_left: Option<Vec<String>>,
    pub join_columns_right: Option<Vec<String>>,
    pub interval_days: Option<u32>,
    pub how: Option<String>,
    pub iqr_factor: Option<f64>,
}

macro_rules! pick {
    ($check:expr, $bundle:expr, $global:expr, $field:ident) => {
        $check
            .$field
            .clone()
            .or_else(|| $bundle.$field.clone())
            .or_else(|| $global.$field.clone())
    };
}

fn merge_filters(
    global: &BTreeMap<String, FilterConfig>,
    bundle: &BTreeMap<String, FilterConfig>,
    check: &BTreeMap<String, FilterConfig>,
) -> BTreeMap<String, FilterConfig> {
    let mut merged = global.clone();
    merged.extend(bundle.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged.extend(check.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

impl CheckSettings {
    /// Merges three layers of settings, later layers overriding earlier ones.
    pub fn layered(global: &Self, bundle: &Self, check: &Self) -> Self {
        Self {
            table: pick!(check, bundle, global, table),
            left_table: pick!(check, bundle, global, left_table),
            right_table: pick!(check, bundle, global, right_table),
            column: pick!(check, bundle, global, column),
            lower_threshold: pick!(check, bundle, global, lower_threshold),
            upper_threshold: pick!(check, bundle, global, upper_threshold),
            monitor_only: pick!(check, bundle, global, monitor_only),
            extra_info: pick!(check, bundle, global, extra_info),
            date_info: pick!(check, bundle, global, date_info),
            date_offset: pick!(check, bundle, global, date_offset),
            filters: merge_filters(&global.filters, &bundle.filters, &check.filters),
            filters_left: merge_filters(
                &global.filters_left,
                &bundle.filters_left,
                &check.filters_left,
            ),
            filters_right: merge_filters(
                &global.filters_right,
                &bundle.filters_right,
                &check.filters_right,
            ),
            regex: pick!(check, bundle, global, regex),
            value_set: pick!(check, bundle, global, value_set),
            rolling_days: pick!(check, bundle, global, rolling_days),
            distinct: pick!(check, bundle, global, distinct),
            max_or_min: pick!(check, bundle, global, max_or_min),
            join_columns: pick!(check, bundle, global, join_columns),
            join_columns_left: pick!(check, bundle, global, join_columns_left),
            join_columns_right: pick!(check, bundle, global, join_columns_right),
            interval_days: pick!(check, bundle, global, interval_days),
            how: pick!(check, bundle, global, how),
            iqr_factor: pick!(check, bundle, global, iqr_factor),
        }
    }
}

/// Run-wide defaults, including the identifier labeling policy.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalDefaults {
    #[serde(default)]
    pub identifier_format: IdentifierFormat,
    /// Identifier reported when a check has no identifier filter value.
    #[serde(default = "default_identifier_placeholder")]
    pub identifier_placeholder: String,
    #[serde(default)]
    pub settings: CheckSettings,
}

fn default_identifier_placeholder() -> String {
    "ALL".to_string()
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            identifier_format: IdentifierFormat::default(),
            identifier_placeholder: default_identifier_placeholder(),
            settings: CheckSettings::default(),
        }
    }
}

/// One declared check: its kind tag plus its own settings layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckConfig {
    pub check_type: CheckType,
    #[serde(flatten)]
    pub settings: CheckSettings,
}

/// A named group of checks sharing a defaults layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckBundle {
    pub name: String,
    #[serde(default)]
    pub defaults: CheckSettings,
    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

/// The resolved configuration of one executor run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub name: String,
    /// Remote accessor (catalog / attached database) the bulk fetch reads
    /// from. When absent, checks query the engine directly.
    #[serde(default)]
    pub accessor: Option<String>,
    #[serde(default)]
    pub defaults: GlobalDefaults,
    #[serde(default)]
    pub bundles: Vec<CheckBundle>,
}
