//! Threshold evaluation, human-readable messages, and result records.
//!
//! A metric value passes when it lies inside the inclusive
//! `[lower, upper]` interval. NULL metrics fail: a query that cannot produce
//! a value is treated as bad data, not as a pass (missing source data is
//! caught earlier, by the existence probe, and reported as a failing
//! [`DATA_EXISTS_METRIC`] record).

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::checks::{CheckDefinition, MetricReading};

/// Metric name of the failing record emitted when an existence probe finds
/// no data for a check's slice.
pub const DATA_EXISTS_METRIC: &str = "data_exists";

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Success,
    Fail,
    /// The metric query errored.
    Error,
    /// The check ran but its thresholds are informational only.
    MonitorOnly,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Fail => "FAIL",
            Self::Error => "ERROR",
            Self::MonitorOnly => "MONITOR_ONLY",
        }
    }
}

/// Judges a metric reading against its thresholds.
pub fn classify(def: &CheckDefinition, reading: &MetricReading) -> CheckStatus {
    if def.monitor_only {
        return CheckStatus::MonitorOnly;
    }
    match reading.value {
        None => CheckStatus::Fail,
        Some(value) => {
            if reading.lower <= value && value <= reading.upper {
                CheckStatus::Success
            } else {
                CheckStatus::Fail
            }
        }
    }
}

/// Renders a value at four decimals, widening the precision until a nonzero
/// value no longer rounds to zero.
///
/// `0.00001` renders as `0.00001`, not `0.0000`; genuine zero stays `0.0000`.
pub fn format_value(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let mut precision = 4;
    loop {
        let rendered = format!("{value:.precision$}");
        let rounds_to_zero = value != 0.0 && rendered.parse::<f64>() == Ok(0.0);
        if !rounds_to_zero || precision >= 17 {
            return rendered;
        }
        precision += 1;
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_value).unwrap_or_else(|| "NULL".to_string())
}

/// Message for a check whose value fell outside its thresholds.
pub fn fail_message(def: &CheckDefinition, reading: &MetricReading) -> String {
    format!(
        "{id}: Metric {name} failed on {date}{date_info} for {table}. \
         Value {value} is not between {lower} and {upper}.{extra_info}",
        id = def.identifier,
        name = def.name,
        date = def.date_value,
        date_info = def.date_info,
        table = def.table,
        value = format_optional(reading.value),
        lower = format_value(reading.lower),
        upper = format_value(reading.upper),
        extra_info = def.extra_info,
    )
}

/// Message for a check whose metric query errored.
pub fn error_message(def: &CheckDefinition, error: &str) -> String {
    format!(
        "{id}: Metric {name} query errored with {error}",
        id = def.identifier,
        name = def.name,
    )
}

/// Message for a check skipped because its data slice was empty.
///
/// The text before the final colon is the grouping key under which
/// identifiers of equally affected checks are merged.
pub fn missing_data_message(def: &CheckDefinition, empty_table: &str) -> String {
    format!(
        "No data in {empty_table} on {date} for: {id}",
        date = def.date_value,
        id = def.identifier,
    )
}

/// One row of the run's result table.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub date: NaiveDate,
    pub metric_name: String,
    pub identifier: String,
    /// Label under which the identifier is reported, e.g. `IDENTIFIER`
    /// or an upper-cased filter name.
    pub identifier_column: String,
    pub table: String,
    /// `None` for aggregated absence records, which are not tied to a column.
    pub column: Option<String>,
    pub value: Option<f64>,
    pub lower_threshold: f64,
    pub upper_threshold: f64,
    pub status: CheckStatus,
}

impl ResultRecord {
    pub fn from_reading(
        def: &CheckDefinition,
        reading: &MetricReading,
        status: CheckStatus,
    ) -> Self {
        Self {
            date: def.date_value,
            metric_name: def.name.clone(),
            identifier: def.identifier.clone(),
            identifier_column: def.identifier_column.clone(),
            table: def.table.clone(),
            column: Some(def.column.clone()),
            value: reading.value,
            lower_threshold: reading.lower,
            upper_threshold: reading.upper,
            status,
        }
    }

    pub fn errored(def: &CheckDefinition) -> Self {
        Self {
            date: def.date_value,
            metric_name: def.name.clone(),
            identifier: def.identifier.clone(),
            identifier_column: def.identifier_column.clone(),
            table: def.table.clone(),
            column: Some(def.column.clone()),
            value: None,
            lower_threshold: def.lower_threshold,
            upper_threshold: def.upper_threshold,
            status: CheckStatus::Error,
        }
    }

    /// Failing record for a check whose existence probe found no data.
    ///
    /// Carries the probe-reported empty table under the fixed
    /// [`DATA_EXISTS_METRIC`] name, with no column, value, or thresholds, so
    /// that equally affected checks collapse into one row during
    /// aggregation.
    pub fn data_missing(def: &CheckDefinition, empty_table: &str) -> Self {
        Self {
            date: def.date_value,
            metric_name: DATA_EXISTS_METRIC.to_string(),
            identifier: def.identifier.clone(),
            identifier_column: def.identifier_column.clone(),
            table: empty_table.to_string(),
            column: None,
            value: None,
            lower_threshold: f64::NEG_INFINITY,
            upper_threshold: f64::INFINITY,
            status: CheckStatus::Fail,
        }
    }

    /// Serializes the record into a JSON object.
    ///
    /// The identifier lands under this record's `identifier_column` label.
    /// Non-finite thresholds and missing values serialize as `null`.
    pub fn to_row(&self) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("DATE".to_string(), Value::String(self.date.to_string()));
        row.insert(
            "METRIC_NAME".to_string(),
            Value::String(self.metric_name.clone()),
        );
        row.insert(
            self.identifier_column.clone(),
            Value::String(self.identifier.clone()),
        );
        row.insert("TABLE".to_string(), Value::String(self.table.clone()));
        row.insert(
            "COLUMN".to_string(),
            self.column
                .clone()
                .map(Value::String)
                .unwrap_or(Value::Null),
        );
        row.insert("VALUE".to_string(), optional_number(self.value));
        row.insert(
            "LOWER_THRESHOLD".to_string(),
            optional_number(Some(self.lower_threshold)),
        );
        row.insert(
            "UPPER_THRESHOLD".to_string(),
            optional_number(Some(self.upper_threshold)),
        );
        row.insert(
            "RESULT".to_string(),
            Value::String(self.status.as_str().to_string()),
        );
        row
    }
}

fn optional_number(value: Option<f64>) -> Value {
    // Value::from maps non-finite floats to null
    value.map(Value::from).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::*;
    use crate::checks::{BuildContext, CheckDefinition};
    use crate::config::CheckType;

    fn null_ratio_check() -> CheckDefinition {
        let ctx = build_ctx();
        let mut settings = with_date_filter(
            base_settings("orders", "category"),
            "order_date",
            "2023-01-15",
        );
        settings.lower_threshold = Some(0.0);
        settings.upper_threshold = Some(0.1);
        CheckDefinition::build(CheckType::NullRatio, &settings, &ctx).unwrap()
    }

    fn reading(value: Option<f64>) -> MetricReading {
        MetricReading {
            value,
            lower: 0.0,
            upper: 0.1,
        }
    }

    #[test]
    fn test_classification_is_inclusive() {
        let def = null_ratio_check();
        assert_eq!(classify(&def, &reading(Some(0.0))), CheckStatus::Success);
        assert_eq!(classify(&def, &reading(Some(0.1))), CheckStatus::Success);
        assert_eq!(classify(&def, &reading(Some(0.1001))), CheckStatus::Fail);
        assert_eq!(classify(&def, &reading(Some(-0.01))), CheckStatus::Fail);
        assert_eq!(classify(&def, &reading(None)), CheckStatus::Fail);
    }

    #[test]
    fn test_monitor_only_never_fails() {
        let ctx = build_ctx();
        let mut settings = base_settings("orders", "category");
        settings.upper_threshold = Some(0.1);
        settings.monitor_only = Some(true);
        let def = CheckDefinition::build(CheckType::NullRatio, &settings, &ctx).unwrap();
        assert_eq!(classify(&def, &reading(Some(0.9))), CheckStatus::MonitorOnly);
    }

    #[test]
    fn test_format_value_widens_precision() {
        assert_eq!(format_value(0.25), "0.2500");
        assert_eq!(format_value(0.0), "0.0000");
        assert_eq!(format_value(0.00001), "0.00001");
        assert_eq!(format_value(-0.000004), "-0.000004");
        assert_eq!(format_value(f64::INFINITY), "inf");
    }

    #[test]
    fn test_fail_message_format() {
        let def = null_ratio_check();
        let msg = fail_message(&def, &reading(Some(0.25)));
        assert_eq!(
            msg,
            "ALL: Metric category_null_ratio failed on 2023-01-15 for orders. \
             Value 0.2500 is not between 0.0000 and 0.1000."
        );
    }

    #[test]
    fn test_fail_message_carries_extra_and_date_info() {
        let ctx = build_ctx();
        let mut settings = with_date_filter(
            base_settings("orders", "category"),
            "order_date",
            "2023-01-15",
        );
        settings.upper_threshold = Some(0.1);
        settings.extra_info = Some("Check the upstream feed.".to_string());
        settings.date_info = Some("order date".to_string());
        let def = CheckDefinition::build(CheckType::NullRatio, &settings, &ctx).unwrap();
        let msg = fail_message(&def, &reading(Some(0.25)));
        assert!(msg.contains("on 2023-01-15 (order date) for orders"));
        assert!(msg.ends_with(" Check the upstream feed."));
    }

    #[test]
    fn test_missing_data_message_groups_on_prefix() {
        let def = null_ratio_check();
        let msg = missing_data_message(&def, "orders");
        assert_eq!(msg, "No data in orders on 2023-01-15 for: ALL");
    }

    #[test]
    fn test_to_row_uses_the_identifier_label() {
        let ctx = BuildContext {
            identifier_format: crate::config::IdentifierFormat::FilterName,
            ..build_ctx()
        };
        let settings = with_identifier_filter(
            base_settings("orders", "category"),
            "shop_id",
            "shop_code",
            "SHOP01",
        );
        let def = CheckDefinition::build(CheckType::NullRatio, &settings, &ctx).unwrap();
        let record = ResultRecord::from_reading(&def, &reading(Some(0.05)), CheckStatus::Success);
        let row = record.to_row();
        assert_eq!(row["SHOP_ID"], serde_json::json!("SHOP01"));
        assert_eq!(row["RESULT"], serde_json::json!("SUCCESS"));
        assert_eq!(row["VALUE"], serde_json::json!(0.05));
    }

    #[test]
    fn test_data_missing_record_shape() {
        let def = null_ratio_check();
        let record = ResultRecord::data_missing(&def, "skufeed");
        assert_eq!(record.metric_name, "data_exists");
        // the probe-reported empty table, not the check's own
        assert_eq!(record.table, "skufeed");
        assert_eq!(record.status, CheckStatus::Fail);

        let row = record.to_row();
        assert_eq!(row["COLUMN"], Value::Null);
        assert_eq!(row["VALUE"], Value::Null);
        assert_eq!(row["LOWER_THRESHOLD"], Value::Null);
        assert_eq!(row["UPPER_THRESHOLD"], Value::Null);
        assert_eq!(row["RESULT"], serde_json::json!("FAIL"));
    }

    #[test]
    fn test_to_row_serializes_infinite_thresholds_as_null() {
        let def = null_ratio_check();
        let unbounded = MetricReading {
            value: Some(1.0),
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        };
        let record = ResultRecord::from_reading(&def, &unbounded, CheckStatus::Success);
        let row = record.to_row();
        assert_eq!(row["LOWER_THRESHOLD"], Value::Null);
        assert_eq!(row["UPPER_THRESHOLD"], Value::Null);
    }
}
