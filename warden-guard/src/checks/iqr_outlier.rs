//! Interquartile-range outlier detection over a trailing window.
//!
//! The query returns the raw window rows; the bounds are derived client-side
//! from the non-current rows: `q25 - factor * IQR` and `q75 + factor * IQR`,
//! with exact linear interpolation between sample points. `how` widens one
//! bound to infinity for one-sided checks.

use arrow::record_batch::RecordBatch;

use super::{escape_sql_string, CheckDefinition, IqrBounds, MetricReading};
use crate::engine;
use crate::error::Result;

pub(super) fn metric_sql(
    def: &CheckDefinition,
    interval_days: u32,
    date_column: &str,
) -> String {
    format!(
        "SELECT CASE WHEN {date_column} = '{date}' THEN 1 ELSE 0 END AS is_current, \
         CAST({col} AS DOUBLE) AS value \
         FROM {table} {window} \
         ORDER BY is_current DESC",
        date = def.date_value,
        col = def.column,
        table = def.table,
        window = def.windowed_where(date_column, interval_days),
    )
}

pub(super) fn existence_sql(def: &CheckDefinition, date_column: &str) -> String {
    format!(
        "SELECT CASE WHEN COUNT({col}) > 0 THEN '' ELSE '{table}' END AS empty_table \
         FROM {from} {where_clause}",
        col = def.column,
        table = escape_sql_string(&def.table),
        from = def.table,
        where_clause = def.single_day_where(date_column),
    )
}

/// Exact percentile with linear interpolation, matching the conventional
/// `(len - 1) * p` index rule. `sorted` must be ascending and non-empty.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let idx = (sorted.len() - 1) as f64 * p;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let weight = idx - lo as f64;
        sorted[lo] * (1.0 - weight) + sorted[hi] * weight
    }
}

pub(super) fn interpret(
    batches: &[RecordBatch],
    iqr_factor: f64,
    how: IqrBounds,
) -> Result<MetricReading> {
    let flags = engine::column_f64(batches, "is_current")?;
    let values = engine::column_f64(batches, "value")?;

    // check-date rows never enter the history sample, however many there are
    let mut current = None;
    let mut sample = Vec::new();
    for (flag, value) in flags.into_iter().zip(values) {
        let Some(value) = value else { continue };
        if flag == Some(1.0) {
            if current.is_none() {
                current = Some(value);
            }
        } else {
            sample.push(value);
        }
    }

    let (mut lower, mut upper) = if sample.is_empty() {
        (f64::NEG_INFINITY, f64::INFINITY)
    } else {
        sample.sort_by(|a, b| a.total_cmp(b));
        let q25 = percentile(&sample, 0.25);
        let q75 = percentile(&sample, 0.75);
        let iqr = q75 - q25;
        (q25 - iqr_factor * iqr, q75 + iqr_factor * iqr)
    };
    match how {
        IqrBounds::Both => {}
        IqrBounds::Upper => lower = f64::NEG_INFINITY,
        IqrBounds::Lower => upper = f64::INFINITY,
    }

    Ok(MetricReading {
        value: current,
        lower,
        upper,
    })
}
