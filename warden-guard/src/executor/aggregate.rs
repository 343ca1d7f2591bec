//! Deduplication of run output.
//!
//! A run over many identifiers produces piles of near-identical "no data"
//! noise when a whole table is empty. Absence records collapse into one
//! record per (date, metric, table) with the identifiers merged, and their
//! messages collapse per message prefix.

use std::collections::{BTreeMap, BTreeSet};

use crate::evaluator::{DATA_EXISTS_METRIC, ResultRecord};

/// Joins values into a sorted, deduplicated, comma-separated list.
pub fn aggregate_values<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
    set.into_iter().collect::<Vec<_>>().join(", ")
}

/// Collapses "No data ... for: X" messages sharing the text before the final
/// colon into one message listing all affected identifiers, then sorts the
/// whole log.
pub fn aggregate_messages(messages: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for message in messages {
        if message.starts_with("No data") {
            if let Some((prefix, id)) = message.rsplit_once(": ") {
                groups
                    .entry(prefix.to_string())
                    .or_default()
                    .insert(id.to_string());
                continue;
            }
        }
        out.push(message.clone());
    }
    for (prefix, ids) in groups {
        out.push(format!("{prefix}: {}", aggregate_values(ids)));
    }
    out.sort();
    out
}

/// Collapses `data_exists` records per (date, metric, table), merging their
/// identifiers. Since the absence metric name is fixed, checks of different
/// kinds blocked by the same empty table fold into one row. Executed records
/// pass through untouched.
pub fn aggregate_records(records: Vec<ResultRecord>) -> Vec<ResultRecord> {
    let mut out = Vec::new();
    let mut skipped: BTreeMap<(String, String, String), ResultRecord> = BTreeMap::new();
    for record in records {
        if record.metric_name != DATA_EXISTS_METRIC {
            out.push(record);
            continue;
        }
        let key = (
            record.date.to_string(),
            record.metric_name.clone(),
            record.table.clone(),
        );
        skipped
            .entry(key)
            .and_modify(|existing| {
                existing.identifier =
                    aggregate_values([existing.identifier.clone(), record.identifier.clone()]);
            })
            .or_insert(record);
    }
    out.extend(skipped.into_values());
    out
}

/// Run-level summary line, or `None` when nothing failed.
pub fn failed_checks_message(run_name: &str, failed: &[String]) -> Option<String> {
    if failed.is_empty() {
        return None;
    }
    Some(format!(
        "Run '{run_name}' finished with {count} failed check(s): {names}",
        count = failed.len(),
        names = aggregate_values(failed.iter().cloned()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::CheckStatus;
    use chrono::NaiveDate;

    fn absence_record(table: &str, identifier: &str) -> ResultRecord {
        ResultRecord {
            date: NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
            metric_name: DATA_EXISTS_METRIC.to_string(),
            identifier: identifier.to_string(),
            identifier_column: "IDENTIFIER".to_string(),
            table: table.to_string(),
            column: None,
            value: None,
            lower_threshold: f64::NEG_INFINITY,
            upper_threshold: f64::INFINITY,
            status: CheckStatus::Fail,
        }
    }

    #[test]
    fn test_aggregate_values_sorts_and_dedupes() {
        assert_eq!(
            aggregate_values(["SHOP02", "SHOP01", "SHOP02"]),
            "SHOP01, SHOP02"
        );
        assert_eq!(aggregate_values(Vec::<String>::new()), "");
    }

    #[test]
    fn test_no_data_messages_group_on_prefix() {
        let messages = vec![
            "No data in orders on 2023-01-15 for: SHOP02".to_string(),
            "ALL: Metric row_count failed on 2023-01-15 for orders. \
             Value 0.0000 is not between 1.0000 and inf."
                .to_string(),
            "No data in orders on 2023-01-15 for: SHOP01".to_string(),
            "No data in skufeed on 2023-01-15 for: SHOP01".to_string(),
        ];
        let aggregated = aggregate_messages(&messages);
        assert_eq!(aggregated.len(), 3);
        assert!(aggregated[0].contains("row_count failed"));
        assert!(aggregated
            .contains(&"No data in orders on 2023-01-15 for: SHOP01, SHOP02".to_string()));
        assert!(aggregated.contains(&"No data in skufeed on 2023-01-15 for: SHOP01".to_string()));
        assert!(aggregated.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_absence_records_merge_identifiers_per_table() {
        let records = vec![
            absence_record("orders", "SHOP02"),
            absence_record("orders", "SHOP01"),
            absence_record("skufeed", "SHOP01"),
        ];
        let aggregated = aggregate_records(records);
        assert_eq!(aggregated.len(), 2);
        let merged = aggregated.iter().find(|r| r.table == "orders").unwrap();
        assert_eq!(merged.identifier, "SHOP01, SHOP02");
        assert_eq!(merged.status, CheckStatus::Fail);
    }

    #[test]
    fn test_absence_records_merge_across_check_kinds() {
        // two different checks blocked by the same empty table fold into
        // one row because the absence metric name is shared
        let records = vec![
            absence_record("orders", "ALL"),
            absence_record("orders", "ALL"),
        ];
        let aggregated = aggregate_records(records);
        assert_eq!(aggregated.len(), 1);
        assert_eq!(aggregated[0].metric_name, DATA_EXISTS_METRIC);
        assert_eq!(aggregated[0].identifier, "ALL");
    }

    #[test]
    fn test_executed_records_pass_through() {
        let mut executed = absence_record("orders", "SHOP01");
        executed.metric_name = "row_count".to_string();
        executed.status = CheckStatus::Success;
        executed.value = Some(10.0);
        let aggregated = aggregate_records(vec![executed.clone()]);
        assert_eq!(aggregated, vec![executed]);
    }

    #[test]
    fn test_failed_checks_message() {
        assert_eq!(failed_checks_message("daily", &[]), None);
        let failed = vec!["row_count".to_string(), "category_null_ratio".to_string()];
        assert_eq!(
            failed_checks_message("daily", &failed).unwrap(),
            "Run 'daily' finished with 2 failed check(s): category_null_ratio, row_count"
        );
    }
}
