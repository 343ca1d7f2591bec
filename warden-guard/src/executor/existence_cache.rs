//! Per-run cache of data-existence probe outcomes.
//!
//! Checks that address the same table, accessor, date, and filter set probe
//! the same data slice, so the probe runs once per slice. The filter set is
//! keyed by structural signatures, which makes the key independent of filter
//! declaration order.

use std::collections::{BTreeSet, HashMap};

use crate::checks::CheckDefinition;

/// Identity of a probed data slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetCacheKey {
    pub table: String,
    pub accessor: Option<String>,
    pub date: String,
    pub signatures: BTreeSet<String>,
}

impl DatasetCacheKey {
    pub fn for_check(def: &CheckDefinition) -> Self {
        Self {
            table: def.table.clone(),
            accessor: def.accessor.clone(),
            date: def.date_value.to_string(),
            signatures: def.filter_signatures(),
        }
    }
}

/// Probe outcomes: `None` means data is present, `Some(table)` names the
/// empty table the probe reported.
#[derive(Debug, Default)]
pub struct ExistenceCache {
    entries: HashMap<DatasetCacheKey, Option<String>>,
}

impl ExistenceCache {
    pub fn get(&self, key: &DatasetCacheKey) -> Option<&Option<String>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: DatasetCacheKey, outcome: Option<String>) {
        self.entries.insert(key, outcome);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
