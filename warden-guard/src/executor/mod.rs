//! Run orchestration.
//!
//! The executor freezes the configured checks, optionally bulk-fetches the
//! tables they read through a remote accessor into a local session, probes
//! each data slice once for existence, runs the metric queries, and folds
//! the outcomes into deduplicated records and messages.
//!
//! A failing existence probe is deliberately treated as "data present": the
//! probe exists to suppress noise, not to gate execution, so when it cannot
//! answer, the metric query gets its chance and reports its own error.

pub mod aggregate;
pub mod existence_cache;
pub mod planner;

use std::collections::BTreeSet;

use chrono::{NaiveDate, Utc};
use datafusion::prelude::SessionContext;
use tracing::{debug, info, warn};

use crate::checks::{BuildContext, CheckDefinition};
use crate::config::{CheckSettings, IdentifierFormat, RunConfig};
use crate::engine::{self, DataFusionEngine, QueryEngine};
use crate::error::{Result, WardenError};
use crate::evaluator::{self, CheckStatus, ResultRecord};
use crate::logging::{truncate_field, LogConfig};

use existence_cache::{DatasetCacheKey, ExistenceCache};

/// Aggregated output of one run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_name: String,
    pub results: Vec<ResultRecord>,
    /// Names of checks that failed or errored.
    pub failed: Vec<String>,
    pub messages: Vec<String>,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line summary of the failures, or `None` when everything passed.
    pub fn summary(&self) -> Option<String> {
        aggregate::failed_checks_message(&self.run_name, &self.failed)
    }
}

/// Executes the checks of one [`RunConfig`] against a query engine.
pub struct CheckExecutor<E> {
    config: RunConfig,
    engine: E,
    log_config: LogConfig,
}

impl<E: QueryEngine> CheckExecutor<E> {
    pub fn new(config: RunConfig, engine: E) -> Self {
        Self {
            config,
            engine,
            log_config: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Merges the settings layers and freezes every declared check.
    ///
    /// Fails fast: any invalid check aborts the run before a query executes.
    pub fn build_checks(&self, today: NaiveDate) -> Result<Vec<CheckDefinition>> {
        let ctx = BuildContext::new(&self.config, today);
        let mut checks = Vec::new();
        for bundle in &self.config.bundles {
            for check in &bundle.checks {
                let settings = CheckSettings::layered(
                    &self.config.defaults.settings,
                    &bundle.defaults,
                    &check.settings,
                );
                let def = CheckDefinition::build(check.check_type, &settings, &ctx)
                    .map_err(|e| {
                        WardenError::Configuration(format!("bundle '{}': {e}", bundle.name))
                    })?;
                checks.push(def);
            }
        }
        validate_identifier_labels(self.config.defaults.identifier_format, &checks)?;
        Ok(checks)
    }

    /// Runs all checks with today as the reference date.
    pub async fn run(&self) -> Result<RunOutcome> {
        self.run_for(Utc::now().date_naive()).await
    }

    /// Runs all checks with an explicit reference date for relative-date
    /// resolution.
    pub async fn run_for(&self, today: NaiveDate) -> Result<RunOutcome> {
        let checks = self.build_checks(today)?;
        info!(
            run = %self.config.name,
            checks = checks.len(),
            accessor = self.config.accessor.as_deref().unwrap_or("<direct>"),
            "starting run"
        );

        let local;
        let engine: &dyn QueryEngine = match &self.config.accessor {
            Some(accessor) => {
                let session = SessionContext::new();
                let plans = planner::plan(&checks);
                planner::fetch_into_memory(&self.engine, accessor, &plans, &session).await?;
                local = DataFusionEngine::new(session);
                &local
            }
            None => &self.engine,
        };

        let mut cache = ExistenceCache::default();
        let mut results = Vec::new();
        let mut failed = Vec::new();
        let mut messages = Vec::new();

        for def in &checks {
            if let Some(empty_table) = self.probe(engine, def, &mut cache).await {
                debug!(check = %def.name, table = %empty_table, "skipping check, no data");
                messages.push(evaluator::missing_data_message(def, &empty_table));
                failed.push(def.name.clone());
                results.push(ResultRecord::data_missing(def, &empty_table));
                continue;
            }

            let sql = def.metric_query();
            if self.log_config.log_query_sql {
                debug!(
                    check = %def.name,
                    sql = %truncate_field(&sql, self.log_config.max_field_length),
                    "running metric query"
                );
            }
            let reading = match engine.execute(&sql).await {
                Ok(batches) => def.interpret(&batches),
                Err(err) => Err(WardenError::execution(&def.name, err.to_string())),
            };
            match reading {
                Err(err) => {
                    warn!(check = %def.name, error = %err, "metric query failed");
                    messages.push(evaluator::error_message(def, &err.to_string()));
                    failed.push(def.name.clone());
                    results.push(ResultRecord::errored(def));
                }
                Ok(reading) => {
                    let status = evaluator::classify(def, &reading);
                    if self.log_config.log_check_details {
                        debug!(
                            check = %def.name,
                            value = ?reading.value,
                            status = status.as_str(),
                            "check evaluated"
                        );
                    }
                    if status == CheckStatus::Fail {
                        messages.push(evaluator::fail_message(def, &reading));
                        failed.push(def.name.clone());
                    }
                    results.push(ResultRecord::from_reading(def, &reading, status));
                }
            }
        }

        let results = aggregate::aggregate_records(results);
        let messages = aggregate::aggregate_messages(&messages);
        info!(
            run = %self.config.name,
            results = results.len(),
            failed = failed.len(),
            probes = cache.len(),
            "run finished"
        );
        Ok(RunOutcome {
            run_name: self.config.name.clone(),
            results,
            failed,
            messages,
        })
    }

    /// Returns the name of the empty table blocking this check, probing at
    /// most once per data slice.
    async fn probe(
        &self,
        engine: &dyn QueryEngine,
        def: &CheckDefinition,
        cache: &mut ExistenceCache,
    ) -> Option<String> {
        let key = DatasetCacheKey::for_check(def);
        if let Some(outcome) = cache.get(&key) {
            return outcome.clone();
        }

        let sql = def.existence_query();
        if self.log_config.log_query_sql {
            debug!(
                check = %def.name,
                sql = %truncate_field(&sql, self.log_config.max_field_length),
                "running existence probe"
            );
        }
        let outcome = match engine.execute(&sql).await {
            Err(err) => {
                debug!(
                    check = %def.name,
                    error = %err,
                    "existence probe failed, assuming data present"
                );
                None
            }
            Ok(batches) => match engine::scalar_str(&batches, "empty_table") {
                Ok(Some(table)) if !table.is_empty() => Some(table),
                _ => None,
            },
        };
        cache.insert(key, outcome.clone());
        outcome
    }
}

fn validate_identifier_labels(
    format: IdentifierFormat,
    checks: &[CheckDefinition],
) -> Result<()> {
    if format == IdentifierFormat::Identifier {
        return Ok(());
    }
    let labels: BTreeSet<&str> = checks
        .iter()
        .map(|def| def.identifier_column.as_str())
        .collect();
    if labels.len() > 1 {
        return Err(WardenError::Configuration(format!(
            "identifier labels must agree across all checks, got: {}",
            labels.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(())
}
