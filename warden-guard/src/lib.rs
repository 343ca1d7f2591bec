//! Warden Guard is a data-quality monitoring engine. Checks are declared as
//! configuration, compiled into SQL, executed through [DataFusion] (or any
//! other [`engine::QueryEngine`]), and judged against thresholds. A run
//! produces one result record per check plus human-readable messages for
//! everything that failed, errored, or had no data to check.
//!
//! [DataFusion]: https://datafusion.apache.org
//!
//! # Quick start
//!
//! ```rust,no_run
//! use warden_guard::prelude::*;
//! use datafusion::prelude::SessionContext;
//!
//! #[tokio::main]
//! async fn main() -> warden_guard::Result<()> {
//!     let config: RunConfig = serde_json::from_str(
//!         r#"{
//!             "name": "daily",
//!             "bundles": [{
//!                 "name": "orders",
//!                 "defaults": {
//!                     "table": "orders",
//!                     "filters": {
//!                         "date": {"column": "order_date", "value": "yesterday", "kind": "date"}
//!                     }
//!                 },
//!                 "checks": [
//!                     {"check_type": "null_ratio", "column": "category", "upper_threshold": 0.1},
//!                     {"check_type": "count", "column": "*", "lower_threshold": 1.0}
//!                 ]
//!             }]
//!         }"#,
//!     )?;
//!
//!     let ctx = SessionContext::new();
//!     // register the `orders` table here
//!     let executor = CheckExecutor::new(config, DataFusionEngine::new(ctx));
//!     let outcome = executor.run().await?;
//!
//!     for message in &outcome.messages {
//!         eprintln!("{message}");
//!     }
//!     for record in &outcome.results {
//!         println!("{}", serde_json::Value::Object(record.to_row()));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`config`] declares runs: bundles of checks under three layers of
//!   field-wise defaults.
//! - [`filters`] resolves declared filters (relative dates included) and
//!   renders them into WHERE clauses.
//! - [`checks`] freezes the merged settings into immutable check
//!   definitions and generates the per-kind SQL.
//! - [`engine`] abstracts query execution behind a trait, with a
//!   DataFusion implementation.
//! - [`executor`] orchestrates a run: bulk-fetch planning for remote
//!   accessors, existence probing with a per-slice cache, evaluation, and
//!   output aggregation.
//! - [`evaluator`] judges metric readings and renders records and messages.

pub mod checks;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod filters;
pub mod logging;
pub mod prelude;

pub use error::{Result, WardenError};
