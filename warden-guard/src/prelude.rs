//! Convenient re-exports for embedding a run.
//!
//! ```rust
//! use warden_guard::prelude::*;
//! ```

pub use crate::checks::{BuildContext, CheckDefinition, CheckKind, MetricReading};
pub use crate::config::{
    CheckBundle, CheckConfig, CheckSettings, CheckType, GlobalDefaults, IdentifierFormat,
    RunConfig,
};
pub use crate::engine::{DataFusionEngine, QueryEngine};
pub use crate::error::{Result, WardenError};
pub use crate::evaluator::{CheckStatus, ResultRecord};
pub use crate::executor::{CheckExecutor, RunOutcome};
pub use crate::filters::{FilterConfig, FilterKind, FilterOperator};
pub use crate::logging::LogConfig;
