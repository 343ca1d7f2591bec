//! The query-execution capability and its DataFusion implementation.
//!
//! `execute(sql) -> rows` is the only capability the engine requires of its
//! environment. Driver errors surface as `Err`, distinct from empty result
//! sets, so the executor can tell "the query failed" from "no rows matched".

use std::sync::Arc;

use arrow::array::{Array, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;

use crate::error::{Result, WardenError};

/// An engine that executes textual SQL queries and returns Arrow batches.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Executes a query, returning all result batches.
    async fn execute(&self, sql: &str) -> Result<Vec<RecordBatch>>;

    /// Schema-preserving variant used by the bulk-fetch path, which must
    /// materialize a relation even when the query returns zero rows.
    ///
    /// The default implementation derives the schema from the first batch
    /// and fails on empty results; engines that know their result schema
    /// up front should override it.
    async fn fetch(&self, sql: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let batches = self.execute(sql).await?;
        let schema = batches.first().map(|batch| batch.schema()).ok_or_else(|| {
            WardenError::Internal(
                "cannot derive a schema from an empty result set".to_string(),
            )
        })?;
        Ok((schema, batches))
    }
}

/// The standard engine: a thin wrapper around a DataFusion `SessionContext`.
#[derive(Clone)]
pub struct DataFusionEngine {
    ctx: SessionContext,
}

impl DataFusionEngine {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    /// The wrapped session context.
    pub fn ctx(&self) -> &SessionContext {
        &self.ctx
    }
}

#[async_trait]
impl QueryEngine for DataFusionEngine {
    async fn execute(&self, sql: &str) -> Result<Vec<RecordBatch>> {
        let df = self.ctx.sql(sql).await?;
        Ok(df.collect().await?)
    }

    async fn fetch(&self, sql: &str) -> Result<(SchemaRef, Vec<RecordBatch>)> {
        let df = self.ctx.sql(sql).await?;
        let schema: Schema = df.schema().into();
        let batches = df.collect().await?;
        Ok((Arc::new(schema), batches))
    }
}

fn column_index(batch: &RecordBatch, column: &str) -> Result<usize> {
    batch.schema().index_of(column).map_err(|_| {
        WardenError::Internal(format!("column '{column}' missing from query result"))
    })
}

/// Extracts the first row of the named column as `f64`.
///
/// Returns `None` when the result set has no rows or the value is SQL NULL.
pub fn scalar_f64(batches: &[RecordBatch], column: &str) -> Result<Option<f64>> {
    for batch in batches {
        if batch.num_rows() == 0 {
            continue;
        }
        let idx = column_index(batch, column)?;
        let values = cast(batch.column(idx), &DataType::Float64)?;
        let values = values
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                WardenError::Internal(format!("column '{column}' is not castable to f64"))
            })?;
        return Ok(if values.is_null(0) {
            None
        } else {
            Some(values.value(0))
        });
    }
    Ok(None)
}

/// Extracts the first row of the named column as a string.
pub fn scalar_str(batches: &[RecordBatch], column: &str) -> Result<Option<String>> {
    for batch in batches {
        if batch.num_rows() == 0 {
            continue;
        }
        let idx = column_index(batch, column)?;
        let values = cast(batch.column(idx), &DataType::Utf8)?;
        let values = values
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| {
                WardenError::Internal(format!("column '{column}' is not castable to string"))
            })?;
        return Ok(if values.is_null(0) {
            None
        } else {
            Some(values.value(0).to_string())
        });
    }
    Ok(None)
}

/// Extracts the named column across all batches as `f64` values.
pub fn column_f64(batches: &[RecordBatch], column: &str) -> Result<Vec<Option<f64>>> {
    let mut out = Vec::new();
    for batch in batches {
        if batch.num_rows() == 0 {
            continue;
        }
        let idx = column_index(batch, column)?;
        let values = cast(batch.column(idx), &DataType::Float64)?;
        let values = values
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                WardenError::Internal(format!("column '{column}' is not castable to f64"))
            })?;
        for i in 0..values.len() {
            out.push(if values.is_null(i) {
                None
            } else {
                Some(values.value(i))
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::Field;
    use datafusion::datasource::MemTable;

    fn test_batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("label", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![Some(7), Some(8)])),
                Arc::new(StringArray::from(vec![Some("a"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_scalar_extraction() {
        let batches = vec![test_batch()];
        assert_eq!(scalar_f64(&batches, "id").unwrap(), Some(7.0));
        assert_eq!(scalar_str(&batches, "label").unwrap(), Some("a".to_string()));
        assert!(scalar_f64(&batches, "missing").is_err());
    }

    #[test]
    fn test_scalar_on_empty_batches() {
        assert_eq!(scalar_f64(&[], "id").unwrap(), None);
        assert_eq!(scalar_str(&[], "label").unwrap(), None);
    }

    #[test]
    fn test_null_first_rows_extract_as_none() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("label", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![None, Some(8)])),
                Arc::new(StringArray::from(vec![None, Some("b")])),
            ],
        )
        .unwrap();
        let batches = vec![batch];
        assert_eq!(scalar_f64(&batches, "id").unwrap(), None);
        assert_eq!(scalar_str(&batches, "label").unwrap(), None);
        assert_eq!(
            column_f64(&batches, "id").unwrap(),
            vec![None, Some(8.0)]
        );
    }

    #[test]
    fn test_column_extraction_spans_batches() {
        let batches = vec![test_batch(), test_batch()];
        let values = column_f64(&batches, "id").unwrap();
        assert_eq!(values, vec![Some(7.0), Some(8.0), Some(7.0), Some(8.0)]);
    }

    #[tokio::test]
    async fn test_datafusion_engine_executes_sql() {
        let ctx = SessionContext::new();
        let batch = test_batch();
        let table = MemTable::try_new(batch.schema(), vec![vec![batch]]).unwrap();
        ctx.register_table("data", Arc::new(table)).unwrap();

        let engine = DataFusionEngine::new(ctx);
        let batches = engine
            .execute("SELECT COUNT(*) AS n FROM data")
            .await
            .unwrap();
        assert_eq!(scalar_f64(&batches, "n").unwrap(), Some(2.0));
    }

    #[tokio::test]
    async fn test_fetch_preserves_schema_on_empty_result() {
        let ctx = SessionContext::new();
        let batch = test_batch();
        let table = MemTable::try_new(batch.schema(), vec![vec![batch]]).unwrap();
        ctx.register_table("data", Arc::new(table)).unwrap();

        let engine = DataFusionEngine::new(ctx);
        let (schema, batches) = engine
            .fetch("SELECT id FROM data WHERE id > 100")
            .await
            .unwrap();
        assert_eq!(schema.fields().len(), 1);
        let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_driver_errors_are_distinct_from_empty_results() {
        let ctx = SessionContext::new();
        let engine = DataFusionEngine::new(ctx);
        let err = engine.execute("SELECT * FROM missing_table").await;
        assert!(err.is_err());
    }
}
