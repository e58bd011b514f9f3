//! The Query Engine: a DataFusion-backed SQL evaluator over the Range
//! Reader's three materialized tables, extended with the scalar and
//! window functions time-series queries need (`ts_bucket`, `clamp`,
//! `bucket_rate`, `rolling_mean`, and the rest).
//!
//! Every call to [`QueryEngine::run_sql`] builds a fresh `SessionContext`
//! against a fresh materialization: nothing is cached between queries, so
//! a write that lands between two calls is visible on the next one.

mod coerce;
mod runtime;
mod scalar;
mod window;

use datafusion::arrow::array::Array;
use datafusion::arrow::datatypes::DataType;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use datafusion::scalar::ScalarValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;
use tsdb_core::{Error, MetricId, Result};
use tsdb_reader::RangeReader;

/// A single decoded cell from a query result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

/// One result row, columns in select-list order.
pub type Row = Vec<(String, Cell)>;

/// Wraps a [`RangeReader`] with the SQL surface queries run against.
#[derive(Clone)]
pub struct QueryEngine {
    reader: RangeReader,
}

impl QueryEngine {
    /// Build an engine over the given range reader.
    pub fn new(reader: RangeReader) -> Self {
        Self { reader }
    }

    /// Materialize `metric_ids` over `[start_ts, end_ts]`, register the
    /// `samples`/`metrics`/`metric_tags` tables plus every UDF/UDWF into a
    /// fresh session, and run `sql` against it.
    #[instrument(skip(self, sql), fields(metric_count = metric_ids.len()))]
    pub fn run_sql(
        &self,
        metric_ids: &[MetricId],
        start_ts: i64,
        end_ts: i64,
        sql: &str,
    ) -> Result<Vec<Row>> {
        if start_ts > end_ts {
            return Err(Error::validation(format!(
                "start_ts {start_ts} must not be greater than end_ts {end_ts}"
            )));
        }

        let batches = self.reader.materialize(metric_ids, start_ts, end_ts)?;

        let ctx = SessionContext::new();
        register_table(&ctx, "samples", batches.samples.schema(), batches.samples)?;
        register_table(&ctx, "metrics", batches.metrics.schema(), batches.metrics)?;
        register_table(&ctx, "metric_tags", batches.metric_tags.schema(), batches.metric_tags)?;

        for udf in scalar::all() {
            ctx.register_udf(udf);
        }
        for udwf in window::all() {
            ctx.register_udwf(udwf);
        }

        let sql = sql.to_string();
        runtime::block_on(async move {
            let df = ctx.sql(&sql).await?;
            let result_batches = df.collect().await?;
            let mut rows = Vec::new();
            for batch in &result_batches {
                let schema = batch.schema();
                for row_idx in 0..batch.num_rows() {
                    let mut row = Row::new();
                    for (col_idx, field) in schema.fields().iter().enumerate() {
                        let array = batch.column(col_idx);
                        let cell = cell_at(array.as_ref(), row_idx)?;
                        row.push((field.name().clone(), cell));
                    }
                    rows.push(row);
                }
            }
            Ok(rows)
        })
    }
}

fn register_table(
    ctx: &SessionContext,
    name: &str,
    schema: datafusion::arrow::datatypes::SchemaRef,
    batch: datafusion::arrow::record_batch::RecordBatch,
) -> Result<()> {
    let table = MemTable::try_new(schema, vec![vec![batch]]).map_err(Error::from)?;
    ctx.register_table(name, Arc::new(table)).map_err(Error::from)?;
    Ok(())
}

fn cell_at(array: &dyn Array, row: usize) -> Result<Cell> {
    if array.is_null(row) {
        return Ok(Cell::Null);
    }
    let scalar = ScalarValue::try_from_array(array, row).map_err(Error::from)?;
    Ok(match scalar {
        ScalarValue::Int64(Some(v)) => Cell::Int64(v),
        ScalarValue::Int32(Some(v)) => Cell::Int64(v as i64),
        ScalarValue::Int8(Some(v)) => Cell::Int64(v as i64),
        ScalarValue::Float64(Some(v)) => Cell::Float64(v),
        ScalarValue::Float32(Some(v)) => Cell::Float64(v as f64),
        ScalarValue::Utf8(Some(v)) => Cell::Utf8(v),
        _ if matches!(array.data_type(), DataType::Null) => Cell::Null,
        other => Cell::Utf8(format!("{other}")),
    })
}

/// Flattens [`Row`]s into an ordered map, for callers that want
/// `column -> Cell` lookup instead of positional access.
pub fn row_to_map(row: Row) -> BTreeMap<String, Cell> {
    row.into_iter().collect()
}
