//! The group-by executor, planned and run by DataFusion.
//!
//! A [`GroupQuery`] becomes a `DataFrame` plan: aggregate, optional `having count(*) > n`, then
//! sort on the keys. Inputs are either record batches already in memory or a Parquet file scanned
//! by DataFusion itself. The result is a single batch whose key columns are nullable and whose
//! dictionary keys are decoded to their values.

use std::{path::Path, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
  array::{ArrayRef, RecordBatch},
  compute::{cast, concat_batches},
  datatypes::{DataType, Field, Schema, SchemaRef},
};
use datafusion::{
  datasource::MemTable,
  prelude::{
    avg, count, count_distinct, ident, lit, DataFrame, Expr, ParquetReadOptions, SessionContext,
  },
};
use parq_lab_core::{
  query::{Aggregate, GroupQuery},
  similarity::best_match,
};

/// Row count used for `min_count` when the query does not ask for `count(*)` itself.
const HIDDEN_COUNT: &str = "__group_rows";

fn column_index(schema: &Schema, name: &str) -> Result<usize> {
  schema.index_of(name).map_err(|_| {
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    match best_match(name, names) {
      Some(hint) => anyhow!("Invalid column {name}. Did you mean \"{hint}\"?"),
      None => anyhow!("Invalid column {name}"),
    }
  })
}

/// Every column the query names must exist, and means only apply to numeric columns.
pub fn check_columns(query: &GroupQuery, schema: &Schema) -> Result<()> {
  for key in &query.keys {
    column_index(schema, key)?;
  }
  for aggregate in &query.aggregates {
    match aggregate {
      Aggregate::Count => {}
      Aggregate::CountDistinct(column) => {
        column_index(schema, column)?;
      }
      Aggregate::Mean(column) => {
        let data_type = schema.field(column_index(schema, column)?).data_type();
        if !data_type.is_numeric() {
          bail!("Cannot average non-numeric column {column} of type {data_type}");
        }
      }
    }
  }
  Ok(())
}

/// Dictionary keys are grouped on their values, which is also what the output carries.
fn key_type(data_type: &DataType) -> DataType {
  match data_type {
    DataType::Dictionary(_, value_type) => value_type.as_ref().clone(),
    other => other.clone(),
  }
}

fn aggregate_expr(aggregate: &Aggregate) -> Expr {
  let expr = match aggregate {
    Aggregate::Count => count(lit(1)),
    Aggregate::CountDistinct(column) => count_distinct(ident(column)),
    Aggregate::Mean(column) => avg(ident(column)),
  };
  expr.alias(aggregate.alias())
}

fn output_schema(query: &GroupQuery, planned: &Schema) -> SchemaRef {
  let keys = planned.fields().iter().take(query.keys.len()).map(|field| {
    Field::new(field.name(), key_type(field.data_type()), true)
  });
  let aggregates = query.aggregates.iter().map(|aggregate| match aggregate {
    Aggregate::Count | Aggregate::CountDistinct(_) => {
      Field::new(aggregate.alias(), DataType::Int64, false)
    }
    Aggregate::Mean(_) => Field::new(aggregate.alias(), DataType::Float64, true),
  });
  Arc::new(Schema::new(keys.chain(aggregates).collect::<Vec<_>>()))
}

/// Run `query` over `frame` and return one row per group, ordered by key with nulls first.
pub async fn aggregate_frame(frame: DataFrame, query: &GroupQuery) -> Result<RecordBatch> {
  check_columns(query, &Schema::from(frame.schema()))?;

  let group_exprs: Vec<Expr> = query.keys.iter().map(ident).collect();
  let mut aggregate_exprs: Vec<Expr> = query.aggregates.iter().map(aggregate_expr).collect();
  let has_count = query.aggregates.contains(&Aggregate::Count);
  if query.min_count.is_some() && !has_count {
    aggregate_exprs.push(count(lit(1)).alias(HIDDEN_COUNT));
  }
  let mut frame = frame.aggregate(group_exprs, aggregate_exprs)?;

  if let Some(min_count) = query.min_count {
    let count_column = if has_count {
      Aggregate::Count.alias()
    } else {
      HIDDEN_COUNT.to_string()
    };
    frame = frame.filter(ident(count_column).gt(lit(min_count as i64)))?;
    if !has_count {
      let visible = query
        .keys
        .iter()
        .cloned()
        .chain(query.aggregates.iter().map(Aggregate::alias))
        .map(ident)
        .collect();
      frame = frame.select(visible)?;
    }
  }
  frame = frame.sort(query.keys.iter().map(|key| ident(key).sort(true, true)).collect())?;

  let schema = output_schema(query, &Schema::from(frame.schema()));
  let batches = frame.collect().await?;
  let Some(first) = batches.first() else {
    return Ok(RecordBatch::new_empty(schema));
  };
  let batch = concat_batches(&first.schema(), &batches)?;
  let columns = batch
    .columns()
    .iter()
    .zip(schema.fields())
    .map(|(column, field)| match column.data_type() {
      DataType::Dictionary(..) => Ok(cast(column, field.data_type())?),
      _ => Ok(column.clone()),
    })
    .collect::<Result<Vec<ArrayRef>>>()?;
  Ok(RecordBatch::try_new(schema, columns)?)
}

/// Run `query` over batches already in memory.
pub async fn aggregate_table(
  query: &GroupQuery,
  schema: SchemaRef,
  batches: Vec<RecordBatch>,
) -> Result<RecordBatch> {
  check_columns(query, &schema)?;
  let table = MemTable::try_new(schema, vec![batches])?;
  let ctx = SessionContext::new();
  let frame = ctx.read_table(Arc::new(table))?;
  aggregate_frame(frame, query).await
}

/// Run `query` with DataFusion scanning the Parquet file itself.
pub async fn aggregate_parquet(path: impl AsRef<Path>, query: &GroupQuery) -> Result<RecordBatch> {
  let path = path.as_ref();
  if !path.is_file() {
    bail!("File {} does not exist", path.display());
  }
  let location = path
    .to_str()
    .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
  let ctx = SessionContext::new();
  let frame = ctx.read_parquet(location, ParquetReadOptions::default()).await?;
  aggregate_frame(frame, query).await
}

/// Blocking form of [`aggregate_table`]. It drives its own runtime, so it must not be called
/// from inside an async context.
pub fn aggregate_batches<'a>(
  query: &GroupQuery,
  schema: SchemaRef,
  batches: impl IntoIterator<Item = &'a RecordBatch>,
) -> Result<RecordBatch> {
  let batches: Vec<RecordBatch> = batches.into_iter().cloned().collect();
  let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
  runtime.block_on(aggregate_table(query, schema, batches))
}
