//! The polars engine: a lazy Parquet scan grouped by the polars query planner.

use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use arrow::datatypes::SchemaRef as ArrowSchemaRef;
use parq_lab_arrow::aggregate::check_columns;
use parq_lab_core::query::{Aggregate, GroupQuery};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use polars::prelude::*;

use crate::engine::{Engine, QueryOutput};

const HIDDEN_COUNT: &str = "__group_rows";

fn aggregate_expr(aggregate: &Aggregate) -> Expr {
  let expr = match aggregate {
    Aggregate::Count => len().cast(DataType::Int64),
    Aggregate::CountDistinct(column) => {
      col(column.as_str()).drop_nulls().n_unique().cast(DataType::Int64)
    }
    Aggregate::Mean(column) => col(column.as_str()).mean(),
  };
  expr.alias(aggregate.alias())
}

pub struct PolarsEngine {
  file: PathBuf,
  schema: Option<ArrowSchemaRef>,
}

impl PolarsEngine {
  pub fn new(file: PathBuf) -> Self {
    PolarsEngine { file, schema: None }
  }

  /// Group the file lazily; keys sort ascending with nulls first, as in the Arrow engines.
  pub fn frame(&self, query: &GroupQuery) -> Result<DataFrame> {
    let keys: Vec<Expr> = query.keys.iter().map(|key| col(key.as_str())).collect();
    let mut aggregates: Vec<Expr> = query.aggregates.iter().map(aggregate_expr).collect();
    let has_count = query.aggregates.contains(&Aggregate::Count);
    if query.min_count.is_some() && !has_count {
      aggregates.push(len().cast(DataType::Int64).alias(HIDDEN_COUNT));
    }

    let mut frame = LazyFrame::scan_parquet(&self.file, ScanArgsParquet::default())?
      .group_by(keys.clone())
      .agg(aggregates);
    if let Some(min_count) = query.min_count {
      let count_column = if has_count {
        Aggregate::Count.alias()
      } else {
        HIDDEN_COUNT.to_string()
      };
      frame = frame.filter(col(count_column.as_str()).gt(lit(min_count as i64)));
      if !has_count {
        let visible: Vec<Expr> = query
          .keys
          .iter()
          .cloned()
          .chain(query.aggregates.iter().map(Aggregate::alias))
          .map(|name| col(name.as_str()))
          .collect();
        frame = frame.select(visible);
      }
    }
    let frame = frame
      .sort_by_exprs(keys, SortMultipleOptions::default().with_nulls_last(false))
      .collect()?;
    Ok(frame)
  }
}

impl Engine for PolarsEngine {
  fn name(&self) -> &'static str {
    "polars"
  }

  fn prepare(&mut self) -> Result<()> {
    let file = File::open(&self.file)
      .with_context(|| format!("File {} does not exist", self.file.display()))?;
    self.schema = Some(ParquetRecordBatchReaderBuilder::try_new(file)?.schema().clone());
    Ok(())
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    // Checked against the Arrow schema so that errors read the same as the other engines'
    let schema = self.schema.as_ref().context("polars engine was not prepared")?;
    check_columns(query, schema)?;
    Ok(QueryOutput::Text(self.frame(query)?.to_string()))
  }
}
