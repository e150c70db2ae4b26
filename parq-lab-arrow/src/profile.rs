//! Column profiling of an in-memory table: shape, types, nulls, cardinality, numeric ranges and
//! memory usage.

use std::{
  collections::{BTreeMap, HashSet},
  fmt,
};

use anyhow::Result;
use arrow::{
  array::{Array, ArrayRef, AsArray},
  compute::{cast, max, min},
  datatypes::{DataType, Float64Type},
  row::{RowConverter, SortField},
};
use parq_lab_core::format::{intword, thousands};

use crate::{display::TableRows, table::Table};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnProfile {
  pub name: String,
  pub data_type: DataType,
  pub null_count: usize,
  pub null_fraction: f64,
  pub unique_count: usize,
  pub unique_fraction: f64,
  /// Range of numeric and boolean columns; `None` for strings and other types.
  pub min: Option<f64>,
  pub max: Option<f64>,
  pub memory_size: usize,
}

impl ColumnProfile {
  pub fn is_integer(&self) -> bool {
    self.data_type.is_integer()
  }

  pub fn is_float(&self) -> bool {
    self.data_type.is_floating()
  }
}

fn optional(value: Option<f64>) -> String {
  value.map(|v| v.to_string()).unwrap_or_default()
}

impl TableRows for ColumnProfile {
  fn headers() -> Vec<&'static str> {
    vec![
      "column",
      "dtype",
      "null_count",
      "null_fraction",
      "unique_count",
      "unique_fraction",
      "min",
      "max",
      "memory",
    ]
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.name.clone(),
      self.data_type.to_string(),
      self.null_count.to_string(),
      format!("{:.4}", self.null_fraction),
      self.unique_count.to_string(),
      format!("{:.4}", self.unique_fraction),
      optional(self.min),
      optional(self.max),
      thousands(self.memory_size as u64),
    ]
  }
}

fn fraction(count: usize, rows: usize) -> f64 {
  if rows == 0 {
    0.0
  } else {
    count as f64 / rows as f64
  }
}

/// Distinct non-null values.
pub(crate) fn unique_count(column: &ArrayRef) -> Result<usize> {
  let converter = RowConverter::new(vec![SortField::new(column.data_type().clone())])?;
  let rows = converter.convert_columns(&[column.clone()])?;
  let mut seen = HashSet::new();
  for (idx, row) in rows.iter().enumerate() {
    if column.is_valid(idx) {
      seen.insert(row.owned());
    }
  }
  Ok(seen.len())
}

fn numeric_range(column: &ArrayRef) -> Result<(Option<f64>, Option<f64>)> {
  let data_type = column.data_type();
  if !data_type.is_numeric() && *data_type != DataType::Boolean {
    return Ok((None, None));
  }
  let values = cast(column, &DataType::Float64)?;
  let values = values.as_primitive::<Float64Type>();
  Ok((min(values), max(values)))
}

impl ColumnProfile {
  fn of(name: &str, column: &ArrayRef) -> Result<Self> {
    let rows = column.len();
    let null_count = column.null_count();
    let unique_count = unique_count(column)?;
    let (min, max) = numeric_range(column)?;
    Ok(ColumnProfile {
      name: name.to_string(),
      data_type: column.data_type().clone(),
      null_count,
      null_fraction: fraction(null_count, rows),
      unique_count,
      unique_fraction: fraction(unique_count, rows),
      min,
      max,
      memory_size: column.get_array_memory_size(),
    })
  }
}

#[derive(Debug, Clone)]
pub struct Profile {
  pub num_rows: usize,
  pub columns: Vec<ColumnProfile>,
}

impl Profile {
  pub fn of(table: &Table) -> Result<Self> {
    let batch = table.concat()?;
    let columns = table
      .schema
      .fields()
      .iter()
      .zip(batch.columns())
      .map(|(field, column)| ColumnProfile::of(field.name(), column))
      .collect::<Result<Vec<_>>>()?;
    tracing::debug!(rows = batch.num_rows(), columns = columns.len(), "profiled table");
    Ok(Profile {
      num_rows: batch.num_rows(),
      columns,
    })
  }

  /// `123.5 million rows, 12 cols`
  pub fn shape(&self) -> String {
    format!("{} rows, {} cols", intword(self.num_rows as u64), self.columns.len())
  }

  pub fn dtype_counts(&self) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for column in &self.columns {
      *counts.entry(column.data_type.to_string()).or_default() += 1;
    }
    counts
  }

  /// Null count -> number of columns with exactly that many nulls.
  pub fn null_column_counts(&self) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for column in &self.columns {
      *counts.entry(column.null_count).or_default() += 1;
    }
    counts
  }

  pub fn integer_columns(&self) -> Vec<&str> {
    self
      .columns
      .iter()
      .filter(|column| column.is_integer())
      .map(|column| column.name.as_str())
      .collect()
  }

  pub fn float_columns(&self) -> Vec<&str> {
    self
      .columns
      .iter()
      .filter(|column| column.is_float())
      .map(|column| column.name.as_str())
      .collect()
  }

  pub fn memory_size(&self) -> usize {
    self.columns.iter().map(|column| column.memory_size).sum()
  }
}

impl fmt::Display for Profile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{}", self.shape())?;
    writeln!(f, "\ndtypes:")?;
    for (dtype, count) in self.dtype_counts() {
      writeln!(f, "  {dtype}: {count}")?;
    }
    writeln!(f, "\ncolumns by null count:")?;
    for (nulls, count) in self.null_column_counts() {
      writeln!(f, "  {nulls}: {count}")?;
    }
    writeln!(f, "\nintegers: {}", self.integer_columns().join(", "))?;
    writeln!(f, "floats: {}", self.float_columns().join(", "))?;
    write!(f, "memory usage: {} bytes", thousands(self.memory_size() as u64))
  }
}
