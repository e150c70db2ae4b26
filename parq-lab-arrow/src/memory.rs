//! How much memory the same values take in different Arrow representations, and a pass that
//! rewrites a batch into its most compact types.

use std::{fmt, sync::Arc};

use anyhow::Result;
use arrow::{
  array::{Array, ArrayRef, AsArray, BooleanArray, Int64Array, RecordBatch, StringArray},
  compute::cast,
  datatypes::{
    ArrowPrimitiveType, DataType, Field, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, Schema, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
  },
};
use parq_lab_core::{
  fraction_part_abs_max,
  format::thousands,
  min_max,
  traits::Numeric,
  types::{smallest_integer_type, ClickhouseType},
};

use crate::{display::TableRows, profile::unique_count};

/// Utf8 columns with fewer distinct values than this become dictionaries.
pub const CATEGORY_THRESHOLD: usize = 500;

const FRUITS: [&str; 3] = ["apple", "banana", "orange"];

#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
  pub scenario: &'static str,
  pub data_type: DataType,
  pub null_count: usize,
  pub bytes: usize,
}

impl Representation {
  fn of(scenario: &'static str, array: &ArrayRef) -> Self {
    Representation {
      scenario,
      data_type: array.data_type().clone(),
      null_count: array.null_count(),
      bytes: array.get_array_memory_size(),
    }
  }
}

impl TableRows for Representation {
  fn headers() -> Vec<&'static str> {
    vec!["scenario", "dtype", "nulls", "bytes"]
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.scenario.to_string(),
      self.data_type.to_string(),
      self.null_count.to_string(),
      thousands(self.bytes as u64),
    ]
  }
}

fn dictionary_type() -> DataType {
  DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
}

/// Every tenth value missing.
fn with_nulls<T>(values: impl Iterator<Item = T>) -> impl Iterator<Item = Option<T>> {
  values
    .enumerate()
    .map(|(idx, value)| if idx % 10 == 0 { None } else { Some(value) })
}

/// Build `rows` values per scenario and measure each representation.
pub fn compare_representations(rows: usize) -> Result<Vec<Representation>> {
  let bools = (0..rows).map(|idx| idx % 3 == 0);
  let ints = (0..rows).map(|idx| (idx % 100) as i64);
  let fruits = (0..rows).map(|idx| FRUITS[idx % FRUITS.len()]);

  let bool_plain: ArrayRef = Arc::new(BooleanArray::from_iter(bools.clone().map(Some)));
  let bool_nulls: ArrayRef = Arc::new(BooleanArray::from_iter(with_nulls(bools)));

  let int64: ArrayRef = Arc::new(Int64Array::from_iter_values(ints.clone()));
  let int8 = cast(&int64, &DataType::Int8)?;

  let int64_nulls: ArrayRef = Arc::new(Int64Array::from_iter(with_nulls(ints)));
  let as_float64 = cast(&int64_nulls, &DataType::Float64)?;
  let as_float16 = cast(&int64_nulls, &DataType::Float16)?;
  let as_int8_nulls = cast(&int64_nulls, &DataType::Int8)?;

  let strings: ArrayRef = Arc::new(StringArray::from_iter_values(fruits.clone()));
  let dictionary = cast(&strings, &dictionary_type())?;
  let strings_nulls: ArrayRef = Arc::new(StringArray::from_iter(with_nulls(fruits)));
  let dictionary_nulls = cast(&strings_nulls, &dictionary_type())?;

  Ok(vec![
    Representation::of("bool", &bool_plain),
    Representation::of("bool with nulls", &bool_nulls),
    Representation::of("int64", &int64),
    Representation::of("int8", &int8),
    Representation::of("ints with nulls as float64", &as_float64),
    Representation::of("ints with nulls as float16", &as_float16),
    Representation::of("ints with nulls as nullable int64", &int64_nulls),
    Representation::of("ints with nulls as nullable int8", &as_int8_nulls),
    Representation::of("strings", &strings),
    Representation::of("strings as dictionary", &dictionary),
    Representation::of("strings with nulls", &strings_nulls),
    Representation::of("strings with nulls as dictionary", &dictionary_nulls),
  ])
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeChange {
  pub column: String,
  pub from: DataType,
  pub to: DataType,
}

#[derive(Debug, Clone)]
pub struct CompactReport {
  pub batch: RecordBatch,
  pub changes: Vec<TypeChange>,
  pub bytes_before: usize,
  pub bytes_after: usize,
}

impl fmt::Display for CompactReport {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for change in &self.changes {
      writeln!(f, "{}: {} -> {}", change.column, change.from, change.to)?;
    }
    write!(
      f,
      "memory: {} -> {} bytes",
      thousands(self.bytes_before as u64),
      thousands(self.bytes_after as u64)
    )
  }
}

fn arrow_integer(ty: ClickhouseType) -> Option<DataType> {
  let data_type = match ty {
    ClickhouseType::Int8 => DataType::Int8,
    ClickhouseType::Int16 => DataType::Int16,
    ClickhouseType::Int32 => DataType::Int32,
    ClickhouseType::Int64 => DataType::Int64,
    ClickhouseType::UInt8 => DataType::UInt8,
    ClickhouseType::UInt16 => DataType::UInt16,
    ClickhouseType::UInt32 => DataType::UInt32,
    ClickhouseType::UInt64 => DataType::UInt64,
    _ => return None,
  };
  Some(data_type)
}

fn range<T>(column: &ArrayRef) -> Option<(i128, i128)>
where
  T: ArrowPrimitiveType,
  T::Native: Numeric + Into<i128>,
{
  min_max(column.as_primitive::<T>().iter()).map(|(lo, hi)| (lo.into(), hi.into()))
}

fn integer_range(column: &ArrayRef) -> Option<(i128, i128)> {
  match column.data_type() {
    DataType::Int8 => range::<Int8Type>(column),
    DataType::Int16 => range::<Int16Type>(column),
    DataType::Int32 => range::<Int32Type>(column),
    DataType::Int64 => range::<Int64Type>(column),
    DataType::UInt8 => range::<UInt8Type>(column),
    DataType::UInt16 => range::<UInt16Type>(column),
    DataType::UInt32 => range::<UInt32Type>(column),
    DataType::UInt64 => range::<UInt64Type>(column),
    _ => None,
  }
}

/// Whole-valued float columns without nulls are treated as integers.
fn integral_float_range(column: &ArrayRef) -> Option<(i128, i128)> {
  if column.null_count() > 0 {
    return None;
  }
  let whole = match column.data_type() {
    DataType::Float32 => {
      fraction_part_abs_max(column.as_primitive::<Float32Type>().values()) == 0.0
    }
    DataType::Float64 => {
      fraction_part_abs_max(column.as_primitive::<Float64Type>().values()) == 0.0
    }
    _ => false,
  };
  if !whole {
    return None;
  }
  let values = cast(column, &DataType::Float64).ok()?;
  let (lo, hi) = min_max(values.as_primitive::<Float64Type>().iter())?;
  // Past 2^53 the float itself is no longer exact
  if lo.abs() > 9.0e15 || hi.abs() > 9.0e15 {
    return None;
  }
  Some((lo as i128, hi as i128))
}

fn compact_type(column: &ArrayRef, category_threshold: usize) -> Result<Option<DataType>> {
  let current = column.data_type();
  if *current == DataType::Utf8 {
    if unique_count(column)? < category_threshold {
      return Ok(Some(dictionary_type()));
    }
    return Ok(None);
  }
  let Some((lo, hi)) = integer_range(column).or_else(|| integral_float_range(column)) else {
    return Ok(None);
  };
  let target = smallest_integer_type(lo, hi).and_then(arrow_integer);
  Ok(target.filter(|target| {
    target.primitive_width() < current.primitive_width() || current.is_floating()
  }))
}

/// Narrow integer (and whole-valued float) columns to the smallest integer type that holds their
/// range, and dictionary-encode low-cardinality string columns.
pub fn compact_types(batch: &RecordBatch, category_threshold: usize) -> Result<CompactReport> {
  let schema = batch.schema();
  let mut fields = Vec::with_capacity(batch.num_columns());
  let mut columns = Vec::with_capacity(batch.num_columns());
  let mut changes = Vec::new();
  for (field, column) in schema.fields().iter().zip(batch.columns()) {
    match compact_type(column, category_threshold)? {
      Some(target) => {
        columns.push(cast(column, &target)?);
        fields.push(Field::new(field.name(), target.clone(), field.is_nullable()));
        changes.push(TypeChange {
          column: field.name().clone(),
          from: field.data_type().clone(),
          to: target,
        });
      }
      None => {
        columns.push(column.clone());
        fields.push(field.as_ref().clone());
      }
    }
  }
  let compacted = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
  let bytes_before = batch.get_array_memory_size();
  let bytes_after = compacted.get_array_memory_size();
  tracing::info!(changed = changes.len(), bytes_before, bytes_after, "compacted types");
  Ok(CompactReport {
    batch: compacted,
    changes,
    bytes_before,
    bytes_after,
  })
}

#[cfg(test)]
mod tests {
  use arrow::array::{Float64Array, UInt64Array};
  use rstest::rstest;

  use super::*;

  fn bytes(representations: &[Representation], scenario: &str) -> usize {
    representations
      .iter()
      .find(|r| r.scenario == scenario)
      .map(|r| r.bytes)
      .unwrap()
  }

  #[test]
  fn test_representation_sizes() {
    let representations = compare_representations(100_000).unwrap();
    assert_eq!(12, representations.len());
    assert!(bytes(&representations, "int8") < bytes(&representations, "int64"));
    assert!(
      bytes(&representations, "ints with nulls as float16")
        < bytes(&representations, "ints with nulls as float64")
    );
    assert!(bytes(&representations, "strings as dictionary") < bytes(&representations, "strings"));
    assert!(bytes(&representations, "bool") < bytes(&representations, "int8"));
    let nulls = representations
      .iter()
      .find(|r| r.scenario == "ints with nulls as nullable int8")
      .unwrap();
    assert_eq!(10_000, nulls.null_count);
    assert_eq!(DataType::Int8, nulls.data_type);
  }

  #[rstest]
  #[case(vec![Some(0), Some(100)], DataType::Int8)]
  #[case(vec![Some(0), Some(200)], DataType::UInt8)]
  #[case(vec![Some(-1), None, Some(40_000)], DataType::Int32)]
  #[case(vec![Some(1 << 40)], DataType::Int64)]
  fn test_compact_int64(#[case] values: Vec<Option<i64>>, #[case] expected: DataType) {
    let batch =
      RecordBatch::try_from_iter(vec![("v", Arc::new(Int64Array::from(values)) as ArrayRef)])
        .unwrap();
    let report = compact_types(&batch, CATEGORY_THRESHOLD).unwrap();
    assert_eq!(&expected, report.batch.schema().field(0).data_type());
    assert_eq!(expected != DataType::Int64, !report.changes.is_empty());
  }

  #[test]
  fn test_compact_mixed_batch() {
    let batch = RecordBatch::try_from_iter(vec![
      ("id", Arc::new(UInt64Array::from_iter_values(0..1000)) as ArrayRef),
      (
        "fruit",
        Arc::new(StringArray::from_iter_values((0..1000).map(|idx| FRUITS[idx % 3]))) as ArrayRef,
      ),
      (
        "whole",
        Arc::new(Float64Array::from_iter_values((0..1000).map(|idx| idx as f64))) as ArrayRef,
      ),
      (
        "ratio",
        Arc::new(Float64Array::from_iter_values((0..1000).map(|idx| idx as f64 / 3.0))) as ArrayRef,
      ),
    ])
    .unwrap();
    let report = compact_types(&batch, CATEGORY_THRESHOLD).unwrap();
    let schema = report.batch.schema();
    assert_eq!(&DataType::Int16, schema.field(0).data_type());
    assert_eq!(&dictionary_type(), schema.field(1).data_type());
    assert_eq!(&DataType::Int16, schema.field(2).data_type());
    assert_eq!(&DataType::Float64, schema.field(3).data_type());
    assert_eq!(3, report.changes.len());
    assert!(report.bytes_after < report.bytes_before);
    assert!(report.to_string().contains("fruit: Utf8 -> Dictionary(Int32, Utf8)"));
  }

  #[test]
  fn test_high_cardinality_strings_stay_plain() {
    let batch = RecordBatch::try_from_iter(vec![(
      "code",
      Arc::new(StringArray::from_iter_values((0..20).map(|idx| format!("c{idx}")))) as ArrayRef,
    )])
    .unwrap();
    let report = compact_types(&batch, 10).unwrap();
    assert!(report.changes.is_empty());
  }
}
