//! Readers for the layouts produced by [`crate::write`]: a single Parquet file, a hive-partitioned
//! directory of Parquet files, and an Arrow IPC file. Each can be restricted to named columns.

use std::{
  collections::BTreeMap,
  fs::{self, File},
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{bail, Context, Result};
use arrow::{
  array::{new_null_array, ArrayRef, Int64Array, RecordBatch, StringArray},
  datatypes::{DataType, Field, Schema, SchemaRef},
  ipc::reader::FileReader,
  record_batch::RecordBatchReader,
};
use parquet::arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ProjectionMask};

use crate::{
  table::Table,
  write::{parse_partition_dir_name, NULL_PARTITION},
};

fn open(path: &Path) -> Result<File> {
  File::open(path).with_context(|| format!("File {} does not exist", path.display()))
}

fn projection_indices(schema: &Schema, columns: &[&str]) -> Result<Vec<usize>> {
  columns
    .iter()
    .map(|name| {
      schema
        .index_of(name)
        .with_context(|| format!("Invalid column {name}"))
    })
    .collect()
}

/// Read a Parquet file, optionally only the named top-level columns.
pub fn read_parquet(path: impl AsRef<Path>, columns: Option<&[&str]>) -> Result<Table> {
  let path = path.as_ref();
  let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)?;
  let builder = match columns {
    Some(columns) => {
      let indices = projection_indices(builder.schema(), columns)?;
      let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
      builder.with_projection(mask)
    }
    None => builder,
  };
  let reader = builder.build()?;
  let schema = reader.schema();
  let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
  tracing::debug!(path = %path.display(), batches = batches.len(), "read parquet");
  Ok(Table::new(schema, batches))
}

/// Read an Arrow IPC file, optionally only the named columns.
pub fn read_ipc(path: impl AsRef<Path>, columns: Option<&[&str]>) -> Result<Table> {
  let path = path.as_ref();
  let projection = match columns {
    Some(columns) => {
      let reader = FileReader::try_new(open(path)?, None)?;
      Some(projection_indices(&reader.schema(), columns)?)
    }
    None => None,
  };
  let reader = FileReader::try_new(open(path)?, projection)?;
  let schema = reader.schema();
  let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
  Ok(Table::new(schema, batches))
}

struct PartFile {
  path: PathBuf,
  values: Vec<(String, String)>,
}

fn collect_parts(dir: &Path, values: &[(String, String)], parts: &mut Vec<PartFile>) -> Result<()> {
  let mut entries = fs::read_dir(dir)?
    .map(|entry| entry.map(|entry| entry.path()))
    .collect::<std::io::Result<Vec<_>>>()?;
  entries.sort();
  for path in entries {
    if path.is_dir() {
      let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
      // Hidden and underscore-prefixed directories hold writer bookkeeping, not data
      if name.starts_with('.') || name.starts_with('_') {
        continue;
      }
      let Some(partition) = parse_partition_dir_name(name)? else {
        bail!("{} is not a col=value partition directory", path.display());
      };
      let mut nested = values.to_vec();
      nested.push(partition);
      collect_parts(&path, &nested, parts)?;
    } else if path.extension().is_some_and(|ext| ext == "parquet") {
      parts.push(PartFile {
        path,
        values: values.to_vec(),
      });
    }
  }
  Ok(())
}

/// Partition columns in directory order, typed Int64 when every value parses as one.
fn partition_fields(parts: &[PartFile]) -> Vec<Field> {
  let mut order: Vec<String> = Vec::new();
  let mut integral: BTreeMap<String, bool> = BTreeMap::new();
  for part in parts {
    for (key, value) in &part.values {
      if !order.contains(key) {
        order.push(key.clone());
      }
      let parses = value == NULL_PARTITION || value.parse::<i64>().is_ok();
      *integral.entry(key.clone()).or_insert(true) &= parses;
    }
  }
  order
    .into_iter()
    .map(|key| {
      let data_type = if integral.get(&key).copied().unwrap_or(false) {
        DataType::Int64
      } else {
        DataType::Utf8
      };
      Field::new(key, data_type, true)
    })
    .collect()
}

fn constant_column(field: &Field, value: Option<&str>, len: usize) -> Result<ArrayRef> {
  let value = value.filter(|value| *value != NULL_PARTITION);
  let array: ArrayRef = match (field.data_type(), value) {
    (_, None) => new_null_array(field.data_type(), len),
    (DataType::Int64, Some(value)) => Arc::new(Int64Array::from_value(value.parse()?, len)),
    (_, Some(value)) => Arc::new(StringArray::from_iter_values(std::iter::repeat(value).take(len))),
  };
  Ok(array)
}

/// Read a hive-partitioned dataset, restoring the partition columns after the stored ones.
pub fn read_partitioned(root: impl AsRef<Path>, columns: Option<&[&str]>) -> Result<Table> {
  let root = root.as_ref();
  if !root.is_dir() {
    bail!("Directory {} does not exist", root.display());
  }
  let mut parts = Vec::new();
  collect_parts(root, &[], &mut parts)?;
  let Some(first) = parts.first() else {
    bail!("No parquet files under {}", root.display());
  };

  let mut partition_fields = partition_fields(&parts);
  let file_columns = columns.map(|columns| {
    columns
      .iter()
      .copied()
      .filter(|name| !partition_fields.iter().any(|field| field.name() == name))
      .collect::<Vec<_>>()
  });
  if let Some(columns) = columns {
    partition_fields.retain(|field| columns.contains(&field.name().as_str()));
  }

  let file_schema = read_parquet(&first.path, file_columns.as_deref())?.schema;
  let mut fields: Vec<Field> = file_schema
    .fields()
    .iter()
    .map(|field| field.as_ref().clone())
    .collect();
  fields.extend(partition_fields.iter().cloned());
  let schema: SchemaRef = Arc::new(Schema::new(fields));

  let mut batches = Vec::new();
  for part in &parts {
    let table = read_parquet(&part.path, file_columns.as_deref())?;
    for batch in table.batches {
      let mut arrays = batch.columns().to_vec();
      for field in &partition_fields {
        let value = part
          .values
          .iter()
          .find(|(key, _)| key == field.name())
          .map(|(_, value)| value.as_str());
        arrays.push(constant_column(field, value, batch.num_rows())?);
      }
      batches.push(RecordBatch::try_new(schema.clone(), arrays)?);
    }
  }
  tracing::debug!(root = %root.display(), files = parts.len(), "read partitioned dataset");
  Ok(Table::new(schema, batches))
}

#[cfg(test)]
mod tests {
  use arrow::{array::AsArray, datatypes::Int64Type};
  use tempfile::TempDir;

  use super::*;
  use crate::write::{write_parquet, write_partitioned, ParquetCompression};

  fn sample() -> Table {
    let batch = RecordBatch::try_from_iter(vec![
      ("Year", Arc::new(Int64Array::from(vec![2001, 2002, 2001])) as ArrayRef),
      ("Origin", Arc::new(StringArray::from(vec!["ORD", "ATL", "ATL"])) as ArrayRef),
      ("DepDelay", Arc::new(Int64Array::from(vec![5, -2, 11])) as ArrayRef),
    ])
    .unwrap();
    Table::from_batch(batch)
  }

  #[test]
  fn test_read_parquet_projection() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sample.parquet");
    write_parquet(&path, &sample(), ParquetCompression::Snappy).unwrap();

    let table = read_parquet(&path, Some(&["DepDelay", "Year"][..])).unwrap();
    // Projection keeps file order
    let names: Vec<_> = table.schema.fields().iter().map(|f| f.name().clone()).collect();
    assert_eq!(vec!["Year", "DepDelay"], names);
    assert_eq!(3, table.num_rows());
  }

  #[test]
  fn test_read_parquet_invalid_column() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sample.parquet");
    write_parquet(&path, &sample(), ParquetCompression::Snappy).unwrap();
    let err = read_parquet(&path, Some(&["Yeer"][..])).unwrap_err();
    assert!(err.to_string().contains("Invalid column Yeer"));
  }

  #[test]
  fn test_read_partitioned_types_and_projection() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("sample");
    write_partitioned(&sample(), &["Year".to_string(), "Origin".to_string()], &root).unwrap();

    let table = read_partitioned(&root, None).unwrap();
    assert_eq!(&DataType::Int64, table.schema.field_with_name("Year").unwrap().data_type());
    assert_eq!(&DataType::Utf8, table.schema.field_with_name("Origin").unwrap().data_type());
    assert_eq!(3, table.num_rows());

    let table = read_partitioned(&root, Some(&["Year", "DepDelay"][..])).unwrap();
    assert_eq!(2, table.num_columns());
    let batch = table.concat().unwrap();
    let delays = batch.column_by_name("DepDelay").unwrap().as_primitive::<Int64Type>();
    // Year=2001/Origin=ATL, Year=2001/Origin=ORD, Year=2002/Origin=ATL
    assert_eq!(vec![11, 5, -2], delays.values().to_vec());
  }

  #[test]
  fn test_read_partitioned_escaped_values() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("escaped");
    let batch = RecordBatch::try_from_iter(vec![
      (
        "k",
        Arc::new(StringArray::from(vec!["A/B", "A", "A/B", "x=y", "50%"])) as ArrayRef,
      ),
      ("v", Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5])) as ArrayRef),
    ])
    .unwrap();
    write_partitioned(&Table::from_batch(batch), &["k".to_string()], &root).unwrap();
    assert_eq!(4, std::fs::read_dir(&root).unwrap().count());

    let table = read_partitioned(&root, None).unwrap();
    assert_eq!(5, table.num_rows());
    let batch = table.concat().unwrap();
    let keys = batch.column_by_name("k").unwrap().as_string::<i32>();
    let values = batch.column_by_name("v").unwrap().as_primitive::<Int64Type>();
    let mut pairs: Vec<(String, i64)> = keys
      .iter()
      .zip(values.iter())
      .map(|(key, value)| (key.unwrap().to_string(), value.unwrap()))
      .collect();
    pairs.sort();
    assert_eq!(
      vec![
        ("50%".to_string(), 5),
        ("A".to_string(), 2),
        ("A/B".to_string(), 1),
        ("A/B".to_string(), 3),
        ("x=y".to_string(), 4),
      ],
      pairs
    );
  }

  #[test]
  fn test_read_partitioned_rejects_stray_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("sample");
    write_partitioned(&sample(), &["Year".to_string()], &root).unwrap();
    std::fs::create_dir_all(root.join("Year=2001").join("stray")).unwrap();
    let err = read_partitioned(&root, None).unwrap_err();
    assert!(err.to_string().contains("not a col=value partition directory"));
  }

  #[test]
  fn test_read_partitioned_missing_dir() {
    assert!(read_partitioned("/nonexistent/partitioned", None).is_err());
  }
}
