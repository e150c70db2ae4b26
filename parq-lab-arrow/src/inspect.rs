//! Read-only inspection of Parquet file metadata. Everything here comes from the footer: row
//! groups are never decoded and statistics are reported exactly as the writer stored them.

use std::{
  fmt,
  fs::File,
  io::{Read, Seek, SeekFrom},
  path::{Path, PathBuf},
};

use parq_lab_core::{
  ddl::{ColumnDef, CreateTable},
  head_row_groups,
  similarity::best_match,
  types::{parquet_to_clickhouse, ClickhouseType},
  HEAD_ROW_GROUPS,
};
use parquet::{
  basic::{ConvertedType, LogicalType},
  errors::ParquetError,
  file::{
    footer::{decode_footer, parse_metadata},
    metadata::ParquetMetaData,
    statistics::Statistics,
    FOOTER_SIZE,
  },
  schema::{printer::print_schema, types::ColumnDescriptor},
};
use thiserror::Error;

use crate::display::TableRows;

fn did_you_mean(hint: &Option<String>) -> String {
  hint.as_ref().map(|h| format!(". Did you mean \"{h}\"?")).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum InspectError {
  #[error("File {} does not exist", .0.display())]
  FileNotFound(PathBuf),

  #[error("Invalid column {column}{}", did_you_mean(.hint))]
  InvalidColumn { column: String, hint: Option<String> },

  #[error(transparent)]
  Parquet(#[from] ParquetError),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Types(#[from] parq_lab_core::Error),
}

pub type Result<T> = std::result::Result<T, InspectError>;

pub fn check_file_exists(path: impl AsRef<Path>) -> Result<()> {
  let path = path.as_ref();
  if !path.exists() {
    return Err(InspectError::FileNotFound(path.to_path_buf()));
  }
  Ok(())
}

/// A Parquet file whose footer has been parsed.
#[derive(Debug, Clone)]
pub struct ParquetInfo {
  path: PathBuf,
  metadata: ParquetMetaData,
}

impl ParquetInfo {
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    check_file_exists(path)?;
    let file = File::open(path)?;
    let metadata = parse_metadata(&file)?;
    tracing::debug!(
      path = %path.display(),
      row_groups = metadata.num_row_groups(),
      "parsed parquet footer"
    );
    Ok(ParquetInfo {
      path: path.to_path_buf(),
      metadata,
    })
  }

  pub fn metadata(&self) -> &ParquetMetaData {
    &self.metadata
  }

  pub fn num_columns(&self) -> usize {
    self.metadata.file_metadata().schema_descr().num_columns()
  }

  pub fn num_row_groups(&self) -> usize {
    self.metadata.num_row_groups()
  }

  pub fn summary(&self) -> Result<MetadataSummary> {
    let file_metadata = self.metadata.file_metadata();
    Ok(MetadataSummary {
      created_by: file_metadata.created_by().map(str::to_string),
      num_columns: self.num_columns(),
      num_rows: file_metadata.num_rows(),
      num_row_groups: self.num_row_groups(),
      format_version: file_metadata.version(),
      serialized_size: footer_metadata_len(&self.path)?,
    })
  }

  /// The Parquet message type, as written in the footer.
  pub fn schema_text(&self) -> String {
    let mut buffer = Vec::new();
    print_schema(&mut buffer, self.metadata.file_metadata().schema());
    String::from_utf8_lossy(&buffer).into_owned()
  }

  fn columns(&self) -> impl Iterator<Item = std::sync::Arc<ColumnDescriptor>> + '_ {
    let schema = self.metadata.file_metadata().schema_descr();
    (0..schema.num_columns()).map(move |idx| schema.column(idx))
  }

  /// Leaf column names in schema order.
  pub fn column_names(&self) -> Vec<String> {
    self.columns().map(|column| column.name().to_string()).collect()
  }

  pub fn column_index(&self, column_name: &str) -> Result<usize> {
    let names = self.column_names();
    names
      .iter()
      .position(|name| name == column_name)
      .ok_or_else(|| InspectError::InvalidColumn {
        column: column_name.to_string(),
        hint: best_match(column_name, names.iter().map(String::as_str)),
      })
  }

  pub fn column_info(&self) -> Vec<ColumnInfo> {
    self
      .columns()
      .map(|column| ColumnInfo {
        name: column.name().to_string(),
        path: column.path().string(),
        max_definition_level: column.max_def_level(),
        max_repetition_level: column.max_rep_level(),
        physical_type: column.physical_type().to_string(),
      })
      .collect()
  }

  /// For each column, the number of inspected row groups that carry statistics.
  pub fn stats_set_counts(&self, all: bool) -> Vec<StatsSetCount> {
    let total = head_row_groups(self.num_row_groups(), HEAD_ROW_GROUPS, all);
    let mut counts = vec![0; self.num_columns()];
    for row_group in &self.metadata.row_groups()[..total] {
      for (col_idx, column) in row_group.columns().iter().enumerate() {
        if column.statistics().is_some() {
          counts[col_idx] += 1;
        }
      }
    }
    counts
      .into_iter()
      .zip(self.column_names())
      .map(|(count, column)| StatsSetCount {
        column,
        count,
        total,
      })
      .collect()
  }

  /// Statistics of one column, one entry per inspected row group that has them.
  pub fn column_stats(&self, column_name: &str, all: bool) -> Result<Vec<ColumnStats>> {
    let col_idx = self.column_index(column_name)?;
    let total = head_row_groups(self.num_row_groups(), HEAD_ROW_GROUPS, all);

    let stats = self.metadata.row_groups()[..total]
      .iter()
      .enumerate()
      .filter_map(|(row_group, row_group_metadata)| {
        let column = row_group_metadata.column(col_idx);
        column
          .statistics()
          .map(|statistics| ColumnStats::new(row_group, statistics, column.num_values()))
      })
      .collect();
    Ok(stats)
  }

  /// ClickHouse column types for every column. Integer annotations take precedence over the
  /// physical type so that an INT32 annotated as UINT8 maps to UInt8.
  pub fn clickhouse_columns(&self) -> Result<Vec<ColumnDef>> {
    self
      .columns()
      .map(|column| {
        let parquet_type = parquet_type_name(&column);
        let ty: ClickhouseType = parquet_to_clickhouse(&parquet_type)?;
        Ok(ColumnDef::new(column.name(), ty, column.max_def_level() > 0))
      })
      .collect()
  }

  /// Columns as `name Type, name Type`, the structure argument of ClickHouse's `file()`.
  pub fn clickhouse_types(&self) -> Result<String> {
    let columns = self.clickhouse_columns()?;
    Ok(
      columns
        .iter()
        .map(|column| format!("{} {}", column.name, column.ty))
        .collect::<Vec<_>>()
        .join(", "),
    )
  }

  pub fn create_table_sql(&self, table_name: &str, sorting_keys: &[String]) -> Result<String> {
    let sql = CreateTable::new(table_name, self.clickhouse_columns()?)
      .with_sorting_keys(sorting_keys.iter().cloned())
      .to_sql()?;
    Ok(sql)
  }
}

/// Type name used for the ClickHouse lookup: `INT8`/`UINT16`/... for annotated integers,
/// otherwise the physical type (`INT32`, `DOUBLE`, `BYTE_ARRAY`, ...).
fn parquet_type_name(column: &ColumnDescriptor) -> String {
  if let Some(LogicalType::Integer {
    bit_width,
    is_signed,
  }) = column.logical_type()
  {
    let sign = if is_signed { "" } else { "U" };
    return format!("{sign}INT{bit_width}");
  }
  let annotated = match column.converted_type() {
    ConvertedType::INT_8 => Some("INT8"),
    ConvertedType::INT_16 => Some("INT16"),
    ConvertedType::INT_32 => Some("INT32"),
    ConvertedType::INT_64 => Some("INT64"),
    ConvertedType::UINT_8 => Some("UINT8"),
    ConvertedType::UINT_16 => Some("UINT16"),
    ConvertedType::UINT_32 => Some("UINT32"),
    ConvertedType::UINT_64 => Some("UINT64"),
    _ => None,
  };
  match annotated {
    Some(name) => name.to_string(),
    None => column.physical_type().to_string(),
  }
}

/// Length of the thrift-encoded footer, read from the 8-byte file trailer.
fn footer_metadata_len(path: &Path) -> Result<u64> {
  let mut file = File::open(path)?;
  file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
  let mut trailer = [0u8; FOOTER_SIZE];
  file.read_exact(&mut trailer)?;
  Ok(decode_footer(&trailer)? as u64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataSummary {
  pub created_by: Option<String>,
  pub num_columns: usize,
  pub num_rows: i64,
  pub num_row_groups: usize,
  pub format_version: i32,
  pub serialized_size: u64,
}

impl fmt::Display for MetadataSummary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "  created_by: {}", self.created_by.as_deref().unwrap_or(""))?;
    writeln!(f, "  num_columns: {}", self.num_columns)?;
    writeln!(f, "  num_rows: {}", self.num_rows)?;
    writeln!(f, "  num_row_groups: {}", self.num_row_groups)?;
    writeln!(f, "  format_version: {}", self.format_version)?;
    write!(f, "  serialized_size: {}", self.serialized_size)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
  pub name: String,
  pub path: String,
  pub max_definition_level: i16,
  pub max_repetition_level: i16,
  pub physical_type: String,
}

impl TableRows for ColumnInfo {
  fn headers() -> Vec<&'static str> {
    vec![
      "name",
      "path",
      "max_definition_level",
      "max_repetition_level",
      "physical_type",
    ]
  }

  fn cells(&self) -> Vec<String> {
    vec![
      self.name.clone(),
      self.path.clone(),
      self.max_definition_level.to_string(),
      self.max_repetition_level.to_string(),
      self.physical_type.clone(),
    ]
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSetCount {
  pub column: String,
  pub count: usize,
  pub total: usize,
}

impl fmt::Display for StatsSetCount {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:10}/{}\t{}", self.count, self.total, self.column)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnStats {
  pub row_group: usize,
  pub has_min_max: bool,
  pub min: Option<String>,
  pub max: Option<String>,
  pub null_count: u64,
  pub distinct_count: Option<u64>,
  pub num_values: i64,
  pub physical_type: String,
}

impl ColumnStats {
  fn new(row_group: usize, statistics: &Statistics, num_values: i64) -> Self {
    let has_min_max = statistics.has_min_max_set();
    let (min, max) = if has_min_max {
      let (min, max) = min_max_strings(statistics);
      (Some(min), Some(max))
    } else {
      (None, None)
    };
    ColumnStats {
      row_group,
      has_min_max,
      min,
      max,
      null_count: statistics.null_count(),
      distinct_count: statistics.distinct_count(),
      num_values,
      physical_type: statistics.physical_type().to_string(),
    }
  }
}

/// Only call when `has_min_max_set()` holds: the typed accessors panic otherwise.
fn min_max_strings(statistics: &Statistics) -> (String, String) {
  fn bytes_to_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
      Ok(s) => s.to_string(),
      Err(_) => format!("{bytes:?}"),
    }
  }

  match statistics {
    Statistics::Boolean(s) => (s.min().to_string(), s.max().to_string()),
    Statistics::Int32(s) => (s.min().to_string(), s.max().to_string()),
    Statistics::Int64(s) => (s.min().to_string(), s.max().to_string()),
    Statistics::Int96(s) => (format!("{:?}", s.min()), format!("{:?}", s.max())),
    Statistics::Float(s) => (s.min().to_string(), s.max().to_string()),
    Statistics::Double(s) => (s.min().to_string(), s.max().to_string()),
    Statistics::ByteArray(s) => (bytes_to_string(s.min().data()), bytes_to_string(s.max().data())),
    Statistics::FixedLenByteArray(s) => {
      (bytes_to_string(s.min().data()), bytes_to_string(s.max().data()))
    }
  }
}

impl TableRows for ColumnStats {
  fn headers() -> Vec<&'static str> {
    vec![
      "row_group",
      "has_min_max",
      "min",
      "max",
      "null_count",
      "distinct_count",
      "num_values",
      "physical_type",
    ]
  }

  fn cells(&self) -> Vec<String> {
    let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "None".to_string());
    vec![
      self.row_group.to_string(),
      self.has_min_max.to_string(),
      optional(&self.min),
      optional(&self.max),
      self.null_count.to_string(),
      optional(&self.distinct_count.map(|c| c.to_string())),
      self.num_values.to_string(),
      self.physical_type.clone(),
    ]
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use arrow::{
    array::{ArrayRef, Float64Array, Int64Array, StringArray, UInt8Array},
    record_batch::RecordBatch,
  };
  use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
  use rstest::rstest;
  use tempfile::TempDir;

  use super::*;

  /// Three row groups of two rows each: Year, Carrier, DepDelay (with a null) and a UInt8 flag.
  fn write_fixture(dir: &TempDir) -> PathBuf {
    let batch = RecordBatch::try_from_iter_with_nullable(vec![
      (
        "Year",
        Arc::new(Int64Array::from(vec![1987, 1987, 1988, 1988, 1989, 1989])) as ArrayRef,
        true,
      ),
      (
        "Carrier",
        Arc::new(StringArray::from(vec!["AA", "UA", "AA", "DL", "UA", "UA"])) as ArrayRef,
        true,
      ),
      (
        "DepDelay",
        Arc::new(Float64Array::from(vec![
          Some(1.5),
          None,
          Some(-3.0),
          Some(7.0),
          Some(0.0),
          Some(2.0),
        ])) as ArrayRef,
        true,
      ),
      (
        "Cancelled",
        Arc::new(UInt8Array::from(vec![0, 1, 0, 0, 0, 1])) as ArrayRef,
        true,
      ),
    ])
    .unwrap();
    let path = dir.path().join("flights.parquet");
    let props = WriterProperties::builder()
      .set_max_row_group_size(2)
      .build();
    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props)).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path
  }

  /// One row per row group, `row_groups` row groups of a single Int64 column.
  fn write_single_row_groups(dir: &TempDir, row_groups: i64) -> PathBuf {
    let batch = RecordBatch::try_from_iter(vec![(
      "Year",
      Arc::new(Int64Array::from_iter_values(1987..1987 + row_groups)) as ArrayRef,
    )])
    .unwrap();
    let path = dir.path().join("years.parquet");
    let props = WriterProperties::builder()
      .set_max_row_group_size(1)
      .build();
    let file = File::create(&path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props)).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();
    path
  }

  #[rstest]
  #[case(false, 5)]
  #[case(true, 7)]
  fn test_head_row_groups_limit(#[case] all: bool, #[case] expected: usize) {
    let dir = TempDir::new().unwrap();
    let info = ParquetInfo::open(write_single_row_groups(&dir, 7)).unwrap();
    assert_eq!(7, info.num_row_groups());

    let counts = info.stats_set_counts(all);
    assert_eq!(expected, counts[0].count);
    assert_eq!(expected, counts[0].total);

    let stats = info.column_stats("Year", all).unwrap();
    assert_eq!(expected, stats.len());
    assert_eq!(expected - 1, stats.last().unwrap().row_group);
    assert_eq!(Some((1987 + expected as i64 - 1).to_string()), stats.last().unwrap().max);
  }

  #[test]
  fn test_missing_file() {
    let err = ParquetInfo::open("does/not/exist.parquet").unwrap_err();
    assert_eq!("File does/not/exist.parquet does not exist", err.to_string());
  }

  #[test]
  fn test_summary_and_names() {
    let dir = TempDir::new().unwrap();
    let info = ParquetInfo::open(write_fixture(&dir)).unwrap();
    let summary = info.summary().unwrap();
    assert_eq!(4, summary.num_columns);
    assert_eq!(6, summary.num_rows);
    assert_eq!(3, summary.num_row_groups);
    assert!(summary.serialized_size > 0);
    assert!(summary.to_string().contains("  num_rows: 6"));
    assert_eq!(vec!["Year", "Carrier", "DepDelay", "Cancelled"], info.column_names());
    assert!(info.schema_text().contains("message arrow_schema"));
  }

  #[test]
  fn test_column_info() {
    let dir = TempDir::new().unwrap();
    let info = ParquetInfo::open(write_fixture(&dir)).unwrap();
    let columns = info.column_info();
    assert_eq!(
      ColumnInfo {
        name: "Carrier".into(),
        path: "Carrier".into(),
        max_definition_level: 1,
        max_repetition_level: 0,
        physical_type: "BYTE_ARRAY".into(),
      },
      columns[1]
    );
    assert_eq!("INT64", columns[0].physical_type);
  }

  #[test]
  fn test_stats_set_counts() {
    let dir = TempDir::new().unwrap();
    let info = ParquetInfo::open(write_fixture(&dir)).unwrap();
    let counts = info.stats_set_counts(false);
    assert_eq!(4, counts.len());
    assert!(counts.iter().all(|c| c.count == 3 && c.total == 3));
    assert_eq!("         3/3\tYear", counts[0].to_string());
  }

  #[test]
  fn test_column_stats() {
    let dir = TempDir::new().unwrap();
    let info = ParquetInfo::open(write_fixture(&dir)).unwrap();
    let stats = info.column_stats("DepDelay", true).unwrap();
    assert_eq!(3, stats.len());
    assert_eq!(Some("1.5".to_string()), stats[0].max);
    assert_eq!(1, stats[0].null_count);
    assert_eq!(2, stats[0].num_values);
    assert_eq!("DOUBLE", stats[0].physical_type);

    let carriers = info.column_stats("Carrier", false).unwrap();
    assert_eq!(Some("AA".to_string()), carriers[1].min);
    assert_eq!(Some("DL".to_string()), carriers[1].max);
  }

  #[test]
  fn test_invalid_column() {
    let dir = TempDir::new().unwrap();
    let info = ParquetInfo::open(write_fixture(&dir)).unwrap();
    let err = info.column_stats("carrier", false).unwrap_err();
    assert_eq!(
      "Invalid column carrier. Did you mean \"Carrier\"?",
      err.to_string()
    );
  }

  #[test]
  fn test_clickhouse_types() {
    let dir = TempDir::new().unwrap();
    let info = ParquetInfo::open(write_fixture(&dir)).unwrap();
    assert_eq!(
      "Year Int64, Carrier String, DepDelay Float64, Cancelled UInt8",
      info.clickhouse_types().unwrap()
    );
  }

  #[test]
  fn test_create_table_sql() {
    let dir = TempDir::new().unwrap();
    let info = ParquetInfo::open(write_fixture(&dir)).unwrap();
    let sql = info
      .create_table_sql("flight", &["Year".to_string()])
      .unwrap();
    assert!(sql.contains("\tYear Int64,"));
    assert!(sql.contains("\tCarrier Nullable(String),"));
    assert!(sql.ends_with("Order by Year"));
  }
}
