//! Writers: Parquet with a chosen codec, CSV conversion, hive-partitioned datasets and Arrow IPC
//! files. The partitioned and IPC copies live under a cache root so that timing runs can reuse
//! them.

use std::{
  collections::BTreeMap,
  fs::{self, File},
  io::Seek,
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{bail, Context, Result};
use arrow::{
  array::{ArrayRef, RecordBatch, UInt32Array},
  compute::take,
  csv::{reader::Format, ReaderBuilder},
  datatypes::{Field, Schema, SchemaRef},
  ipc::{
    writer::{FileWriter, IpcWriteOptions},
    CompressionType,
  },
  util::display::{ArrayFormatter, FormatOptions},
};
use clap::ValueEnum;
use parquet::{
  arrow::ArrowWriter,
  basic::{Compression, GzipLevel, ZstdLevel},
  file::properties::WriterProperties,
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::{read::read_parquet, table::Table};

/// Directory name used for null partition values, as in Hive.
pub const NULL_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Bytes escaped in partition directory names, the set Hive escapes.
const PARTITION_ESCAPES: &AsciiSet = &CONTROLS
  .add(b'"')
  .add(b'#')
  .add(b'%')
  .add(b'\'')
  .add(b'*')
  .add(b'/')
  .add(b':')
  .add(b'=')
  .add(b'?')
  .add(b'\\')
  .add(b'[')
  .add(b']')
  .add(b'^')
  .add(b'{');

const CACHE_DIR_NAME: &str = ".parq-cli";
const CSV_INFER_RECORDS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ParquetCompression {
  #[default]
  Snappy,
  Gzip,
  Lz4,
  Zstd,
  None,
}

impl ParquetCompression {
  fn codec(self) -> Compression {
    match self {
      ParquetCompression::Snappy => Compression::SNAPPY,
      ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
      ParquetCompression::Lz4 => Compression::LZ4_RAW,
      ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
      ParquetCompression::None => Compression::UNCOMPRESSED,
    }
  }
}

/// `$PARQ_CLI_HOME` when set, otherwise `~/.parq-cli`.
pub fn default_cache_root() -> Result<PathBuf> {
  if let Some(root) = std::env::var_os("PARQ_CLI_HOME") {
    return Ok(PathBuf::from(root));
  }
  let home = dirs::home_dir().context("Cannot find the home directory; set PARQ_CLI_HOME")?;
  Ok(home.join(CACHE_DIR_NAME))
}

pub fn write_parquet(
  path: impl AsRef<Path>,
  table: &Table,
  compression: ParquetCompression,
) -> Result<()> {
  let path = path.as_ref();
  let props = WriterProperties::builder()
    .set_compression(compression.codec())
    .build();
  let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
  let mut writer = ArrowWriter::try_new(file, table.schema.clone(), Some(props))?;
  for batch in &table.batches {
    writer.write(batch)?;
  }
  writer.close()?;
  tracing::info!(path = %path.display(), rows = table.num_rows(), ?compression, "wrote parquet");
  Ok(())
}

/// Read a CSV file into a table. Without `names` the first line is a header; with `names` the
/// file has no header and columns are named in order.
pub fn read_csv(path: impl AsRef<Path>, names: Option<&[String]>) -> Result<Table> {
  let path = path.as_ref();
  let mut file =
    File::open(path).with_context(|| format!("File {} does not exist", path.display()))?;
  let has_header = names.is_none();
  let format = Format::default().with_header(has_header);
  let (inferred, _) = format.infer_schema(&mut file, Some(CSV_INFER_RECORDS))?;
  file.rewind()?;

  let schema = match names {
    None => inferred,
    Some(names) => {
      if names.len() != inferred.fields().len() {
        bail!(
          "{} column names given but {} has {} columns",
          names.len(),
          path.display(),
          inferred.fields().len()
        );
      }
      let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| Field::new(name, field.data_type().clone(), true))
        .collect();
      Schema::new(fields)
    }
  };
  let schema = Arc::new(schema);

  let reader = ReaderBuilder::new(schema.clone())
    .with_header(has_header)
    .build(file)?;
  let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
  Ok(Table::new(schema, batches))
}

pub fn csv_to_parquet(
  csv_path: impl AsRef<Path>,
  names: Option<&[String]>,
  parquet_path: impl AsRef<Path>,
  compression: ParquetCompression,
) -> Result<Table> {
  let table = read_csv(csv_path, names)?;
  write_parquet(parquet_path, &table, compression)?;
  Ok(table)
}

/// `col=value` with both sides percent-encoded, so that a value never adds a directory level.
pub fn partition_dir_name(column: &str, value: &str) -> String {
  format!(
    "{}={}",
    utf8_percent_encode(column, PARTITION_ESCAPES),
    utf8_percent_encode(value, PARTITION_ESCAPES)
  )
}

/// Inverse of [`partition_dir_name`]; `None` when `name` is not a `col=value` directory.
pub fn parse_partition_dir_name(name: &str) -> Result<Option<(String, String)>> {
  let Some((column, value)) = name.split_once('=') else {
    return Ok(None);
  };
  let column = percent_decode_str(column).decode_utf8()?.into_owned();
  let value = percent_decode_str(value).decode_utf8()?.into_owned();
  Ok(Some((column, value)))
}

/// Cache location for a derived copy of `source`: `<root>/<file stem><suffix>`.
pub fn cache_path(source: &Path, cache_root: &Path, suffix: &str) -> Result<PathBuf> {
  let stem = source
    .file_stem()
    .with_context(|| format!("{} has no file name", source.display()))?;
  let mut name = stem.to_os_string();
  name.push(suffix);
  Ok(cache_root.join(name))
}

/// Write `table` as a hive-partitioned dataset under `root` (`col=value/part-0.parquet`).
/// Partition columns are stored in the directory names only. An existing `root` is replaced.
pub fn write_partitioned(table: &Table, partition_cols: &[String], root: &Path) -> Result<()> {
  if partition_cols.is_empty() {
    bail!("At least one partition column is required");
  }
  let partition_indices = partition_cols
    .iter()
    .map(|col| table.schema.index_of(col).with_context(|| format!("Invalid column {col}")))
    .collect::<Result<Vec<_>>>()?;
  let data_indices: Vec<usize> = (0..table.num_columns())
    .filter(|idx| !partition_indices.contains(idx))
    .collect();
  if data_indices.is_empty() {
    bail!("Every column is a partition column");
  }
  let data_schema: SchemaRef = Arc::new(table.schema.project(&data_indices)?);

  // Partition values (rendered) -> slices of every batch belonging to the partition
  let options = FormatOptions::default().with_null(NULL_PARTITION);
  let mut partitions: BTreeMap<Vec<String>, Vec<RecordBatch>> = BTreeMap::new();
  for batch in &table.batches {
    let formatters = partition_indices
      .iter()
      .map(|&idx| ArrayFormatter::try_new(batch.column(idx).as_ref(), &options))
      .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut rows: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row_idx in 0..batch.num_rows() {
      let values = formatters
        .iter()
        .map(|formatter| formatter.value(row_idx).to_string())
        .collect();
      rows.entry(values).or_default().push(row_idx as u32);
    }
    for (values, indices) in rows {
      let indices = UInt32Array::from(indices);
      let columns = data_indices
        .iter()
        .map(|&idx| take(batch.column(idx).as_ref(), &indices, None))
        .collect::<std::result::Result<Vec<ArrayRef>, _>>()?;
      partitions
        .entry(values)
        .or_default()
        .push(RecordBatch::try_new(data_schema.clone(), columns)?);
    }
  }

  if root.exists() {
    fs::remove_dir_all(root).with_context(|| format!("Cannot remove {}", root.display()))?;
  }
  for (values, batches) in &partitions {
    let dir = partition_cols
      .iter()
      .zip(values)
      .fold(root.to_path_buf(), |dir, (col, value)| dir.join(partition_dir_name(col, value)));
    fs::create_dir_all(&dir)?;
    let part = Table::new(data_schema.clone(), batches.clone());
    write_parquet(dir.join("part-0.parquet"), &part, ParquetCompression::Lz4)?;
  }
  tracing::info!(
    root = %root.display(),
    partitions = partitions.len(),
    "wrote partitioned dataset"
  );
  Ok(())
}

/// Read `parquet_file` and write a partitioned copy under the cache root.
pub fn partitioned_copy(
  parquet_file: &Path,
  partition_cols: &[String],
  cache_root: &Path,
) -> Result<PathBuf> {
  let table = read_parquet(parquet_file, None)?;
  let root = cache_path(parquet_file, cache_root, "")?;
  write_partitioned(&table, partition_cols, &root)?;
  Ok(root)
}

/// Write `table` as an LZ4-compressed Arrow IPC file, replacing any existing file.
pub fn write_ipc(table: &Table, path: &Path) -> Result<()> {
  if path.exists() {
    fs::remove_file(path)?;
  }
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let options = IpcWriteOptions::default().try_with_compression(Some(CompressionType::LZ4_FRAME))?;
  let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
  let mut writer = FileWriter::try_new_with_options(file, &table.schema, options)?;
  for batch in &table.batches {
    writer.write(batch)?;
  }
  writer.finish()?;
  tracing::info!(path = %path.display(), rows = table.num_rows(), "wrote ipc file");
  Ok(())
}

/// Read `parquet_file` and write an IPC ("feather") copy under the cache root.
pub fn ipc_copy(parquet_file: &Path, cache_root: &Path) -> Result<PathBuf> {
  let table = read_parquet(parquet_file, None)?;
  let path = cache_path(parquet_file, cache_root, ".feather")?;
  write_ipc(&table, &path)?;
  Ok(path)
}
