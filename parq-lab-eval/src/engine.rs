//! The timing harness. Every engine answers the same [`GroupQuery`] over the same Parquet file;
//! work that only sets up the input (cached copies, executable lookup) happens in
//! [`Engine::prepare`] and is excluded from the measured time.
//!
//! The Arrow engines differ only in how the input reaches DataFusion's group-by: read whole,
//! projected, partitioned, from IPC, streamed by the async reader, or scanned by DataFusion.

use std::{
  io::{self, Write},
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};
use arrow::array::RecordBatch;
use clap::ValueEnum;
use futures::StreamExt;
use parq_lab_arrow::{
  aggregate::{aggregate_batches, aggregate_parquet, aggregate_table},
  display::{print_batches, Output},
  inspect::ParquetInfo,
  read::{read_ipc, read_parquet, read_partitioned},
  write::{ipc_copy, partitioned_copy},
};
use parq_lab_core::{
  format::{format_elapsed, render_table, Justify},
  query::GroupQuery,
};
use parquet::arrow::{ParquetRecordBatchStreamBuilder, ProjectionMask};

use crate::{
  clickhouse::{check_executable, file_source, local_query, ClickhouseClient, CLICKHOUSE_LOCAL},
  timing::timed,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EngineKind {
  /// Read the whole file, then group
  ArrowParquet,
  /// Read only the query's columns, then group
  ArrowProjected,
  /// Read a hive-partitioned copy of the file
  ArrowPartitioned,
  /// Read an LZ4-compressed Arrow IPC copy of the file
  ArrowIpc,
  /// Group batches streamed from the async Parquet reader
  AsyncStream,
  /// Let DataFusion scan the file and group
  DatafusionParquet,
  /// Query the file in place with clickhouse-local
  ClickhouseLocal,
  /// Query a table on a ClickHouse server through clickhouse-client
  ClickhouseServer,
  /// Query the file with DuckDB's parquet_scan (needs the `duckdb` feature)
  Duckdb,
  /// Query the file with a polars lazy scan (needs the `polars` feature)
  Polars,
}

/// What an engine hands back: Arrow batches, rows already rendered as text cells, or the raw
/// output of an external program.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
  Batches(Vec<RecordBatch>),
  Rows {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
  },
  Text(String),
}

impl QueryOutput {
  pub fn print(&self) -> Result<()> {
    match self {
      QueryOutput::Batches(batches) => print_batches(batches),
      QueryOutput::Rows { headers, rows } => {
        let justify = match Output::detect() {
          Output::Terminal => Justify::Right,
          Output::Redirected => Justify::Left,
        };
        writeln!(io::stdout().lock(), "{}", render_table(headers, rows, justify))?;
        Ok(())
      }
      QueryOutput::Text(text) => {
        writeln!(io::stdout().lock(), "{text}")?;
        Ok(())
      }
    }
  }
}

pub trait Engine {
  fn name(&self) -> &'static str;

  /// Untimed setup, such as writing a cached copy of the input.
  fn prepare(&mut self) -> Result<()> {
    Ok(())
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput>;
}

pub struct ArrowParquet {
  file: PathBuf,
}

impl Engine for ArrowParquet {
  fn name(&self) -> &'static str {
    "arrow-parquet"
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let table = read_parquet(&self.file, None)?;
    let batch = aggregate_batches(query, table.schema.clone(), &table.batches)?;
    Ok(QueryOutput::Batches(vec![batch]))
  }
}

pub struct ArrowProjected {
  file: PathBuf,
}

impl Engine for ArrowProjected {
  fn name(&self) -> &'static str {
    "arrow-projected"
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let columns = query.columns();
    let table = read_parquet(&self.file, Some(columns.as_slice()))?;
    let batch = aggregate_batches(query, table.schema.clone(), &table.batches)?;
    Ok(QueryOutput::Batches(vec![batch]))
  }
}

pub struct ArrowPartitioned {
  file: PathBuf,
  cache_root: PathBuf,
  partition_cols: Vec<String>,
  root: Option<PathBuf>,
}

impl Engine for ArrowPartitioned {
  fn name(&self) -> &'static str {
    "arrow-partitioned"
  }

  fn prepare(&mut self) -> Result<()> {
    self.root = Some(partitioned_copy(&self.file, &self.partition_cols, &self.cache_root)?);
    Ok(())
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let root = self.root.as_ref().context("Partitioned copy was not prepared")?;
    let columns = query.columns();
    let table = read_partitioned(root, Some(columns.as_slice()))?;
    let batch = aggregate_batches(query, table.schema.clone(), &table.batches)?;
    Ok(QueryOutput::Batches(vec![batch]))
  }
}

pub struct ArrowIpc {
  file: PathBuf,
  cache_root: PathBuf,
  path: Option<PathBuf>,
}

impl Engine for ArrowIpc {
  fn name(&self) -> &'static str {
    "arrow-ipc"
  }

  fn prepare(&mut self) -> Result<()> {
    self.path = Some(ipc_copy(&self.file, &self.cache_root)?);
    Ok(())
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let path = self.path.as_ref().context("IPC copy was not prepared")?;
    let columns = query.columns();
    let table = read_ipc(path, Some(columns.as_slice()))?;
    let batch = aggregate_batches(query, table.schema.clone(), &table.batches)?;
    Ok(QueryOutput::Batches(vec![batch]))
  }
}

/// Group `file`'s projected batches as the async reader streams them in.
pub async fn stream_aggregate(file: impl AsRef<Path>, query: &GroupQuery) -> Result<RecordBatch> {
  let file = file.as_ref();
  let input = tokio::fs::File::open(file)
    .await
    .with_context(|| format!("File {} does not exist", file.display()))?;
  let builder = ParquetRecordBatchStreamBuilder::new(input).await?;

  let indices = query
    .columns()
    .into_iter()
    .map(|column| {
      builder
        .schema()
        .index_of(column)
        .with_context(|| format!("Invalid column {column}"))
    })
    .collect::<Result<Vec<_>>>()?;
  let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
  let mut stream = builder.with_projection(mask).build()?;

  let schema = stream.schema().clone();
  let mut batches = Vec::new();
  while let Some(batch) = stream.next().await {
    batches.push(batch?);
  }
  aggregate_table(query, schema, batches).await
}

pub struct AsyncStream {
  file: PathBuf,
  runtime: tokio::runtime::Runtime,
}

impl Engine for AsyncStream {
  fn name(&self) -> &'static str {
    "async-stream"
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let batch = self.runtime.block_on(stream_aggregate(&self.file, query))?;
    Ok(QueryOutput::Batches(vec![batch]))
  }
}

pub struct DatafusionParquet {
  file: PathBuf,
  runtime: tokio::runtime::Runtime,
}

impl Engine for DatafusionParquet {
  fn name(&self) -> &'static str {
    "datafusion-parquet"
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let batch = self.runtime.block_on(aggregate_parquet(&self.file, query))?;
    Ok(QueryOutput::Batches(vec![batch]))
  }
}

pub struct ClickhouseLocal {
  file: PathBuf,
  program: Option<PathBuf>,
  structure: Option<String>,
}

impl Engine for ClickhouseLocal {
  fn name(&self) -> &'static str {
    "clickhouse-local"
  }

  fn prepare(&mut self) -> Result<()> {
    let (program, version) = check_executable(CLICKHOUSE_LOCAL)?;
    println!("Found {version}");
    let structure = ParquetInfo::open(&self.file)?.clickhouse_types()?;
    println!("{structure}");
    self.program = Some(program);
    self.structure = Some(structure);
    Ok(())
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let (Some(program), Some(structure)) = (&self.program, &self.structure) else {
      anyhow::bail!("clickhouse-local was not prepared");
    };
    let sql = query.to_sql(&file_source(&self.file, structure));
    Ok(QueryOutput::Text(local_query(program, &sql)?))
  }
}

pub struct ClickhouseServer {
  client: ClickhouseClient,
  table: String,
}

impl Engine for ClickhouseServer {
  fn name(&self) -> &'static str {
    "clickhouse-server"
  }

  fn prepare(&mut self) -> Result<()> {
    self.client.require_password()?;
    Ok(())
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let sql = query.to_sql(&self.table);
    Ok(QueryOutput::Text(self.client.query(&sql)?))
  }
}

#[cfg(feature = "duckdb")]
fn duckdb_engine(file: PathBuf) -> Result<Box<dyn Engine>> {
  Ok(Box::new(crate::duck::DuckdbEngine::open(file)?))
}

#[cfg(not(feature = "duckdb"))]
fn duckdb_engine(_file: PathBuf) -> Result<Box<dyn Engine>> {
  anyhow::bail!("DuckDB support is not compiled in; rebuild with `--features duckdb`")
}

#[cfg(feature = "polars")]
fn polars_engine(file: PathBuf) -> Result<Box<dyn Engine>> {
  Ok(Box::new(crate::polars_scan::PolarsEngine::new(file)))
}

#[cfg(not(feature = "polars"))]
fn polars_engine(_file: PathBuf) -> Result<Box<dyn Engine>> {
  anyhow::bail!("Polars support is not compiled in; rebuild with `--features polars`")
}

/// Everything besides the input file that some engine needs.
#[derive(Debug, Clone)]
pub struct EngineSettings {
  pub cache_root: PathBuf,
  pub partition_cols: Vec<String>,
  pub client: ClickhouseClient,
  /// Table queried by the server engine, e.g. `datasets.ontime`.
  pub server_table: String,
}

pub fn build_engine(
  kind: EngineKind,
  file: &Path,
  settings: &EngineSettings,
) -> Result<Box<dyn Engine>> {
  let file = file.to_path_buf();
  let engine: Box<dyn Engine> = match kind {
    EngineKind::ArrowParquet => Box::new(ArrowParquet { file }),
    EngineKind::ArrowProjected => Box::new(ArrowProjected { file }),
    EngineKind::ArrowPartitioned => Box::new(ArrowPartitioned {
      file,
      cache_root: settings.cache_root.clone(),
      partition_cols: settings.partition_cols.clone(),
      root: None,
    }),
    EngineKind::ArrowIpc => Box::new(ArrowIpc {
      file,
      cache_root: settings.cache_root.clone(),
      path: None,
    }),
    EngineKind::AsyncStream => Box::new(AsyncStream {
      file,
      runtime: tokio::runtime::Builder::new_current_thread().enable_all().build()?,
    }),
    EngineKind::DatafusionParquet => Box::new(DatafusionParquet {
      file,
      runtime: tokio::runtime::Builder::new_current_thread().enable_all().build()?,
    }),
    EngineKind::ClickhouseLocal => Box::new(ClickhouseLocal {
      file,
      program: None,
      structure: None,
    }),
    EngineKind::ClickhouseServer => Box::new(ClickhouseServer {
      client: settings.client.clone(),
      table: settings.server_table.clone(),
    }),
    EngineKind::Duckdb => duckdb_engine(file)?,
    EngineKind::Polars => polars_engine(file)?,
  };
  Ok(engine)
}

#[derive(Debug)]
pub struct RunReport {
  pub engine: &'static str,
  pub elapsed: Duration,
  pub output: QueryOutput,
}

impl RunReport {
  pub fn print(&self) -> Result<()> {
    println!("{}", format_elapsed(self.elapsed));
    self.output.print()
  }
}

/// Prepare `engine`, then time a single run of `query`.
pub fn run_engine(engine: &mut dyn Engine, query: &GroupQuery) -> Result<RunReport> {
  engine.prepare()?;
  let (output, elapsed) = timed(engine.name(), || engine.run(query))?;
  tracing::info!(engine = engine.name(), elapsed = elapsed.as_secs_f64(), "query finished");
  Ok(RunReport {
    engine: engine.name(),
    elapsed,
    output,
  })
}
