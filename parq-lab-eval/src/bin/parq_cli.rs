use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use parq_lab_arrow::{
  display::{print_records, Output},
  inspect::ParquetInfo,
  logging::init_tracing,
  memory::{compact_types, compare_representations, CATEGORY_THRESHOLD},
  profile::Profile,
  read::read_parquet,
  write::{csv_to_parquet, default_cache_root, write_parquet, ParquetCompression},
  Table,
};
use parq_lab_core::{head_row_groups, query::GroupQuery, HEAD_ROW_GROUPS};
use parq_lab_eval::{
  clickhouse::{check_executable, ClickhouseClient, CLICKHOUSE_CLIENT},
  engine::{build_engine, run_engine, EngineKind, EngineSettings},
  timing::Timer,
  util::{gen_flights, gen_fruit_frame},
  walkthrough::print_compute_examples,
};

/// Inspect Parquet files and time the same group-by across engines.
#[derive(Parser, Debug)]
#[clap(name = "parq-cli", author, version, about, long_about = None)]
struct Cli {
  #[clap(subcommand)]
  command: Command,
}

#[derive(Args, Debug)]
struct ClickhouseArgs {
  #[clap(long, env = "CH_HOST", default_value = "127.0.0.1")]
  ch_host: String,
  #[clap(long, env = "CH_USER", default_value = "default")]
  ch_user: String,
  #[clap(long, env = "CH_PASSWORD", hide_env_values = true)]
  ch_password: Option<String>,
}

impl ClickhouseArgs {
  fn client(&self) -> ClickhouseClient {
    ClickhouseClient::new(&self.ch_host, &self.ch_user, self.ch_password.clone())
  }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QueryPreset {
  /// Rows and distinct carriers per year
  YearCarrier,
  /// Mean departure delay of busy airports per month
  OriginDelay,
}

impl QueryPreset {
  fn query(self) -> GroupQuery {
    match self {
      QueryPreset::YearCarrier => GroupQuery::year_carrier(),
      QueryPreset::OriginDelay => GroupQuery::origin_delay(),
    }
  }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Dataset {
  Flights,
  Fruit,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// File metadata from the footer
  Metadata { parquet_file: PathBuf },
  /// Parquet schema
  Schema { parquet_file: PathBuf },
  /// Column names, one per line
  ColumnNames { parquet_file: PathBuf },
  /// Path, levels and physical type of every column
  ColumnInfo { parquet_file: PathBuf },
  /// Number of row groups carrying statistics, per column
  ColumnStatsSet {
    parquet_file: PathBuf,
    /// Inspect every row group instead of the first few
    #[clap(long)]
    all: bool,
  },
  /// Row-group statistics of a single column
  ColumnStats {
    parquet_file: PathBuf,
    column: String,
    /// Inspect every row group instead of the first few
    #[clap(long)]
    all: bool,
  },
  /// Columns as ClickHouse types, `name Type, ...`
  ClickhouseTypes { parquet_file: PathBuf },
  /// ClickHouse CREATE TABLE statement for the file's schema
  ClickhouseDdl {
    parquet_file: PathBuf,
    #[clap(long)]
    table: String,
    #[clap(long = "sorting-key")]
    sorting_keys: Vec<String>,
  },
  /// Shape, types, nulls, cardinality and memory of every column
  Profile { parquet_file: PathBuf },
  /// Memory taken by the same values in different Arrow representations
  MemoryCompare {
    #[clap(long, default_value_t = 1_000_000)]
    rows: usize,
  },
  /// Narrow integer columns and dictionary-encode low-cardinality strings
  CompactTypes {
    parquet_file: PathBuf,
    #[clap(long, default_value_t = CATEGORY_THRESHOLD)]
    threshold: usize,
    /// Write the compacted table here
    #[clap(long, short)]
    output: Option<PathBuf>,
  },
  /// Convert a CSV file to Parquet
  CsvToParquet {
    input: PathBuf,
    #[clap(long, short)]
    output: PathBuf,
    /// Column names for a CSV file without a header line
    #[clap(long, value_delimiter = ',')]
    names: Option<Vec<String>>,
    #[clap(long, value_enum, default_value_t = ParquetCompression::Snappy)]
    compression: ParquetCompression,
  },
  /// Write a seeded synthetic dataset to Parquet
  Generate {
    output: PathBuf,
    #[clap(long, value_enum, default_value_t = Dataset::Flights)]
    dataset: Dataset,
    #[clap(long, default_value_t = 1_000_000)]
    rows: usize,
    #[clap(long, default_value_t = 0)]
    seed: u64,
    #[clap(long, value_enum, default_value_t = ParquetCompression::Snappy)]
    compression: ParquetCompression,
  },
  /// Time a group-by over a Parquet file with one engine
  Bench {
    #[clap(value_enum)]
    engine: EngineKind,
    parquet_file: PathBuf,
    #[clap(long, value_enum, default_value_t = QueryPreset::YearCarrier)]
    query: QueryPreset,
    #[clap(long = "partition-col", default_value = "Year")]
    partition_cols: Vec<String>,
    /// Where partitioned and IPC copies are cached [default: ~/.parq-cli]
    #[clap(long, env = "PARQ_CLI_HOME")]
    cache_dir: Option<PathBuf>,
    /// Table queried by the clickhouse-server engine
    #[clap(long, default_value = "datasets.ontime")]
    table: String,
    #[clap(flatten)]
    clickhouse: ClickhouseArgs,
  },
  /// Arrow compute kernels on a small example table
  ComputeExample,
  /// Load Parquet files into a ClickHouse table through clickhouse-client
  ChLoad {
    table: String,
    #[clap(required = true)]
    parquet_files: Vec<PathBuf>,
    /// Create the table from the first file's schema before loading
    #[clap(long)]
    create: bool,
    #[clap(long = "sorting-key")]
    sorting_keys: Vec<String>,
    #[clap(flatten)]
    clickhouse: ClickhouseArgs,
  },
}

fn print_lines<T: std::fmt::Display>(lines: &[T]) {
  for line in lines {
    println!("{line}");
  }
}

fn compact(parquet_file: &Path, threshold: usize, output: Option<&Path>) -> Result<()> {
  let table = read_parquet(parquet_file, None)?;
  let report = compact_types(&table.concat()?, threshold)?;
  println!("{report}");
  if let Some(output) = output {
    write_parquet(output, &Table::from_batch(report.batch), ParquetCompression::Snappy)?;
  }
  Ok(())
}

fn load(
  table: &str,
  parquet_files: &[PathBuf],
  create: bool,
  sorting_keys: &[String],
  clickhouse: &ClickhouseArgs,
) -> Result<()> {
  let (program, version) = check_executable(CLICKHOUSE_CLIENT)?;
  println!("Found {version}");
  let client = clickhouse.client().with_program(program);
  if create {
    let first = parquet_files.first().context("No Parquet files given")?;
    let sql = ParquetInfo::open(first)?.create_table_sql(table, sorting_keys)?;
    println!("{sql}");
    client.query(&sql)?;
  }
  let timer = Timer::start();
  client.load_parquet_files(table, parquet_files)?;
  timer.stop();
  Ok(())
}

fn run(cli: Cli) -> Result<()> {
  match cli.command {
    Command::Metadata { parquet_file } => {
      println!("{}", ParquetInfo::open(&parquet_file)?.summary()?);
    }
    Command::Schema { parquet_file } => {
      print!("{}", ParquetInfo::open(&parquet_file)?.schema_text());
    }
    Command::ColumnNames { parquet_file } => {
      print_lines(&ParquetInfo::open(&parquet_file)?.column_names());
    }
    Command::ColumnInfo { parquet_file } => {
      print_records(&ParquetInfo::open(&parquet_file)?.column_info())?;
    }
    Command::ColumnStatsSet { parquet_file, all } => {
      print_lines(&ParquetInfo::open(&parquet_file)?.stats_set_counts(all));
    }
    Command::ColumnStats {
      parquet_file,
      column,
      all,
    } => {
      let info = ParquetInfo::open(&parquet_file)?;
      let inspected = head_row_groups(info.num_row_groups(), HEAD_ROW_GROUPS, all);
      tracing::debug!(inspected, total = info.num_row_groups(), "row groups");
      print_records(&info.column_stats(&column, all)?)?;
    }
    Command::ClickhouseTypes { parquet_file } => {
      println!("{}", ParquetInfo::open(&parquet_file)?.clickhouse_types()?);
    }
    Command::ClickhouseDdl {
      parquet_file,
      table,
      sorting_keys,
    } => {
      println!("{}", ParquetInfo::open(&parquet_file)?.create_table_sql(&table, &sorting_keys)?);
    }
    Command::Profile { parquet_file } => {
      let profile = Profile::of(&read_parquet(&parquet_file, None)?)?;
      println!("{profile}\n");
      print_records(&profile.columns)?;
    }
    Command::MemoryCompare { rows } => {
      print_records(&compare_representations(rows)?)?;
    }
    Command::CompactTypes {
      parquet_file,
      threshold,
      output,
    } => compact(&parquet_file, threshold, output.as_deref())?,
    Command::CsvToParquet {
      input,
      output,
      names,
      compression,
    } => {
      let table = csv_to_parquet(&input, names.as_deref(), &output, compression)?;
      println!("{} rows, {} columns", table.num_rows(), table.num_columns());
    }
    Command::Generate {
      output,
      dataset,
      rows,
      seed,
      compression,
    } => {
      let batch = match dataset {
        Dataset::Flights => gen_flights(rows, seed)?,
        Dataset::Fruit => gen_fruit_frame(rows, seed)?,
      };
      write_parquet(&output, &Table::from_batch(batch), compression)?;
    }
    Command::Bench {
      engine,
      parquet_file,
      query,
      partition_cols,
      cache_dir,
      table,
      clickhouse,
    } => {
      let cache_root = match cache_dir {
        Some(dir) => dir,
        None => default_cache_root()?,
      };
      // The server engine reads its own table, every other engine reads the file
      if engine != EngineKind::ClickhouseServer {
        parq_lab_arrow::inspect::check_file_exists(&parquet_file)?;
      }
      let settings = EngineSettings {
        cache_root,
        partition_cols,
        client: clickhouse.client(),
        server_table: table,
      };
      let mut engine = build_engine(engine, &parquet_file, &settings)?;
      let report = run_engine(engine.as_mut(), &query.query())?;
      report.print()?;
    }
    Command::ComputeExample => print_compute_examples()?,
    Command::ChLoad {
      table,
      parquet_files,
      create,
      sorting_keys,
      clickhouse,
    } => load(&table, &parquet_files, create, &sorting_keys, &clickhouse)?,
  }
  Ok(())
}

fn main() -> ExitCode {
  init_tracing();
  let cli = Cli::parse();
  tracing::debug!(output = ?Output::detect(), "starting");
  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("{err:#}");
      ExitCode::FAILURE
    }
  }
}
