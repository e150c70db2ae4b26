use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use parq_lab_arrow::{
  logging::init_tracing,
  write::{csv_to_parquet, ParquetCompression},
};

/// Reads a CSV file and writes its rows to a new Parquet file.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
  /// Sets the input CSV file to use
  input: PathBuf,
  #[clap(long, short, help = "Output parquet file path")]
  output: PathBuf,
  #[clap(
    long,
    value_delimiter = ',',
    help = "Column names for a CSV file without a header line"
  )]
  names: Option<Vec<String>>,
  #[clap(long, value_enum, default_value_t = ParquetCompression::Snappy)]
  compression: ParquetCompression,
}

fn main() -> Result<()> {
  init_tracing();
  let args = Args::parse();

  let table = csv_to_parquet(&args.input, args.names.as_deref(), &args.output, args.compression)?;
  println!("{} rows, {} columns", table.num_rows(), table.num_columns());
  Ok(())
}
