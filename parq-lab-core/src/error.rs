use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  #[error("Unknown ClickHouse type {0}")]
  UnknownClickhouseType(String),

  #[error("No ClickHouse type for Parquet type {0}")]
  UnmappedParquetType(String),

  #[error("No ClickHouse type for dtype {0}")]
  UnmappedDtype(String),

  /// The hint is rendered on its own line, e.g. `Did you mean "Year"?`.
  #[error("Sorting key \"{key}\" not a table column.{}", did_you_mean(.hint))]
  InvalidSortingKey { key: String, hint: Option<String> },

  #[error("Table {0} has no columns")]
  EmptyTable(String),

  #[error("Group-by query needs at least one key")]
  EmptyGroupKeys,
}

fn did_you_mean(hint: &Option<String>) -> String {
  match hint {
    Some(hint) => format!("\nDid you mean \"{hint}\"?"),
    None => String::new(),
  }
}
