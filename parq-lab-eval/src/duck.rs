//! An in-memory DuckDB used as a scratch cache for Parquet data and as one of the timed engines.

use std::path::{Path, PathBuf};

use anyhow::Result;
use duckdb::{types::Value, Connection};
use parq_lab_core::query::GroupQuery;
use rand::Rng;

use crate::engine::{Engine, QueryOutput};

fn quote(value: &str) -> String {
  format!("'{}'", value.replace('\'', "''"))
}

/// `parquet_scan('<path>')`
pub fn parquet_scan(path: &Path) -> String {
  format!("parquet_scan({})", quote(&path.display().to_string()))
}

fn render(value: &Value) -> String {
  match value {
    Value::Null => "null".to_string(),
    Value::Boolean(v) => v.to_string(),
    Value::TinyInt(v) => v.to_string(),
    Value::SmallInt(v) => v.to_string(),
    Value::Int(v) => v.to_string(),
    Value::BigInt(v) => v.to_string(),
    Value::HugeInt(v) => v.to_string(),
    Value::UTinyInt(v) => v.to_string(),
    Value::USmallInt(v) => v.to_string(),
    Value::UInt(v) => v.to_string(),
    Value::UBigInt(v) => v.to_string(),
    Value::Float(v) => v.to_string(),
    Value::Double(v) => v.to_string(),
    Value::Text(v) => v.clone(),
    other => format!("{other:?}"),
  }
}

pub struct Duck {
  conn: Connection,
}

impl Duck {
  pub fn in_memory() -> Result<Self> {
    Ok(Duck {
      conn: Connection::open_in_memory()?,
    })
  }

  pub fn connection(&self) -> &Connection {
    &self.conn
  }

  pub fn tables(&self) -> Result<Vec<String>> {
    let mut stmt = self.conn.prepare("PRAGMA show_tables")?;
    let names = stmt
      .query_map([], |row| row.get::<_, String>(0))?
      .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
  }

  /// A `table_NNNNNN` name not used by any existing table.
  pub fn new_table_name(&self) -> Result<String> {
    let tables = self.tables()?;
    let mut rng = rand::thread_rng();
    loop {
      let name = format!("table_{}", rng.gen_range(100_000..1_000_000));
      if !tables.contains(&name) {
        return Ok(name);
      }
    }
  }

  /// Copy a Parquet file into a new table called `name`.
  pub fn save_parquet(&self, path: &Path, name: &str) -> Result<()> {
    let sql = format!("create table {name} as select * from {}", parquet_scan(path));
    self.conn.execute_batch(&sql)?;
    tracing::info!(table = name, file = %path.display(), "saved parquet file to duckdb");
    Ok(())
  }

  /// Run `sql` and render every cell as text.
  pub fn query_rows(&self, sql: &str) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut stmt = self.conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut headers = Vec::new();
    let mut cells = Vec::new();
    while let Some(row) = rows.next()? {
      if headers.is_empty() {
        headers = row.as_ref().column_names();
      }
      let mut values = Vec::with_capacity(headers.len());
      for idx in 0..headers.len() {
        values.push(render(&row.get::<_, Value>(idx)?));
      }
      cells.push(values);
    }
    Ok((headers, cells))
  }

  pub fn table(&self, name: &str) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    self.query_rows(&format!("select * from {name}"))
  }
}

pub struct DuckdbEngine {
  file: PathBuf,
  duck: Duck,
}

impl DuckdbEngine {
  pub fn open(file: PathBuf) -> Result<Self> {
    Ok(DuckdbEngine {
      file,
      duck: Duck::in_memory()?,
    })
  }
}

impl Engine for DuckdbEngine {
  fn name(&self) -> &'static str {
    "duckdb"
  }

  fn run(&self, query: &GroupQuery) -> Result<QueryOutput> {
    let sql = query.to_sql(&parquet_scan(&self.file));
    let (headers, rows) = self.duck.query_rows(&sql)?;
    Ok(QueryOutput::Rows { headers, rows })
  }
}

#[cfg(test)]
mod tests {
  use parq_lab_arrow::{
    write::{write_parquet, ParquetCompression},
    Table,
  };
  use tempfile::TempDir;

  use super::*;
  use crate::util::gen_flights;

  #[test]
  fn test_tables_and_names() {
    let duck = Duck::in_memory().unwrap();
    duck
      .connection()
      .execute_batch(
        "create table table1 (a integer, b integer); insert into table1 values (1, 2), (4, 4);",
      )
      .unwrap();
    assert_eq!(vec!["table1".to_string()], duck.tables().unwrap());
    let name = duck.new_table_name().unwrap();
    assert!(name.starts_with("table_") && name.len() == "table_".len() + 6);

    let (headers, rows) = duck.table("table1").unwrap();
    assert_eq!(vec!["a", "b"], headers);
    assert_eq!(vec![vec!["1", "2"], vec!["4", "4"]], rows);
  }

  #[test]
  fn test_engine_matches_sql_shape() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("flights.parquet");
    let table = Table::from_batch(gen_flights(2000, 5).unwrap());
    write_parquet(&file, &table, ParquetCompression::Snappy).unwrap();

    let duck = Duck::in_memory().unwrap();
    duck.save_parquet(&file, "flight").unwrap();
    let (_, rows) = duck.query_rows("select count(*) from flight").unwrap();
    assert_eq!(vec![vec!["2000"]], rows);

    let engine = DuckdbEngine::open(file).unwrap();
    let output = engine.run(&GroupQuery::year_carrier()).unwrap();
    let QueryOutput::Rows { headers, rows } = output else {
      panic!("expected rows");
    };
    assert_eq!(vec!["Year", "ct", "carrier_uniq_ct"], headers);
    assert_eq!(22, rows.len());
    assert_eq!("1987", rows[0][0]);
  }
}
