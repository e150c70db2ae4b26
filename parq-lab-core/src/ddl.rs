//! ClickHouse `CREATE TABLE` statements for tabular data whose column types are already known.

use crate::{
  error::{Error, Result},
  similarity::best_match,
  types::ClickhouseType,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
  pub name: String,
  pub ty: ClickhouseType,
  /// Whether the source data may hold nulls. Ignored for sorting keys, which MergeTree requires
  /// to be non-nullable.
  pub nullable: bool,
}

impl ColumnDef {
  pub fn new(name: impl Into<String>, ty: ClickhouseType, nullable: bool) -> Self {
    ColumnDef {
      name: name.into(),
      ty,
      nullable,
    }
  }
}

/// Fail with a "Did you mean" hint when `sorting_key` is not one of `columns`.
pub fn check_sorting_key<'a, I>(sorting_key: &str, columns: I) -> Result<()>
where
  I: IntoIterator<Item = &'a str> + Clone,
{
  if columns.clone().into_iter().any(|column| column == sorting_key) {
    return Ok(());
  }
  Err(Error::InvalidSortingKey {
    key: sorting_key.to_string(),
    hint: best_match(sorting_key, columns),
  })
}

#[derive(Debug, Clone)]
pub struct CreateTable {
  pub name: String,
  pub columns: Vec<ColumnDef>,
  pub sorting_keys: Vec<String>,
}

impl CreateTable {
  pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
    CreateTable {
      name: name.into(),
      columns,
      sorting_keys: Vec::new(),
    }
  }

  pub fn with_sorting_keys<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
    self.sorting_keys = keys.into_iter().map(Into::into).collect();
    self
  }

  fn is_sorting_key(&self, column: &str) -> bool {
    self.sorting_keys.iter().any(|key| key == column)
  }

  /// Render the statement. Every sorting key must name a column.
  pub fn to_sql(&self) -> Result<String> {
    if self.columns.is_empty() {
      return Err(Error::EmptyTable(self.name.clone()));
    }
    for key in &self.sorting_keys {
      check_sorting_key(key, self.columns.iter().map(|c| c.name.as_str()))?;
    }

    let field_lines: Vec<String> = self
      .columns
      .iter()
      .map(|column| {
        let nullable = column.nullable && !self.is_sorting_key(&column.name);
        format!("\t{} {}", column.name, column.ty.nullable(nullable))
      })
      .collect();

    let order_by = match self.sorting_keys.as_slice() {
      [] => "tuple()".to_string(),
      [key] => key.clone(),
      keys => format!("({})", keys.join(", ")),
    };

    Ok(format!(
      "create table {} (\n{}\n)\nEngine = MergeTree\nOrder by {}",
      self.name,
      field_lines.join(",\n"),
      order_by
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn flight_columns() -> Vec<ColumnDef> {
    vec![
      ColumnDef::new("Year", ClickhouseType::Int16, true),
      ColumnDef::new("Carrier", ClickhouseType::String, true),
      ColumnDef::new("DepDelay", ClickhouseType::Float64, true),
    ]
  }

  #[test]
  fn test_create_table_single_key() {
    let sql = CreateTable::new("flight", flight_columns())
      .with_sorting_keys(["Year"])
      .to_sql()
      .unwrap();
    let expected = "create table flight (\n\
      \tYear Int16,\n\
      \tCarrier Nullable(String),\n\
      \tDepDelay Nullable(Float64)\n\
      )\nEngine = MergeTree\nOrder by Year";
    assert_eq!(expected, sql);
  }

  #[test]
  fn test_key_is_not_substring_matched() {
    // "Year" contains "ear", which must not make an "ear" column non-nullable
    let columns = vec![
      ColumnDef::new("ear", ClickhouseType::Int8, true),
      ColumnDef::new("Year", ClickhouseType::Int16, true),
    ];
    let sql = CreateTable::new("t", columns)
      .with_sorting_keys(["Year"])
      .to_sql()
      .unwrap();
    assert!(sql.contains("\tear Nullable(Int8)"));
    assert!(sql.contains("\tYear Int16"));
  }

  #[test]
  fn test_create_table_multiple_keys() {
    let sql = CreateTable::new("flight", flight_columns())
      .with_sorting_keys(["Year", "Carrier"])
      .to_sql()
      .unwrap();
    assert!(sql.ends_with("Order by (Year, Carrier)"));
    assert!(sql.contains("\tCarrier String,"));
  }

  #[test]
  fn test_create_table_without_keys() {
    let sql = CreateTable::new("flight", flight_columns()).to_sql().unwrap();
    assert!(sql.ends_with("Order by tuple()"));
  }

  #[test]
  fn test_invalid_sorting_key_hint() {
    let err = CreateTable::new("flight", flight_columns())
      .with_sorting_keys(["year"])
      .to_sql()
      .unwrap_err();
    assert_eq!(
      "Sorting key \"year\" not a table column.\nDid you mean \"Year\"?",
      err.to_string()
    );
  }

  #[test]
  fn test_invalid_sorting_key_without_hint() {
    let err = check_sorting_key("Origin", ["Year", "Carrier"]).unwrap_err();
    assert_eq!("Sorting key \"Origin\" not a table column.", err.to_string());
  }

  #[test]
  fn test_empty_table() {
    let err = CreateTable::new("empty", vec![]).to_sql().unwrap_err();
    assert_eq!(Error::EmptyTable("empty".into()), err);
  }
}
