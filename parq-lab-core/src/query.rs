//! The group-by queries every engine is timed on, described once so that the Arrow executor and
//! the SQL engines answer exactly the same question.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
  /// `count(*)`
  Count,
  /// `count(distinct col)`, nulls excluded
  CountDistinct(String),
  /// `avg(col)`, nulls excluded
  Mean(String),
}

impl Aggregate {
  pub fn alias(&self) -> String {
    match self {
      Aggregate::Count => "ct".to_string(),
      Aggregate::CountDistinct(column) => format!("{}_uniq_ct", column.to_lowercase()),
      Aggregate::Mean(column) => format!("{}_mean", column.to_lowercase()),
    }
  }

  pub fn column(&self) -> Option<&str> {
    match self {
      Aggregate::Count => None,
      Aggregate::CountDistinct(column) | Aggregate::Mean(column) => Some(column),
    }
  }

  fn to_sql(&self) -> String {
    let expr = match self {
      Aggregate::Count => "count(*)".to_string(),
      Aggregate::CountDistinct(column) => format!("count(distinct {column})"),
      Aggregate::Mean(column) => format!("avg({column})"),
    };
    format!("{expr} {}", self.alias())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
  pub keys: Vec<String>,
  pub aggregates: Vec<Aggregate>,
  /// Keep only groups with strictly more rows than this (`having count(*) > n`).
  pub min_count: Option<u64>,
}

impl GroupQuery {
  pub fn new<S: Into<String>>(
    keys: impl IntoIterator<Item = S>,
    aggregates: Vec<Aggregate>,
  ) -> Result<Self> {
    let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
    if keys.is_empty() {
      return Err(Error::EmptyGroupKeys);
    }
    Ok(GroupQuery {
      keys,
      aggregates,
      min_count: None,
    })
  }

  pub fn having_count_above(mut self, min_count: u64) -> Self {
    self.min_count = Some(min_count);
    self
  }

  /// Year, row count and distinct carriers: the query timed across every engine.
  pub fn year_carrier() -> Self {
    GroupQuery {
      keys: vec!["Year".to_string()],
      aggregates: vec![
        Aggregate::Count,
        Aggregate::CountDistinct("Carrier".to_string()),
      ],
      min_count: None,
    }
  }

  /// Average departure delay of busy airports, per month.
  pub fn origin_delay() -> Self {
    GroupQuery {
      keys: vec![
        "Origin".to_string(),
        "Year".to_string(),
        "Month".to_string(),
      ],
      aggregates: vec![Aggregate::Mean("DepDelay".to_string()), Aggregate::Count],
      min_count: Some(35_000),
    }
  }

  /// Every column the query reads, keys first, without duplicates.
  pub fn columns(&self) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    let referenced = self
      .keys
      .iter()
      .map(String::as_str)
      .chain(self.aggregates.iter().filter_map(Aggregate::column));
    for column in referenced {
      if !columns.contains(&column) {
        columns.push(column);
      }
    }
    columns
  }

  /// Render as SQL over `source`, which is spliced verbatim, e.g. `parquet_scan('f.parquet')`.
  pub fn to_sql(&self, source: &str) -> String {
    let keys = self.keys.join(", ");
    let select: Vec<String> = std::iter::once(keys.clone())
      .chain(self.aggregates.iter().map(Aggregate::to_sql))
      .collect();
    let mut sql = format!(
      "select {} from {} group by {}",
      select.join(", "),
      source,
      keys
    );
    if let Some(min_count) = self.min_count {
      sql.push_str(&format!(" having count(*) > {min_count}"));
    }
    sql.push_str(&format!(" order by {keys}"));
    sql
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_year_carrier_sql() {
    let sql = GroupQuery::year_carrier().to_sql("parquet_scan('ontime.parquet')");
    assert_eq!(
      "select Year, count(*) ct, count(distinct Carrier) carrier_uniq_ct \
       from parquet_scan('ontime.parquet') group by Year order by Year",
      sql
    );
  }

  #[test]
  fn test_origin_delay_sql_has_having() {
    let sql = GroupQuery::origin_delay().to_sql("flight");
    assert!(sql.contains("avg(DepDelay) depdelay_mean"));
    assert!(sql.contains("group by Origin, Year, Month having count(*) > 35000"));
  }

  #[test]
  fn test_columns_deduplicated() {
    let query = GroupQuery::new(
      ["Year"],
      vec![
        Aggregate::Count,
        Aggregate::CountDistinct("Year".into()),
        Aggregate::Mean("DepDelay".into()),
      ],
    )
    .unwrap();
    assert_eq!(vec!["Year", "DepDelay"], query.columns());
  }

  #[test]
  fn test_requires_keys() {
    let keys: [&str; 0] = [];
    assert_eq!(
      Error::EmptyGroupKeys,
      GroupQuery::new(keys, vec![Aggregate::Count]).unwrap_err()
    );
  }

  #[test]
  fn test_having_count_above() {
    let query = GroupQuery::year_carrier().having_count_above(10);
    assert_eq!(Some(10), query.min_count);
  }
}
