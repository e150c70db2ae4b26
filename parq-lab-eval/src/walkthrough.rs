//! A tour of Arrow compute kernels over a six-row table, printed step by step.

use std::{collections::BTreeSet, sync::Arc};

use anyhow::{Context, Result};
use arrow::{
  array::{Array, ArrayRef, AsArray, Int64Array, RecordBatch, StringArray},
  compute::{
    filter, filter_record_batch,
    kernels::{
      cmp::{eq, gt},
      numeric::mul,
    },
    max, min, sum,
  },
  datatypes::Int64Type,
};
use parq_lab_arrow::{
  aggregate::aggregate_batches,
  display::{format_batches, Output},
};
use parq_lab_core::query::{Aggregate, GroupQuery};

pub enum Outcome {
  Value(String),
  Table(RecordBatch),
}

pub struct Example {
  pub title: &'static str,
  pub outcome: Outcome,
}

impl Example {
  fn value(title: &'static str, value: impl ToString) -> Self {
    Example {
      title,
      outcome: Outcome::Value(value.to_string()),
    }
  }

  fn table(title: &'static str, batch: RecordBatch) -> Self {
    Example {
      title,
      outcome: Outcome::Table(batch),
    }
  }

  pub fn render(&self, output: Output) -> Result<String> {
    match &self.outcome {
      Outcome::Value(value) => Ok(format!("{}: {}", self.title, value)),
      Outcome::Table(batch) => Ok(format!(
        "{}:\n{}",
        self.title,
        format_batches(std::slice::from_ref(batch), output)?
      )),
    }
  }
}

/// `name: a a b c c c`, `value: 1 1 1 2 3 3`
pub fn example_table() -> Result<RecordBatch> {
  let batch = RecordBatch::try_from_iter(vec![
    (
      "name",
      Arc::new(StringArray::from(vec!["a", "a", "b", "c", "c", "c"])) as ArrayRef,
    ),
    ("value", Arc::new(Int64Array::from(vec![1, 1, 1, 2, 3, 3])) as ArrayRef),
  ])?;
  Ok(batch)
}

fn list(values: &Int64Array) -> String {
  let items: Vec<String> = values
    .iter()
    .map(|v| v.map_or("null".to_string(), |v| v.to_string()))
    .collect();
  format!("[{}]", items.join(", "))
}

fn group_sum(names: &StringArray, values: &Int64Array) -> Result<RecordBatch> {
  let keys: BTreeSet<&str> = names.iter().flatten().collect();
  let mut sums = Vec::with_capacity(keys.len());
  for key in &keys {
    let mask = eq(names, &StringArray::new_scalar(*key))?;
    let selected = filter(values, &mask)?;
    sums.push(sum(selected.as_primitive::<Int64Type>()));
  }
  let batch = RecordBatch::try_from_iter(vec![
    (
      "name",
      Arc::new(StringArray::from_iter_values(keys.iter().copied())) as ArrayRef,
    ),
    ("value_sum", Arc::new(Int64Array::from(sums)) as ArrayRef),
  ])?;
  Ok(batch)
}

pub fn compute_examples() -> Result<Vec<Example>> {
  let table = example_table()?;
  let names = table
    .column_by_name("name")
    .context("missing name column")?
    .as_string::<i32>()
    .clone();
  let values = table
    .column_by_name("value")
    .context("missing value column")?
    .as_primitive::<Int64Type>()
    .clone();

  let distinct: BTreeSet<&str> = names.iter().flatten().collect();
  let count = values.len() - values.null_count();
  let mean = sum(&values).map(|total| total as f64 / count as f64);
  let format_option = |value: Option<i64>| value.map_or("null".to_string(), |v| v.to_string());

  let name_counts = GroupQuery::new(["name"], vec![Aggregate::Count])?;
  let group_distinct =
    GroupQuery::new(["name"], vec![Aggregate::CountDistinct("value".to_string())])?;

  let doubled = mul(&values, &Int64Array::new_scalar(2))?;
  let squared = mul(&values, &values)?;
  let above_two = gt(&values, &Int64Array::new_scalar(2))?;

  let schema = table.schema();
  Ok(vec![
    Example::table("table data", table.clone()),
    Example::value("count name column", names.len() - names.null_count()),
    Example::value("count name distinct column", distinct.len()),
    Example::value("min value column", format_option(min(&values))),
    Example::value(
      "min, max value column",
      format!("{{min: {}, max: {}}}", format_option(min(&values)), format_option(max(&values))),
    ),
    Example::value(
      "mean value column",
      mean.map_or("null".to_string(), |mean| mean.to_string()),
    ),
    Example::table(
      "name value counts",
      aggregate_batches(&name_counts, schema.clone(), [&table])?,
    ),
    Example::value("multiply value by 2", list(doubled.as_primitive::<Int64Type>())),
    Example::value("multiply value by itself", list(squared.as_primitive::<Int64Type>())),
    Example::table(
      "rows where value is greater than 2",
      filter_record_batch(&table, &above_two)?,
    ),
    Example::table("table sum", group_sum(&names, &values)?),
    Example::table(
      "table count",
      aggregate_batches(&name_counts, schema.clone(), [&table])?,
    ),
    Example::table(
      "table count distinct",
      aggregate_batches(&group_distinct, schema, [&table])?,
    ),
  ])
}

pub fn print_compute_examples() -> Result<()> {
  let output = Output::detect();
  for example in compute_examples()? {
    println!("{}", example.render(output)?);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use arrow::datatypes::Int64Type;

  use super::*;

  fn find<'a>(examples: &'a [Example], title: &str) -> &'a Outcome {
    &examples.iter().find(|e| e.title == title).unwrap().outcome
  }

  fn value(examples: &[Example], title: &str) -> String {
    match find(examples, title) {
      Outcome::Value(value) => value.clone(),
      Outcome::Table(_) => panic!("{title} is a table"),
    }
  }

  fn table<'a>(examples: &'a [Example], title: &str) -> &'a RecordBatch {
    match find(examples, title) {
      Outcome::Table(batch) => batch,
      Outcome::Value(_) => panic!("{title} is a value"),
    }
  }

  #[test]
  fn test_scalar_examples() {
    let examples = compute_examples().unwrap();
    assert_eq!("6", value(&examples, "count name column"));
    assert_eq!("3", value(&examples, "count name distinct column"));
    assert_eq!("1", value(&examples, "min value column"));
    assert_eq!("{min: 1, max: 3}", value(&examples, "min, max value column"));
    assert_eq!("1.8333333333333333", value(&examples, "mean value column"));
    assert_eq!("[2, 2, 2, 4, 6, 6]", value(&examples, "multiply value by 2"));
    assert_eq!("[1, 1, 1, 4, 9, 9]", value(&examples, "multiply value by itself"));
  }

  #[test]
  fn test_table_examples() {
    let examples = compute_examples().unwrap();
    assert_eq!(2, table(&examples, "rows where value is greater than 2").num_rows());

    let sums = table(&examples, "table sum");
    assert_eq!(vec![2, 1, 8], sums.column(1).as_primitive::<Int64Type>().values().to_vec());

    let counts = table(&examples, "name value counts");
    assert_eq!(vec![2, 1, 3], counts.column(1).as_primitive::<Int64Type>().values().to_vec());

    let distinct = table(&examples, "table count distinct");
    assert_eq!(vec![1, 1, 2], distinct.column(1).as_primitive::<Int64Type>().values().to_vec());
  }

  #[test]
  fn test_render_redirected() {
    let examples = compute_examples().unwrap();
    let rendered = examples[0].render(Output::Redirected).unwrap();
    assert!(rendered.starts_with("table data:\nname value\na    1"));
  }
}
