//! Printing tables to stdout. A terminal gets the compact, aligned rendering; redirected output
//! gets every row, left-justified, with trailing whitespace removed.

use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use arrow::{
  array::RecordBatch,
  util::{
    display::{ArrayFormatter, FormatOptions},
    pretty::pretty_format_batches,
  },
};
use parq_lab_core::format::{render_left_justified, render_table, Justify};

/// Plain records that print as a table, one record per row.
pub trait TableRows {
  fn headers() -> Vec<&'static str>;
  fn cells(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
  Terminal,
  Redirected,
}

impl Output {
  pub fn detect() -> Self {
    if io::stdout().is_terminal() {
      Output::Terminal
    } else {
      Output::Redirected
    }
  }
}

pub fn format_records<T: TableRows>(records: &[T], output: Output) -> String {
  let rows: Vec<Vec<String>> = records.iter().map(TableRows::cells).collect();
  let justify = match output {
    Output::Terminal => Justify::Right,
    Output::Redirected => Justify::Left,
  };
  render_table(&T::headers(), &rows, justify)
}

/// Cell text of every row, using the same value formatting as Arrow's pretty printer.
pub fn batch_rows(batches: &[RecordBatch]) -> Result<(Vec<String>, Vec<Vec<String>>)> {
  let options = FormatOptions::default().with_null("null");
  let headers = match batches.first() {
    Some(batch) => batch
      .schema()
      .fields()
      .iter()
      .map(|field| field.name().clone())
      .collect(),
    None => Vec::new(),
  };

  let mut rows = Vec::new();
  for batch in batches {
    let formatters = batch
      .columns()
      .iter()
      .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
      .collect::<std::result::Result<Vec<_>, _>>()?;
    for row_idx in 0..batch.num_rows() {
      rows.push(
        formatters
          .iter()
          .map(|formatter| formatter.value(row_idx).to_string())
          .collect(),
      );
    }
  }
  Ok((headers, rows))
}

pub fn format_batches(batches: &[RecordBatch], output: Output) -> Result<String> {
  match output {
    Output::Terminal => Ok(pretty_format_batches(batches)?.to_string()),
    Output::Redirected => {
      let (headers, rows) = batch_rows(batches)?;
      Ok(render_left_justified(&headers, &rows))
    }
  }
}

pub fn print_records<T: TableRows>(records: &[T]) -> Result<()> {
  let text = format_records(records, Output::detect());
  writeln!(io::stdout().lock(), "{text}")?;
  Ok(())
}

pub fn print_batches(batches: &[RecordBatch]) -> Result<()> {
  let text = format_batches(batches, Output::detect())?;
  writeln!(io::stdout().lock(), "{text}")?;
  Ok(())
}
