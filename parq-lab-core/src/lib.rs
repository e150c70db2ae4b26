//! This crate provides the engine-independent pieces of parq-lab:
//! - type-name mappings between Parquet, ClickHouse and dataframe dtypes
//! - ClickHouse DDL generation with "Did you mean" hints for mistyped keys
//! - the group-by query model shared by the Arrow executor and the SQL engines
//! - text formatting for terminal and redirected output

pub mod ddl;
pub mod error;
pub mod format;
pub mod query;
pub mod similarity;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
use traits::Numeric;

/// Number of row groups inspected by the statistics commands unless asked for all of them.
pub const HEAD_ROW_GROUPS: usize = 5;

/// Returns the smaller number of row groups unless `all` is set.
pub fn head_row_groups(all_row_groups: usize, head_row_groups: usize, all: bool) -> usize {
  if all {
    return all_row_groups;
  }
  all_row_groups.min(head_row_groups)
}

/// Largest absolute distance between a value and its nearest integer. Zero means a float column
/// only holds whole numbers and can be stored as an integer.
pub fn fraction_part_abs_max<T: Numeric>(values: &[T]) -> f64 {
  if T::is_integral() {
    return 0.0;
  }
  values
    .iter()
    .map(|value| {
      let value = value.to_f64();
      (value - value.round()).abs()
    })
    .filter(|fraction| !fraction.is_nan())
    .fold(0.0, f64::max)
}

/// Minimum and maximum of the present values, `None` when every value is missing.
pub fn min_max<T: Numeric>(values: impl IntoIterator<Item = Option<T>>) -> Option<(T, T)> {
  values.into_iter().flatten().fold(None, |acc, value| match acc {
    None => Some((value, value)),
    Some((lo, hi)) => Some((
      if value < lo { value } else { lo },
      if value > hi { value } else { hi },
    )),
  })
}
