//! Type-name mappings between Parquet, ClickHouse and dataframe dtypes.
//!
//! Only names are mapped here. Reading types out of real files happens in `parq-lab-arrow`.

use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClickhouseType {
  Boolean,
  Date,
  DateTime,
  Float32,
  Float64,
  UInt8,
  UInt16,
  UInt32,
  UInt64,
  Int8,
  Int16,
  Int32,
  Int64,
  String,
}

impl ClickhouseType {
  pub const ALL: [ClickhouseType; 14] = [
    ClickhouseType::Boolean,
    ClickhouseType::Date,
    ClickhouseType::DateTime,
    ClickhouseType::Float32,
    ClickhouseType::Float64,
    ClickhouseType::UInt8,
    ClickhouseType::UInt16,
    ClickhouseType::UInt32,
    ClickhouseType::UInt64,
    ClickhouseType::Int8,
    ClickhouseType::Int16,
    ClickhouseType::Int32,
    ClickhouseType::Int64,
    ClickhouseType::String,
  ];

  pub fn name(self) -> &'static str {
    match self {
      ClickhouseType::Boolean => "Boolean",
      ClickhouseType::Date => "Date",
      ClickhouseType::DateTime => "DateTime",
      ClickhouseType::Float32 => "Float32",
      ClickhouseType::Float64 => "Float64",
      ClickhouseType::UInt8 => "UInt8",
      ClickhouseType::UInt16 => "UInt16",
      ClickhouseType::UInt32 => "UInt32",
      ClickhouseType::UInt64 => "UInt64",
      ClickhouseType::Int8 => "Int8",
      ClickhouseType::Int16 => "Int16",
      ClickhouseType::Int32 => "Int32",
      ClickhouseType::Int64 => "Int64",
      ClickhouseType::String => "String",
    }
  }

  /// Inclusive value range of the integer types, `None` for everything else.
  pub fn range(self) -> Option<(i128, i128)> {
    let range = match self {
      ClickhouseType::Int8 => (i8::MIN as i128, i8::MAX as i128),
      ClickhouseType::Int16 => (i16::MIN as i128, i16::MAX as i128),
      ClickhouseType::Int32 => (i32::MIN as i128, i32::MAX as i128),
      ClickhouseType::Int64 => (i64::MIN as i128, i64::MAX as i128),
      ClickhouseType::UInt8 => (0, u8::MAX as i128),
      ClickhouseType::UInt16 => (0, u16::MAX as i128),
      ClickhouseType::UInt32 => (0, u32::MAX as i128),
      ClickhouseType::UInt64 => (0, u64::MAX as i128),
      _ => return None,
    };
    Some(range)
  }

  pub fn is_integer(self) -> bool {
    self.range().is_some()
  }

  /// Wrap the type name in `Nullable(..)` when the column admits nulls.
  pub fn nullable(self, nullable: bool) -> String {
    nullable_type(self, nullable)
  }
}

impl fmt::Display for ClickhouseType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for ClickhouseType {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    ClickhouseType::ALL
      .into_iter()
      .find(|ty| ty.name() == s)
      .ok_or_else(|| Error::UnknownClickhouseType(s.to_string()))
  }
}

pub fn nullable_type(field_type: ClickhouseType, nullable: bool) -> String {
  if nullable {
    format!("Nullable({field_type})")
  } else {
    field_type.to_string()
  }
}

/// Parquet type names paired with their ClickHouse type. The integer names with a width are the
/// logical annotations Parquet writers attach to INT32/INT64 columns.
const PARQUET_CLICKHOUSE_TYPES: [(&str, ClickhouseType); 12] = [
  ("UINT8", ClickhouseType::UInt8),
  ("INT8", ClickhouseType::Int8),
  ("UINT16", ClickhouseType::UInt16),
  ("INT16", ClickhouseType::Int16),
  ("UINT32", ClickhouseType::UInt32),
  ("INT32", ClickhouseType::Int32),
  ("UINT64", ClickhouseType::UInt64),
  ("INT64", ClickhouseType::Int64),
  ("FLOAT", ClickhouseType::Float32),
  ("DOUBLE", ClickhouseType::Float64),
  ("BYTE_ARRAY", ClickhouseType::String),
  ("BOOLEAN", ClickhouseType::Boolean),
];

pub fn parquet_to_clickhouse(parquet_type: &str) -> Result<ClickhouseType> {
  PARQUET_CLICKHOUSE_TYPES
    .iter()
    .find(|(name, _)| *name == parquet_type)
    .map(|(_, ty)| *ty)
    .ok_or_else(|| Error::UnmappedParquetType(parquet_type.to_string()))
}

pub fn clickhouse_to_parquet(clickhouse_type: ClickhouseType) -> Option<&'static str> {
  PARQUET_CLICKHOUSE_TYPES
    .iter()
    .find(|(_, ty)| *ty == clickhouse_type)
    .map(|(name, _)| *name)
}

/// Dataframe (numpy) dtype names and the ClickHouse type storing them without loss.
const DTYPE_CLICKHOUSE_TYPES: [(&str, ClickhouseType); 12] = [
  ("bool", ClickhouseType::Boolean),
  ("int8", ClickhouseType::Int8),
  ("int16", ClickhouseType::Int16),
  ("int32", ClickhouseType::Int32),
  ("int64", ClickhouseType::Int64),
  ("uint8", ClickhouseType::UInt8),
  ("uint16", ClickhouseType::UInt16),
  ("uint32", ClickhouseType::UInt32),
  ("uint64", ClickhouseType::UInt64),
  ("float32", ClickhouseType::Float32),
  ("float64", ClickhouseType::Float64),
  ("object", ClickhouseType::String),
];

pub fn dtype_to_clickhouse(dtype: &str) -> Result<ClickhouseType> {
  DTYPE_CLICKHOUSE_TYPES
    .iter()
    .find(|(name, _)| *name == dtype)
    .map(|(_, ty)| *ty)
    .ok_or_else(|| Error::UnmappedDtype(dtype.to_string()))
}

/// The narrowest integer type holding every value in `[min, max]`.
/// Signed types are preferred at equal width so that later negative values still fit.
pub fn smallest_integer_type(min: i128, max: i128) -> Option<ClickhouseType> {
  const CANDIDATES: [ClickhouseType; 8] = [
    ClickhouseType::Int8,
    ClickhouseType::UInt8,
    ClickhouseType::Int16,
    ClickhouseType::UInt16,
    ClickhouseType::Int32,
    ClickhouseType::UInt32,
    ClickhouseType::Int64,
    ClickhouseType::UInt64,
  ];
  CANDIDATES.into_iter().find(|ty| match ty.range() {
    Some((lo, hi)) => lo <= min && max <= hi,
    None => false,
  })
}

#[cfg(test)]
mod tests {
  use rstest::rstest;

  use super::*;

  #[rstest]
  #[case("INT32", ClickhouseType::Int32)]
  #[case("UINT8", ClickhouseType::UInt8)]
  #[case("FLOAT", ClickhouseType::Float32)]
  #[case("DOUBLE", ClickhouseType::Float64)]
  #[case("BYTE_ARRAY", ClickhouseType::String)]
  fn test_parquet_to_clickhouse(#[case] parquet: &str, #[case] expected: ClickhouseType) {
    assert_eq!(expected, parquet_to_clickhouse(parquet).unwrap());
    assert_eq!(Some(parquet), clickhouse_to_parquet(expected));
  }

  #[test]
  fn test_unmapped_parquet_type() {
    let err = parquet_to_clickhouse("INT96").unwrap_err();
    assert_eq!(Error::UnmappedParquetType("INT96".into()), err);
    assert_eq!(None, clickhouse_to_parquet(ClickhouseType::DateTime));
  }

  #[test]
  fn test_name_round_trip_all_types() {
    for ty in ClickhouseType::ALL {
      assert_eq!(ty, ty.name().parse().unwrap());
    }
    assert!("Int128".parse::<ClickhouseType>().is_err());
  }

  #[test]
  fn test_ranges() {
    assert_eq!(Some((-128, 127)), ClickhouseType::Int8.range());
    assert_eq!(Some((0, 18446744073709551615)), ClickhouseType::UInt64.range());
    assert_eq!(None, ClickhouseType::String.range());
    assert!(!ClickhouseType::Float64.is_integer());
  }

  #[test]
  fn test_nullable_type() {
    assert_eq!("Nullable(Int16)", nullable_type(ClickhouseType::Int16, true));
    assert_eq!("String", ClickhouseType::String.nullable(false));
  }

  #[rstest]
  #[case("float64", ClickhouseType::Float64)]
  #[case("int64", ClickhouseType::Int64)]
  #[case("object", ClickhouseType::String)]
  fn test_dtype_to_clickhouse(#[case] dtype: &str, #[case] expected: ClickhouseType) {
    assert_eq!(expected, dtype_to_clickhouse(dtype).unwrap());
  }

  #[rstest]
  #[case(0, 100, ClickhouseType::Int8)]
  #[case(0, 200, ClickhouseType::UInt8)]
  #[case(-1, 200, ClickhouseType::Int16)]
  #[case(1987, 2008, ClickhouseType::Int16)]
  #[case(0, 40_000, ClickhouseType::UInt16)]
  #[case(-70_000, 0, ClickhouseType::Int32)]
  #[case(0, u64::MAX as i128, ClickhouseType::UInt64)]
  fn test_smallest_integer_type(
    #[case] min: i128,
    #[case] max: i128,
    #[case] expected: ClickhouseType,
  ) {
    assert_eq!(Some(expected), smallest_integer_type(min, max));
  }

  #[test]
  fn test_smallest_integer_type_out_of_range() {
    assert_eq!(None, smallest_integer_type(-1, u64::MAX as i128));
  }
}
