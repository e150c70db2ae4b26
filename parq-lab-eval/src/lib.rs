//! This crate implements the evaluation side of parq-lab, including:
//! - the timing harness that runs one group-by through Arrow readers, an async Parquet stream,
//!   DataFusion, ClickHouse, DuckDB and polars
//! - ClickHouse command-line plumbing (queries and bulk Parquet loads)
//! - an Arrow compute walkthrough
//! - seeded synthetic datasets shared by tests and benchmarks

pub mod clickhouse;
#[cfg(feature = "duckdb")]
pub mod duck;
pub mod engine;
#[cfg(feature = "polars")]
pub mod polars_scan;
pub mod timing;
pub mod util;
pub mod walkthrough;
