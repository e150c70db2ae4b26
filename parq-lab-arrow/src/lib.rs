//! This crate is the integration point between parq-lab and Apache Arrow / Parquet. It has
//! responsibilities for:
//! 1. Inspecting Parquet footers: file metadata, schema, per-row-group column statistics and the
//!    ClickHouse types derived from them
//! 2. Reading and writing the layouts the benchmarks compare
//!     2.1 A single Parquet file, whole or projected
//!     2.2 A hive-partitioned directory of Parquet files
//!     2.3 An LZ4-compressed Arrow IPC file
//! 3. Executing the shared group-by query model over record batches
//! 4. Profiling tables and comparing the memory taken by different Arrow representations
//! 5. Printing results in a form that suits both terminals and redirected output

pub mod aggregate;
pub mod display;
pub mod inspect;
pub mod logging;
pub mod memory;
pub mod profile;
pub mod read;
pub mod table;
pub mod write;

pub use table::Table;
