//! The same group-by through every in-process engine, each reading its own copy of one file.
//! Preparing the partitioned and IPC copies happens once, outside the measured loop.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use parq_lab_arrow::{
  write::{write_parquet, ParquetCompression},
  Table,
};
use parq_lab_core::query::GroupQuery;
use parq_lab_eval::{
  clickhouse::ClickhouseClient,
  engine::{build_engine, stream_aggregate, EngineKind, EngineSettings},
  util::gen_flights,
};
use tempfile::TempDir;

fn bench_engines(criterion: &mut Criterion) {
  const ROWS: usize = 1_000_000;
  let dir = TempDir::new().unwrap();
  let file = dir.path().join("flights.parquet");
  let batch = gen_flights(ROWS, 0).unwrap();
  write_parquet(&file, &Table::from_batch(batch), ParquetCompression::Snappy).unwrap();

  let settings = EngineSettings {
    cache_root: dir.path().join("cache"),
    partition_cols: vec!["Year".to_string()],
    client: ClickhouseClient::new("127.0.0.1", "default", None),
    server_table: "datasets.ontime".to_string(),
  };
  let query = GroupQuery::year_carrier();

  let mut group = criterion.benchmark_group(format!("Benchmark year carrier, rows={}", ROWS));
  for kind in [
    EngineKind::ArrowParquet,
    EngineKind::ArrowProjected,
    EngineKind::ArrowPartitioned,
    EngineKind::ArrowIpc,
    EngineKind::DatafusionParquet,
  ] {
    let mut engine = build_engine(kind, &file, &settings).unwrap();
    engine.prepare().unwrap();
    group.bench_function(BenchmarkId::new(engine.name(), 0), |b| {
      b.iter(|| engine.run(&query).unwrap())
    });
  }

  let runtime = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .unwrap();
  group.bench_function(BenchmarkId::new("async stream", 0), |b| {
    b.iter(|| runtime.block_on(stream_aggregate(&file, &query)).unwrap())
  });
  group.finish();
}

criterion_group!(benches, bench_engines);
criterion_main!(benches);
