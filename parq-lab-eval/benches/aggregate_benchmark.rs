//! In-memory group-by over synthetic flights, isolating the aggregation from file IO.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use parq_lab_arrow::aggregate::aggregate_batches;
use parq_lab_core::query::GroupQuery;
use parq_lab_eval::util::gen_flights;

fn bench_aggregate(criterion: &mut Criterion) {
  let mut group = criterion.benchmark_group("Group-by in memory");
  for rows in [100_000, 1_000_000] {
    let batch = gen_flights(rows, 0).unwrap();
    let schema = batch.schema();

    group.bench_with_input(BenchmarkId::new("year carrier", rows), &batch, |b, batch| {
      let query = GroupQuery::year_carrier();
      b.iter(|| aggregate_batches(&query, schema.clone(), [batch]).unwrap())
    });

    // No HAVING so the result size does not depend on the row count
    let mut query = GroupQuery::origin_delay();
    query.min_count = None;
    group.bench_with_input(BenchmarkId::new("origin delay", rows), &batch, |b, batch| {
      b.iter(|| aggregate_batches(&query, schema.clone(), [batch]).unwrap())
    });
  }
  group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
