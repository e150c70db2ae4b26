//! Synthetic datasets for the benchmarks, seeded so that every engine sees the same rows.

use std::sync::Arc;

use anyhow::Result;
use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use rand::{rngs::SmallRng, seq::SliceRandom, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub const FRUITS: [&str; 3] = ["apple", "banana", "orange"];
pub const CARRIERS: [&str; 8] = ["AA", "AS", "CO", "DL", "NW", "TW", "UA", "US"];
pub const ORIGINS: [&str; 10] = [
  "ATL", "BOS", "DEN", "DFW", "LAX", "MSP", "ORD", "PHX", "SFO", "STL",
];
pub const FIRST_YEAR: i64 = 1987;
pub const LAST_YEAR: i64 = 2008;

/// Fraction of flights without a departure delay (cancelled flights).
const DEP_DELAY_NULL_FRACTION: f64 = 0.02;

/// `value1`, `value2` uniform in [0, 1) and `name` drawn from [`FRUITS`].
pub fn gen_fruit_frame(rows: usize, seed: u64) -> Result<RecordBatch> {
  let mut rng = SmallRng::seed_from_u64(seed);
  let value1: Vec<f64> = (0..rows).map(|_| rng.gen()).collect();
  let value2: Vec<f64> = (0..rows).map(|_| rng.gen()).collect();
  let name: Vec<&str> = (0..rows)
    .map(|_| *FRUITS.choose(&mut rng).unwrap_or(&FRUITS[0]))
    .collect();
  let batch = RecordBatch::try_from_iter(vec![
    ("value1", Arc::new(Float64Array::from(value1)) as ArrayRef),
    ("value2", Arc::new(Float64Array::from(value2)) as ArrayRef),
    ("name", Arc::new(StringArray::from(name)) as ArrayRef),
  ])?;
  Ok(batch)
}

/// An airline-like frame: `Year`, `Month`, `Carrier`, `Origin` and a nullable `DepDelay` in
/// minutes.
pub fn gen_flights(rows: usize, seed: u64) -> Result<RecordBatch> {
  let mut rng = SmallRng::seed_from_u64(seed);
  let delay = Normal::new(8.0, 30.0)?;

  let mut year = Vec::with_capacity(rows);
  let mut month = Vec::with_capacity(rows);
  let mut carrier = Vec::with_capacity(rows);
  let mut origin = Vec::with_capacity(rows);
  let mut dep_delay = Vec::with_capacity(rows);
  for _ in 0..rows {
    year.push(rng.gen_range(FIRST_YEAR..=LAST_YEAR));
    month.push(rng.gen_range(1..=12_i64));
    carrier.push(CARRIERS[rng.gen_range(0..CARRIERS.len())]);
    origin.push(ORIGINS[rng.gen_range(0..ORIGINS.len())]);
    let cancelled = rng.gen_bool(DEP_DELAY_NULL_FRACTION);
    let minutes: f64 = delay.sample(&mut rng);
    dep_delay.push((!cancelled).then_some(minutes.round()));
  }

  let batch = RecordBatch::try_from_iter(vec![
    ("Year", Arc::new(Int64Array::from(year)) as ArrayRef),
    ("Month", Arc::new(Int64Array::from(month)) as ArrayRef),
    ("Carrier", Arc::new(StringArray::from(carrier)) as ArrayRef),
    ("Origin", Arc::new(StringArray::from(origin)) as ArrayRef),
    ("DepDelay", Arc::new(Float64Array::from(dep_delay)) as ArrayRef),
  ])?;
  Ok(batch)
}
