use arrow::{
  array::RecordBatch,
  compute::concat_batches,
  datatypes::SchemaRef,
};

/// A schema and the batches read under it; the in-memory counterpart of a Parquet file.
#[derive(Debug, Clone)]
pub struct Table {
  pub schema: SchemaRef,
  pub batches: Vec<RecordBatch>,
}

impl Table {
  pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
    Table { schema, batches }
  }

  pub fn from_batch(batch: RecordBatch) -> Self {
    Table {
      schema: batch.schema(),
      batches: vec![batch],
    }
  }

  pub fn num_rows(&self) -> usize {
    self.batches.iter().map(RecordBatch::num_rows).sum()
  }

  pub fn num_columns(&self) -> usize {
    self.schema.fields().len()
  }

  /// Bytes held by the Arrow buffers of every batch.
  pub fn memory_size(&self) -> usize {
    self
      .batches
      .iter()
      .map(RecordBatch::get_array_memory_size)
      .sum()
  }

  /// All batches as one, for column-wise kernels that need the full column.
  pub fn concat(&self) -> arrow::error::Result<RecordBatch> {
    concat_batches(&self.schema, &self.batches)
  }
}
