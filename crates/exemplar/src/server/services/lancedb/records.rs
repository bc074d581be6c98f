//! Arrow RecordBatch conversion utilities for LanceDB

use std::sync::Arc;

use arrow::array::{Array, FixedSizeListBuilder, Float32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::{Result, RetrievalError};
use crate::server::services::vector_store::CollectionRecord;

pub const TEXT_COLUMN: &str = "text";
pub const LABEL_COLUMN: &str = "label";
pub const EMBEDDING_COLUMN: &str = "embedding";

/// `{text, label, embedding: FixedSizeList<Float32, dimension>}`
pub fn collection_schema(dimension: usize) -> SchemaRef {
  Arc::new(Schema::new(vec![
    Field::new(TEXT_COLUMN, DataType::Utf8, false),
    Field::new(LABEL_COLUMN, DataType::Utf8, false),
    Field::new(
      EMBEDDING_COLUMN,
      DataType::FixedSizeList(
        Arc::new(Field::new("item", DataType::Float32, true)),
        dimension as i32,
      ),
      false,
    ),
  ]))
}

/// Embedding width recorded in an existing table's schema.
pub fn schema_dimension(schema: &Schema) -> Option<usize> {
  match schema.field_with_name(EMBEDDING_COLUMN).ok()?.data_type() {
    DataType::FixedSizeList(_, size) => Some(*size as usize),
    _ => None,
  }
}

pub fn records_to_arrow_batch(records: &[CollectionRecord], dimension: usize) -> Result<RecordBatch> {
  if records.is_empty() {
    return Err(RetrievalError::storage("Cannot create RecordBatch from empty records"));
  }

  let text_array = extract_string_field(records, |r| &r.text);
  let label_array = extract_string_field(records, |r| &r.label);
  let embedding_array = create_embedding_array(records, dimension);

  let columns: Vec<Arc<dyn Array>> =
    vec![Arc::new(text_array), Arc::new(label_array), Arc::new(embedding_array)];

  RecordBatch::try_new(collection_schema(dimension), columns)
    .map_err(|e| RetrievalError::storage(format!("Failed to create RecordBatch: {e}")))
}

fn extract_string_field<F>(records: &[CollectionRecord], field_fn: F) -> StringArray
where
  F: Fn(&CollectionRecord) -> &str,
{
  StringArray::from(records.iter().map(|r| Some(field_fn(r))).collect::<Vec<_>>())
}

fn create_embedding_array(
  records: &[CollectionRecord],
  dimension: usize,
) -> arrow::array::FixedSizeListArray {
  let mut builder =
    FixedSizeListBuilder::new(Float32Array::builder(dimension * records.len()), dimension as i32);

  for record in records {
    builder.values().append_slice(&record.embedding);
    builder.append(true);
  }

  builder.finish()
}

#[cfg(test)]
mod records_tests {
  use super::*;

  #[test]
  fn test_batch_matches_schema() {
    let records = vec![
      CollectionRecord { text: "Obama".into(), label: "PERSON".into(), embedding: vec![1.0, 0.0] },
      CollectionRecord { text: "Hawaii".into(), label: "LOCATION".into(), embedding: vec![0.0, 1.0] },
    ];
    let batch = records_to_arrow_batch(&records, 2).unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(schema_dimension(&batch.schema()), Some(2));
  }

  #[test]
  fn test_empty_records_rejected() {
    assert!(records_to_arrow_batch(&[], 4).is_err());
  }
}
