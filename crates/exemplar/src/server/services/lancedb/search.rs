//! Vector search operations and result processing for LanceDB

use arrow::array::{Array, Float32Array, StringArray};
use arrow::record_batch::RecordBatch;
use futures::stream::StreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};

use super::records::{EMBEDDING_COLUMN, LABEL_COLUMN, TEXT_COLUMN};
use crate::error::{Result, RetrievalError};
use crate::models::SearchHit;
use crate::server::services::vector_store::ScalarFilter;

/// Nearest neighbours by cosine distance, closest first.
pub async fn vector_search(
  table: &Table,
  vector: &[f32],
  top_k: usize,
  nprobes: usize,
  filter: Option<&ScalarFilter>,
) -> Result<Vec<SearchHit>> {
  let mut query = table
    .vector_search(vector)
    .map_err(search_error)?
    .column(EMBEDDING_COLUMN)
    .distance_type(DistanceType::Cosine)
    .nprobes(nprobes)
    .limit(top_k);

  if let Some(filter) = filter {
    query = query.only_if(filter_expression(filter));
  }

  let mut stream = query.execute().await.map_err(search_error)?;

  let mut hits = Vec::new();
  while let Some(batch) = stream.next().await {
    let batch = batch.map_err(search_error)?;
    hits.extend(process_result_batch(&batch)?);
  }
  Ok(hits)
}

/// SQL predicate for LanceDB's prefilter.
pub fn filter_expression(filter: &ScalarFilter) -> String {
  match filter {
    ScalarFilter::LabelEquals(label) => {
      format!("{LABEL_COLUMN} = '{}'", label.replace('\'', "''"))
    }
  }
}

fn process_result_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
  let texts = extract_string_column(batch, TEXT_COLUMN)?;
  let labels = extract_string_column(batch, LABEL_COLUMN)?;
  let distances = batch
    .column_by_name("_distance")
    .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
    .ok_or_else(|| RetrievalError::storage("Missing '_distance' column in search results"))?;

  Ok(
    (0..batch.num_rows())
      .map(|i| SearchHit::new(texts.value(i), labels.value(i), 1.0 - distances.value(i)))
      .collect(),
  )
}

fn extract_string_column<'a>(batch: &'a RecordBatch, column_name: &str) -> Result<&'a StringArray> {
  batch
    .column_by_name(column_name)
    .ok_or_else(|| RetrievalError::storage(format!("Missing '{column_name}' column")))?
    .as_any()
    .downcast_ref::<StringArray>()
    .ok_or_else(|| RetrievalError::storage(format!("'{column_name}' column is not a string column")))
}

fn search_error(e: lancedb::Error) -> RetrievalError {
  RetrievalError::storage(format!("Vector search failed: {e}"))
}

#[cfg(test)]
mod search_tests {
  use super::*;

  #[test]
  fn test_filter_expression_quotes_label() {
    let filter = ScalarFilter::LabelEquals("SCIENCE ENTITY".to_string());
    assert_eq!(filter_expression(&filter), "label = 'SCIENCE ENTITY'");

    let filter = ScalarFilter::LabelEquals("O'Brien".to_string());
    assert_eq!(filter_expression(&filter), "label = 'O''Brien'");
  }
}
