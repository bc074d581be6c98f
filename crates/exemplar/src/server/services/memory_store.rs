//! Brute-force in-process vector store.
//!
//! Used by tests and by small deployments that load their reference data at
//! startup. Inserted records stay pending until the collection is flushed.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::vector_store::{
  cosine_similarity, CollectionCreation, CollectionInfo, CollectionRecord, CollectionSpec,
  ScalarFilter, VectorStore,
};
use crate::error::{Result, RetrievalError};
use crate::models::SearchHit;

struct Collection {
  dimension: usize,
  visible: Vec<CollectionRecord>,
  pending: Vec<CollectionRecord>,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
  collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
  async fn create_collection(&self, spec: &CollectionSpec, recreate: bool) -> Result<CollectionCreation> {
    let mut collections = self.collections.write().await;

    let outcome = match collections.get(&spec.name) {
      Some(_) if recreate => CollectionCreation::Recreated,
      Some(existing) if existing.dimension != spec.dimension => {
        return Err(RetrievalError::dimension_mismatch(
          &spec.name,
          existing.dimension,
          spec.dimension,
        ));
      }
      Some(_) => return Ok(CollectionCreation::AlreadyExists),
      None => CollectionCreation::Created,
    };

    collections.insert(
      spec.name.clone(),
      Collection { dimension: spec.dimension, visible: Vec::new(), pending: Vec::new() },
    );
    Ok(outcome)
  }

  async fn insert(&self, collection: &str, records: Vec<CollectionRecord>) -> Result<usize> {
    let mut collections = self.collections.write().await;
    let target = collections
      .get_mut(collection)
      .ok_or_else(|| RetrievalError::collection_not_found(collection))?;

    if let Some(bad) = records.iter().find(|record| record.embedding.len() != target.dimension) {
      return Err(RetrievalError::dimension_mismatch(
        collection,
        target.dimension,
        bad.embedding.len(),
      ));
    }

    let inserted = records.len();
    target.pending.extend(records);
    Ok(inserted)
  }

  async fn flush(&self, collection: &str) -> Result<()> {
    let mut collections = self.collections.write().await;
    let target = collections
      .get_mut(collection)
      .ok_or_else(|| RetrievalError::collection_not_found(collection))?;

    let pending = std::mem::take(&mut target.pending);
    target.visible.extend(pending);
    Ok(())
  }

  async fn search(
    &self,
    collection: &str,
    vector: &[f32],
    top_k: usize,
    filter: Option<ScalarFilter>,
  ) -> Result<Vec<SearchHit>> {
    let collections = self.collections.read().await;
    let target = collections
      .get(collection)
      .ok_or_else(|| RetrievalError::collection_not_found(collection))?;

    if vector.len() != target.dimension {
      return Err(RetrievalError::dimension_mismatch(collection, target.dimension, vector.len()));
    }

    let mut scored: Vec<(f32, &CollectionRecord)> = target
      .visible
      .iter()
      .filter(|record| filter.as_ref().is_none_or(|f| f.matches(&record.label)))
      .map(|record| (cosine_similarity(vector, &record.embedding), record))
      .collect();

    // Stable sort keeps insertion order among equal scores.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.truncate(top_k);

    Ok(
      scored
        .into_iter()
        .map(|(score, record)| SearchHit::new(record.text.clone(), record.label.clone(), score))
        .collect(),
    )
  }

  async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
    let collections = self.collections.read().await;
    Ok(match collections.get(collection) {
      Some(target) => CollectionInfo {
        name: collection.to_string(),
        exists: true,
        count: target.visible.len(),
        dimension: Some(target.dimension),
      },
      None => CollectionInfo::missing(collection),
    })
  }

  async fn drop_collection(&self, collection: &str) -> Result<bool> {
    let mut collections = self.collections.write().await;
    let dropped = collections.remove(collection).is_some();
    if !dropped {
      bentley::warn!("Collection {collection} does not exist, nothing to drop");
    }
    Ok(dropped)
  }
}

#[cfg(test)]
mod memory_store_tests {
  use super::*;
  use crate::config::StoreConfig;
  use crate::models::{CollectionKind, Language};

  fn spec(dimension: usize) -> CollectionSpec {
    let store = StoreConfig { vector_dim: dimension, ..StoreConfig::default() };
    CollectionSpec::new(CollectionKind::Entity, Language::En, &store)
  }

  fn row(text: &str, label: &str, embedding: Vec<f32>) -> CollectionRecord {
    CollectionRecord { text: text.to_string(), label: label.to_string(), embedding }
  }

  #[tokio::test]
  async fn test_create_reports_outcome() {
    let store = InMemoryVectorStore::new();
    assert_eq!(store.create_collection(&spec(2), false).await.unwrap(), CollectionCreation::Created);
    assert_eq!(
      store.create_collection(&spec(2), false).await.unwrap(),
      CollectionCreation::AlreadyExists
    );
    assert_eq!(store.create_collection(&spec(2), true).await.unwrap(), CollectionCreation::Recreated);
  }

  #[tokio::test]
  async fn test_existing_collection_with_other_dimension_is_rejected() {
    let store = InMemoryVectorStore::new();
    store.create_collection(&spec(2), false).await.unwrap();
    let err = store.create_collection(&spec(3), false).await.unwrap_err();
    assert!(matches!(err, RetrievalError::DimensionMismatch { expected: 2, actual: 3, .. }));
  }

  #[tokio::test]
  async fn test_records_visible_only_after_flush() {
    let store = InMemoryVectorStore::new();
    store.create_collection(&spec(2), false).await.unwrap();
    store.insert("entity_en", vec![row("Obama", "PERSON", vec![1.0, 0.0])]).await.unwrap();

    assert!(store.search("entity_en", &[1.0, 0.0], 5, None).await.unwrap().is_empty());
    assert_eq!(store.collection_info("entity_en").await.unwrap().count, 0);

    store.flush("entity_en").await.unwrap();
    assert_eq!(store.search("entity_en", &[1.0, 0.0], 5, None).await.unwrap().len(), 1);
    assert_eq!(store.collection_info("entity_en").await.unwrap().count, 1);
  }

  #[tokio::test]
  async fn test_search_orders_filters_and_limits() {
    let store = InMemoryVectorStore::new();
    store.create_collection(&spec(2), false).await.unwrap();
    store
      .insert(
        "entity_en",
        vec![
          row("Paris", "LOCATION", vec![0.0, 1.0]),
          row("Obama", "PERSON", vec![1.0, 0.0]),
          row("Merkel", "PERSON", vec![1.0, 0.0]),
          row("Lincoln", "PERSON", vec![0.6, 0.8]),
        ],
      )
      .await
      .unwrap();
    store.flush("entity_en").await.unwrap();

    let filter = Some(ScalarFilter::LabelEquals("PERSON".to_string()));
    let hits = store.search("entity_en", &[1.0, 0.0], 2, filter).await.unwrap();

    let texts: Vec<&str> = hits.iter().map(|hit| hit.text.as_str()).collect();
    assert_eq!(texts, vec!["Obama", "Merkel"]);
    assert!(hits.iter().all(|hit| hit.label == "PERSON"));
    assert!((hits[0].score - 1.0).abs() < 1e-6);
    assert!(hits[0].distance.abs() < 1e-6);
  }

  #[tokio::test]
  async fn test_missing_collection_and_wrong_dimension() {
    let store = InMemoryVectorStore::new();
    let err = store.search("sentence_ko", &[1.0], 5, None).await.unwrap_err();
    assert!(matches!(err, RetrievalError::CollectionNotFound { .. }));

    store.create_collection(&spec(2), false).await.unwrap();
    let err = store.insert("entity_en", vec![row("x", "ART", vec![1.0])]).await.unwrap_err();
    assert!(matches!(err, RetrievalError::DimensionMismatch { .. }));
  }

  #[tokio::test]
  async fn test_drop_collection() {
    let store = InMemoryVectorStore::new();
    store.create_collection(&spec(2), false).await.unwrap();
    assert!(store.drop_collection("entity_en").await.unwrap());
    assert!(!store.drop_collection("entity_en").await.unwrap());
    assert!(!store.collection_info("entity_en").await.unwrap().exists);
  }
}
