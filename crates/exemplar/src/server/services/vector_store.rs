//! Vector store abstraction for the per-language entity and sentence collections
//!
//! Implementations own storage and indexing. Callers only see named collections
//! of `(text, label, embedding)` records searched by cosine similarity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::models::{CollectionKind, EntityRecord, Language, SearchHit, SentenceRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DistanceMetric {
  Cosine,
}

/// Approximate-index tuning forwarded to stores that build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
  pub index_type: String,
  pub nlist: usize,
  pub nprobe: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
  pub name: String,
  pub kind: CollectionKind,
  pub language: Language,
  pub dimension: usize,
  pub metric: DistanceMetric,
  pub index: IndexParams,
}

impl CollectionSpec {
  pub fn new(kind: CollectionKind, language: Language, store: &StoreConfig) -> Self {
    Self {
      name: kind.collection_name(language),
      kind,
      language,
      dimension: store.vector_dim,
      metric: DistanceMetric::Cosine,
      index: IndexParams {
        index_type: store.index_type.clone(),
        nlist: store.nlist,
        nprobe: store.nprobe,
      },
    }
  }
}

/// Stored row: entity text or sentence text plus its label.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
  pub text: String,
  pub label: String,
  pub embedding: Vec<f32>,
}

impl From<EntityRecord> for CollectionRecord {
  fn from(record: EntityRecord) -> Self {
    Self {
      text: record.entity_text,
      label: record.entity_type.as_str().to_string(),
      embedding: record.embedding,
    }
  }
}

impl From<SentenceRecord> for CollectionRecord {
  fn from(record: SentenceRecord) -> Self {
    Self { text: record.sentence_text, label: record.ner_labels, embedding: record.embedding }
  }
}

/// Exact-match restriction applied before ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarFilter {
  LabelEquals(String),
}

impl ScalarFilter {
  pub fn matches(&self, label: &str) -> bool {
    match self {
      ScalarFilter::LabelEquals(expected) => expected == label,
    }
  }
}

/// What `create_collection` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionCreation {
  Created,
  AlreadyExists,
  Recreated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
  pub name: String,
  pub exists: bool,
  /// Searchable (flushed) records
  pub count: usize,
  pub dimension: Option<usize>,
}

impl CollectionInfo {
  pub fn missing(name: &str) -> Self {
    Self { name: name.to_string(), exists: false, count: 0, dimension: None }
  }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
  /// Create the collection, or report that it already exists.
  ///
  /// With `recreate` an existing collection is dropped first. An existing
  /// collection whose dimension differs from `spec` is a `DimensionMismatch`.
  async fn create_collection(&self, spec: &CollectionSpec, recreate: bool) -> Result<CollectionCreation>;

  /// Stage records; they become searchable after [`VectorStore::flush`].
  async fn insert(&self, collection: &str, records: Vec<CollectionRecord>) -> Result<usize>;

  async fn flush(&self, collection: &str) -> Result<()>;

  /// Up to `top_k` hits by descending cosine similarity.
  async fn search(
    &self,
    collection: &str,
    vector: &[f32],
    top_k: usize,
    filter: Option<ScalarFilter>,
  ) -> Result<Vec<SearchHit>>;

  async fn collection_info(&self, collection: &str) -> Result<CollectionInfo>;

  /// Returns false when there was nothing to drop.
  async fn drop_collection(&self, collection: &str) -> Result<bool>;
}

/// Cosine similarity in [-1, 1]; 0 for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() || a.is_empty() {
    return 0.0;
  }

  let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
  let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

  if norm_a == 0.0 || norm_b == 0.0 {
    return 0.0;
  }

  dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod vector_store_tests {
  use super::*;
  use crate::models::EntityType;

  #[test]
  fn test_cosine_similarity() {
    assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
  }

  #[test]
  fn test_entity_record_conversion_uses_canonical_label() {
    let record = EntityRecord {
      entity_text: "CRISPR".to_string(),
      entity_type: EntityType::ScienceEntity,
      language: Language::En,
      embedding: vec![1.0],
    };
    let row = CollectionRecord::from(record);
    assert_eq!(row.label, "SCIENCE ENTITY");
    assert!(ScalarFilter::LabelEquals("SCIENCE ENTITY".to_string()).matches(&row.label));
  }

  #[test]
  fn test_spec_from_store_config() {
    let spec = CollectionSpec::new(CollectionKind::Sentence, Language::Fr, &StoreConfig::default());
    assert_eq!(spec.name, "sentence_fr");
    assert_eq!(spec.dimension, 4096);
    assert_eq!(spec.index.index_type, "IVF_FLAT");
  }
}
