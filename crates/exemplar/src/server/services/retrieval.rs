//! Similarity retrieval against the per-language collections.
//!
//! Each operation has a query-text form, which encodes the query first, and a
//! vector form for callers that already hold the query embedding.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use super::embeddings::{encode_one, EmbeddingProvider};
use super::vector_store::{ScalarFilter, VectorStore};
use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};
use crate::models::{CollectionKind, EntityResults, EntityType, Language, SearchHit};

pub struct RetrievalEngine {
  embedder: Arc<dyn EmbeddingProvider>,
  store: Arc<dyn VectorStore>,
  settings: RetrievalConfig,
}

impl RetrievalEngine {
  pub fn new(
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    settings: RetrievalConfig,
  ) -> Self {
    Self { embedder, store, settings }
  }

  pub fn settings(&self) -> &RetrievalConfig {
    &self.settings
  }

  pub fn store(&self) -> &Arc<dyn VectorStore> {
    &self.store
  }

  /// Queries are encoded as documents so they share the reference data's space.
  pub async fn encode_query(&self, query: &str) -> Result<Vec<f32>> {
    encode_one(self.embedder.as_ref(), query).await
  }

  /// Encode with the configured query instruction, for instruction-tuned lookups.
  pub async fn encode_instructed_query(&self, query: &str) -> Result<Vec<f32>> {
    let item = (self.settings.query_instruction.clone(), query.to_string());
    self
      .embedder
      .encode_queries(&[item])
      .await?
      .pop()
      .ok_or_else(|| RetrievalError::encoding("embedding provider returned no vectors"))
  }

  pub async fn retrieve_similar_sentences(
    &self,
    query: &str,
    language: Language,
    top_k: usize,
  ) -> Result<Vec<SearchHit>> {
    let vector = self.encode_query(query).await?;
    self.similar_sentences_for_vector(&vector, language, top_k).await
  }

  pub async fn similar_sentences_for_vector(
    &self,
    vector: &[f32],
    language: Language,
    top_k: usize,
  ) -> Result<Vec<SearchHit>> {
    let collection = CollectionKind::Sentence.collection_name(language);
    self.search(&collection, vector, top_k, None).await
  }

  pub async fn retrieve_entities_by_type(
    &self,
    query: &str,
    language: Language,
    entity_type: EntityType,
    top_k: usize,
  ) -> Result<Vec<SearchHit>> {
    let vector = self.encode_query(query).await?;
    self.entities_by_type_for_vector(&vector, language, entity_type, top_k).await
  }

  pub async fn entities_by_type_for_vector(
    &self,
    vector: &[f32],
    language: Language,
    entity_type: EntityType,
    top_k: usize,
  ) -> Result<Vec<SearchHit>> {
    let collection = CollectionKind::Entity.collection_name(language);
    let filter = ScalarFilter::LabelEquals(entity_type.as_str().to_string());
    self.search(&collection, vector, top_k, Some(filter)).await
  }

  /// Encoding failures are fatal; per-type search failures are not.
  pub async fn retrieve_all_entity_types(
    &self,
    query: &str,
    language: Language,
    top_k: usize,
  ) -> Result<EntityResults> {
    let vector = self.encode_query(query).await?;
    Ok(self.all_entity_types_for_vector(&vector, language, top_k).await)
  }

  /// One concurrent search per entity type. A type whose search fails is
  /// logged and left empty.
  pub async fn all_entity_types_for_vector(
    &self,
    vector: &[f32],
    language: Language,
    top_k: usize,
  ) -> EntityResults {
    let searches = EntityType::ALL.into_iter().map(|entity_type| async move {
      let hits = self.entities_by_type_for_vector(vector, language, entity_type, top_k).await;
      (entity_type, hits)
    });

    join_all(searches)
      .await
      .into_iter()
      .map(|(entity_type, hits)| {
        let hits = hits.unwrap_or_else(|e| {
          bentley::warn!("Entity search for {entity_type} in {language} failed: {e}");
          Vec::new()
        });
        (entity_type, hits)
      })
      .collect()
  }

  #[tracing::instrument(level = "debug", skip(self, vector, filter))]
  async fn search(
    &self,
    collection: &str,
    vector: &[f32],
    top_k: usize,
    filter: Option<ScalarFilter>,
  ) -> Result<Vec<SearchHit>> {
    let timeout_ms = self.settings.search_timeout_ms;
    let mut hits = tokio::time::timeout(
      Duration::from_millis(timeout_ms),
      self.store.search(collection, vector, top_k, filter),
    )
    .await
    .map_err(|_| RetrievalError::search_timeout(collection, timeout_ms))??;

    let threshold = self.settings.similarity_threshold;
    if threshold > 0.0 {
      hits.retain(|hit| hit.score >= threshold);
    }

    bentley::verbose!("{} hits from {collection}", hits.len());
    Ok(hits)
  }
}
