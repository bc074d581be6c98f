//! Service facade: validation, lifecycle, single and batch retrieval.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::embeddings::EmbeddingProvider;
use super::retrieval::RetrievalEngine;
use super::vector_store::VectorStore;
use crate::config::{ExemplarConfig, RetrievalConfig};
use crate::error::{Result, RetrievalError};
use crate::models::{
  BatchEntry, CollectionKind, EntityType, Language, RetrievalResult, RetrievalStatistics,
};
use crate::template::build_instruction;

enum ServiceState {
  Uninitialized,
  Ready(Arc<RetrievalEngine>),
  Closed,
}

/// One query of a mixed-language batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BatchQuery {
  pub query: String,
  pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServiceStatistics {
  pub service_status: String,
  pub supported_languages: Vec<Language>,
  pub entity_types: Vec<String>,
  pub configuration: ConfigurationSummary,
  pub database_statistics: BTreeMap<Language, LanguageCollectionStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigurationSummary {
  pub top_k_entities: usize,
  pub top_k_sentences: usize,
  pub similarity_threshold: f32,
  pub max_examples_in_instruction: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LanguageCollectionStats {
  pub entities: usize,
  pub sentences: usize,
  /// `not_available` when the store could not be queried
  #[serde(skip_serializing_if = "Option::is_none", default)]
  pub status: Option<String>,
}

pub struct RetrievalService {
  settings: RetrievalConfig,
  max_query_length: usize,
  state: RwLock<ServiceState>,
}

impl RetrievalService {
  pub fn new(config: &ExemplarConfig) -> Self {
    Self {
      settings: config.retrieval.clone(),
      max_query_length: config.model.max_length,
      state: RwLock::new(ServiceState::Uninitialized),
    }
  }

  /// Attach the embedding provider and store, moving the service to ready.
  ///
  /// A ready service swaps in the new backends; a closed one stays closed.
  pub fn initialize(
    &self,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
  ) -> Result<()> {
    let mut state = self.state.write().map_err(|_| lock_poisoned())?;
    match *state {
      ServiceState::Closed => return Err(RetrievalError::ServiceClosed),
      ServiceState::Ready(_) => bentley::warn!("Retrieval service re-initialized with new backends"),
      ServiceState::Uninitialized => {}
    }

    let engine = RetrievalEngine::new(embedder, store, self.settings.clone());
    *state = ServiceState::Ready(Arc::new(engine));
    bentley::info!("Retrieval service ready");
    Ok(())
  }

  /// Release the backends. Terminal.
  pub fn close(&self) {
    if let Ok(mut state) = self.state.write() {
      *state = ServiceState::Closed;
    }
  }

  pub fn state_name(&self) -> &'static str {
    match self.state.read().as_deref() {
      Ok(ServiceState::Uninitialized) => "uninitialized",
      Ok(ServiceState::Ready(_)) => "ready",
      Ok(ServiceState::Closed) => "closed",
      Err(_) => "unavailable",
    }
  }

  pub fn is_ready(&self) -> bool {
    self.state_name() == "ready"
  }

  pub fn settings(&self) -> &RetrievalConfig {
    &self.settings
  }

  fn engine(&self) -> Result<Arc<RetrievalEngine>> {
    match &*self.state.read().map_err(|_| lock_poisoned())? {
      ServiceState::Uninitialized => Err(RetrievalError::NotInitialized),
      ServiceState::Ready(engine) => Ok(engine.clone()),
      ServiceState::Closed => Err(RetrievalError::ServiceClosed),
    }
  }

  fn validate(&self, query: &str, language: &str) -> Result<Language> {
    let language = language.parse::<Language>()?;

    if query.trim().is_empty() {
      return Err(RetrievalError::invalid_input("query must not be empty"));
    }

    let length = query.chars().count();
    if length > self.max_query_length {
      bentley::warn!(
        "Query of {length} characters exceeds max_length {}; the model may truncate it",
        self.max_query_length
      );
    }
    Ok(language)
  }

  /// Encode once, search sentences and all entity types, render the instruction.
  pub async fn retrieve_and_format(&self, query: &str, language: &str) -> Result<RetrievalResult> {
    let engine = self.engine()?;
    let language = self.validate(query, language)?;
    let started = Instant::now();

    let vector = engine.encode_query(query).await?;
    let similar_sentences = engine
      .similar_sentences_for_vector(&vector, language, self.settings.top_k_sentences)
      .await?;
    let entity_results =
      engine.all_entity_types_for_vector(&vector, language, self.settings.top_k_entities).await;

    let instruction = build_instruction(
      query,
      &entity_results,
      &similar_sentences,
      self.settings.max_entities_per_type,
      self.settings.max_examples_in_instruction,
    );

    let processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
    let statistics =
      RetrievalStatistics::from_hits(&similar_sentences, &entity_results, processing_time_ms);

    bentley::verbose!(
      "Retrieved {} sentences and {} entities for {language} query in {processing_time_ms:.1}ms",
      statistics.total_similar_sentences,
      statistics.total_entities_found
    );

    Ok(RetrievalResult {
      query: query.to_string(),
      language,
      similar_sentences,
      entity_results,
      instruction,
      statistics,
    })
  }

  /// Sequential batch in one language. Failures become error entries in place.
  pub async fn batch_retrieve(&self, queries: &[String], language: &str) -> Vec<BatchEntry> {
    let items: Vec<BatchQuery> = queries
      .iter()
      .map(|query| BatchQuery { query: query.clone(), language: language.to_string() })
      .collect();
    self.batch_retrieve_items(&items).await
  }

  pub async fn batch_retrieve_items(&self, items: &[BatchQuery]) -> Vec<BatchEntry> {
    self.batch_retrieve_cancellable(items, &AtomicBool::new(false)).await
  }

  /// Stops before the next query once `cancel` is set; finished entries are kept.
  pub async fn batch_retrieve_cancellable(
    &self,
    items: &[BatchQuery],
    cancel: &AtomicBool,
  ) -> Vec<BatchEntry> {
    let mut entries = Vec::with_capacity(items.len());

    for (index, item) in items.iter().enumerate() {
      if cancel.load(Ordering::Relaxed) {
        bentley::warn!("Batch cancelled after {index} of {} queries", items.len());
        break;
      }

      let entry = match self.retrieve_and_format(&item.query, &item.language).await {
        Ok(result) => BatchEntry::Success(result),
        Err(e) => {
          bentley::warn!("Batch query {} failed: {e}", index + 1);
          BatchEntry::failure(&item.query, &item.language, &e)
        }
      };
      entries.push(entry);
    }

    entries
  }

  /// Supported languages, configuration and per-language collection counts.
  pub async fn service_statistics(&self) -> ServiceStatistics {
    let mut database_statistics = BTreeMap::new();

    if let Ok(engine) = self.engine() {
      for language in Language::ALL {
        database_statistics.insert(language, collection_stats(engine.store().as_ref(), language).await);
      }
    }

    ServiceStatistics {
      service_status: self.state_name().to_string(),
      supported_languages: Language::ALL.to_vec(),
      entity_types: EntityType::ALL.iter().map(|t| t.as_str().to_string()).collect(),
      configuration: ConfigurationSummary {
        top_k_entities: self.settings.top_k_entities,
        top_k_sentences: self.settings.top_k_sentences,
        similarity_threshold: self.settings.similarity_threshold,
        max_examples_in_instruction: self.settings.max_examples_in_instruction,
      },
      database_statistics,
    }
  }
}

async fn collection_stats(store: &dyn VectorStore, language: Language) -> LanguageCollectionStats {
  let entities = store.collection_info(&CollectionKind::Entity.collection_name(language)).await;
  let sentences = store.collection_info(&CollectionKind::Sentence.collection_name(language)).await;

  match (entities, sentences) {
    (Ok(entities), Ok(sentences)) => {
      LanguageCollectionStats { entities: entities.count, sentences: sentences.count, status: None }
    }
    _ => LanguageCollectionStats {
      entities: 0,
      sentences: 0,
      status: Some("not_available".to_string()),
    },
  }
}

fn lock_poisoned() -> RetrievalError {
  RetrievalError::storage("retrieval service state lock poisoned")
}

#[cfg(test)]
mod orchestrator_tests {
  use super::*;
  use crate::server::services::embeddings::MockEmbeddingProvider;
  use crate::server::services::vector_store::{CollectionInfo, MockVectorStore};

  fn embedder() -> Arc<dyn EmbeddingProvider> {
    let mut embedder = MockEmbeddingProvider::new();
    embedder.expect_encode_documents().returning(|_| Ok(vec![vec![1.0, 0.0]]));
    embedder.expect_dimension().return_const(2usize);
    Arc::new(embedder)
  }

  fn empty_store() -> Arc<dyn VectorStore> {
    let mut store = MockVectorStore::new();
    store.expect_search().returning(|_, _, _, _| Ok(Vec::new()));
    Arc::new(store)
  }

  #[tokio::test]
  async fn test_requires_initialization() {
    let service = RetrievalService::new(&ExemplarConfig::default());
    let err = service.retrieve_and_format("hello", "en").await.unwrap_err();
    assert!(matches!(err, RetrievalError::NotInitialized));
    assert_eq!(service.state_name(), "uninitialized");
  }

  #[tokio::test]
  async fn test_closed_is_terminal() {
    let service = RetrievalService::new(&ExemplarConfig::default());
    service.initialize(embedder(), empty_store()).unwrap();
    assert!(service.is_ready());

    service.close();
    let err = service.retrieve_and_format("hello", "en").await.unwrap_err();
    assert!(matches!(err, RetrievalError::ServiceClosed));
    assert!(matches!(
      service.initialize(embedder(), empty_store()).unwrap_err(),
      RetrievalError::ServiceClosed
    ));
  }

  #[tokio::test]
  async fn test_blank_query_rejected_before_store_contact() {
    let mut store = MockVectorStore::new();
    store.expect_search().never();
    let service = RetrievalService::new(&ExemplarConfig::default());
    service.initialize(embedder(), Arc::new(store)).unwrap();

    let err = service.retrieve_and_format("   ", "en").await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidInput { .. }));
  }

  #[tokio::test]
  async fn test_empty_store_still_yields_all_entity_types() {
    let service = RetrievalService::new(&ExemplarConfig::default());
    service.initialize(embedder(), empty_store()).unwrap();

    let result = service.retrieve_and_format("Nothing here", "fr").await.unwrap();
    assert_eq!(result.entity_results.iter().count(), 8);
    assert_eq!(result.statistics.total_entities_found, 0);
    assert_eq!(result.statistics.entity_types_found, 0);
    assert!(result.instruction.contains("- PERSON: \n  e.g. (no examples available)"));
    assert!(result.instruction.ends_with("Input: Nothing here"));
  }

  #[tokio::test]
  async fn test_cancelled_batch_keeps_finished_entries() {
    let service = RetrievalService::new(&ExemplarConfig::default());
    service.initialize(embedder(), empty_store()).unwrap();
    let items = vec![
      BatchQuery { query: "one".to_string(), language: "en".to_string() },
      BatchQuery { query: "two".to_string(), language: "en".to_string() },
    ];

    let cancel = AtomicBool::new(true);
    assert!(service.batch_retrieve_cancellable(&items, &cancel).await.is_empty());

    let cancel = AtomicBool::new(false);
    assert_eq!(service.batch_retrieve_cancellable(&items, &cancel).await.len(), 2);
  }

  #[tokio::test]
  async fn test_statistics_mark_unavailable_languages() {
    let mut store = MockVectorStore::new();
    store.expect_collection_info().returning(|name| {
      if name.ends_with("_ko") {
        Err(RetrievalError::store_unavailable("shard offline"))
      } else {
        Ok(CollectionInfo { name: name.to_string(), exists: true, count: 3, dimension: Some(2) })
      }
    });
    let service = RetrievalService::new(&ExemplarConfig::default());
    service.initialize(embedder(), Arc::new(store)).unwrap();

    let stats = service.service_statistics().await;
    assert_eq!(stats.service_status, "ready");
    assert_eq!(stats.entity_types.len(), 8);
    assert_eq!(stats.database_statistics[&Language::En].entities, 3);
    assert_eq!(stats.database_statistics[&Language::Ko].status.as_deref(), Some("not_available"));
  }
}
