#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use exemplar::models::SearchHit;
use exemplar::server::services::embeddings::EmbeddingProvider;
use exemplar::server::services::vector_store::{
  CollectionCreation, CollectionInfo, CollectionRecord, CollectionSpec, ScalarFilter, VectorStore,
};
use exemplar::{Result, RetrievalError};

/// Queries mentioning "unreachable" encode to a vector the scripted store refuses.
pub struct StubEmbedder;

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
  async fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    Ok(
      texts
        .iter()
        .map(|text| if text.contains("unreachable") { vec![0.0, 1.0] } else { vec![1.0, 0.0] })
        .collect(),
    )
  }

  async fn encode_queries(&self, items: &[(String, String)]) -> Result<Vec<Vec<f32>>> {
    let texts: Vec<String> = items.iter().map(|(_, text)| text.clone()).collect();
    self.encode_documents(&texts).await
  }

  fn dimension(&self) -> usize {
    2
  }
}

/// Canned hits keyed by collection name and optional label filter.
#[derive(Default)]
pub struct ScriptedStore {
  hits: HashMap<(String, Option<String>), Vec<SearchHit>>,
  pub searches: AtomicUsize,
}

impl ScriptedStore {
  pub fn with_hits(mut self, collection: &str, label: Option<&str>, hits: Vec<SearchHit>) -> Self {
    self.hits.insert((collection.to_string(), label.map(str::to_string)), hits);
    self
  }

  pub fn search_count(&self) -> usize {
    self.searches.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl VectorStore for ScriptedStore {
  async fn create_collection(&self, _spec: &CollectionSpec, _recreate: bool) -> Result<CollectionCreation> {
    Ok(CollectionCreation::AlreadyExists)
  }

  async fn insert(&self, _collection: &str, records: Vec<CollectionRecord>) -> Result<usize> {
    Ok(records.len())
  }

  async fn flush(&self, _collection: &str) -> Result<()> {
    Ok(())
  }

  async fn search(
    &self,
    collection: &str,
    vector: &[f32],
    top_k: usize,
    filter: Option<ScalarFilter>,
  ) -> Result<Vec<SearchHit>> {
    self.searches.fetch_add(1, Ordering::SeqCst);
    if vector.get(1).copied().unwrap_or_default() > 0.5 {
      return Err(RetrievalError::store_unavailable("scripted outage"));
    }

    let label = filter.map(|filter| match filter {
      ScalarFilter::LabelEquals(label) => label,
    });
    let mut hits = self.hits.get(&(collection.to_string(), label)).cloned().unwrap_or_default();
    hits.truncate(top_k);
    Ok(hits)
  }

  async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
    let count =
      self.hits.iter().filter(|((name, _), _)| name == collection).map(|(_, hits)| hits.len()).sum();
    Ok(CollectionInfo { name: collection.to_string(), exists: true, count, dimension: Some(2) })
  }

  async fn drop_collection(&self, _collection: &str) -> Result<bool> {
    Ok(true)
  }
}

pub const OBAMA_SENTENCE: &str = "Barack Obama was born in Hawaii.";
pub const OBAMA_LABELS: &str = r#"{"PERSON": ["Barack Obama"], "LOCATION": ["Hawaii"]}"#;

pub fn obama_store() -> ScriptedStore {
  ScriptedStore::default()
    .with_hits("sentence_en", None, vec![SearchHit::new(OBAMA_SENTENCE, OBAMA_LABELS, 0.92)])
    .with_hits("entity_en", Some("PERSON"), vec![SearchHit::new("Barack Obama", "PERSON", 0.95)])
    .with_hits("entity_en", Some("LOCATION"), vec![SearchHit::new("Hawaii", "LOCATION", 0.90)])
}
