//! LanceDB-backed vector store
//!
//! Each collection is a LanceDB table with `text`, `label` and a fixed-size
//! `embedding` column. Writes are durable on `add`, so `flush` has nothing to do.

pub mod connection;
pub mod records;
pub mod search;
pub mod tables;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{Result, RetrievalError};
use crate::models::SearchHit;
use crate::server::services::vector_store::{
  CollectionCreation, CollectionInfo, CollectionRecord, CollectionSpec, ScalarFilter, VectorStore,
};
use connection::create_connection;
use search::vector_search;
use tables::TableManager;

pub struct LanceDbVectorStore {
  tables: TableManager,
  nprobes: usize,
}

impl LanceDbVectorStore {
  pub async fn open(data_dir: PathBuf, nprobes: usize) -> Result<Self> {
    let connection = create_connection(&data_dir).await?;
    bentley::info!("Opened LanceDB store at {}", data_dir.display());
    Ok(Self { tables: TableManager::new(connection), nprobes })
  }

  async fn require_dimension(&self, collection: &str) -> Result<usize> {
    self
      .tables
      .table_dimension(collection)
      .await?
      .ok_or_else(|| RetrievalError::storage(format!("Table '{collection}' has no embedding column")))
  }
}

#[async_trait]
impl VectorStore for LanceDbVectorStore {
  async fn create_collection(&self, spec: &CollectionSpec, recreate: bool) -> Result<CollectionCreation> {
    if self.tables.table_exists(&spec.name).await? {
      if recreate {
        self.tables.remove_table(&spec.name).await?;
        self.tables.create_empty_table(&spec.name, spec.dimension).await?;
        return Ok(CollectionCreation::Recreated);
      }

      let existing = self.require_dimension(&spec.name).await?;
      if existing != spec.dimension {
        return Err(RetrievalError::dimension_mismatch(&spec.name, existing, spec.dimension));
      }
      return Ok(CollectionCreation::AlreadyExists);
    }

    self.tables.create_empty_table(&spec.name, spec.dimension).await?;
    Ok(CollectionCreation::Created)
  }

  async fn insert(&self, collection: &str, records: Vec<CollectionRecord>) -> Result<usize> {
    if records.is_empty() {
      return Ok(0);
    }

    let dimension = self.require_dimension(collection).await?;
    if let Some(bad) = records.iter().find(|record| record.embedding.len() != dimension) {
      return Err(RetrievalError::dimension_mismatch(collection, dimension, bad.embedding.len()));
    }

    self.tables.add_records(collection, &records, dimension).await?;
    Ok(records.len())
  }

  async fn flush(&self, collection: &str) -> Result<()> {
    if !self.tables.table_exists(collection).await? {
      return Err(RetrievalError::collection_not_found(collection));
    }
    Ok(())
  }

  async fn search(
    &self,
    collection: &str,
    vector: &[f32],
    top_k: usize,
    filter: Option<ScalarFilter>,
  ) -> Result<Vec<SearchHit>> {
    let table = self.tables.get_table(collection).await?;
    vector_search(&table, vector, top_k, self.nprobes, filter.as_ref()).await
  }

  async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
    if !self.tables.table_exists(collection).await? {
      return Ok(CollectionInfo::missing(collection));
    }

    Ok(CollectionInfo {
      name: collection.to_string(),
      exists: true,
      count: self.tables.count_rows(collection).await?,
      dimension: self.tables.table_dimension(collection).await?,
    })
  }

  async fn drop_collection(&self, collection: &str) -> Result<bool> {
    let dropped = self.tables.remove_table(collection).await?;
    if !dropped {
      bentley::warn!("Collection {collection} does not exist, nothing to drop");
    }
    Ok(dropped)
  }
}

#[cfg(test)]
mod lancedb_store_tests {
  use super::*;
  use crate::config::StoreConfig;
  use crate::models::{CollectionKind, Language};
  use tempfile::TempDir;

  fn spec() -> CollectionSpec {
    let store = StoreConfig { vector_dim: 2, ..StoreConfig::default() };
    CollectionSpec::new(CollectionKind::Sentence, Language::En, &store)
  }

  #[tokio::test]
  async fn test_drop_collection_goes_through_connection() {
    let dir = TempDir::new().unwrap();
    let store = LanceDbVectorStore::open(dir.path().join("vectors"), 10).await.unwrap();

    assert!(!store.drop_collection("sentence_en").await.unwrap());

    store.create_collection(&spec(), false).await.unwrap();
    assert!(store.collection_info("sentence_en").await.unwrap().exists);

    assert!(store.drop_collection("sentence_en").await.unwrap());
    assert!(!store.collection_info("sentence_en").await.unwrap().exists);
    assert!(!store.drop_collection("sentence_en").await.unwrap());
  }

  #[tokio::test]
  async fn test_recreate_replaces_existing_table() {
    let dir = TempDir::new().unwrap();
    let store = LanceDbVectorStore::open(dir.path().to_path_buf(), 10).await.unwrap();

    store.create_collection(&spec(), false).await.unwrap();
    store
      .insert(
        "sentence_en",
        vec![CollectionRecord { text: "Hi.".into(), label: "{}".into(), embedding: vec![1.0, 0.0] }],
      )
      .await
      .unwrap();

    assert_eq!(store.create_collection(&spec(), true).await.unwrap(), CollectionCreation::Recreated);
    assert_eq!(store.collection_info("sentence_en").await.unwrap().count, 0);
  }
}
