//! Table lifecycle operations for LanceDB

use arrow::record_batch::RecordBatchIterator;
use lancedb::{Connection, Table};

use super::records::{collection_schema, records_to_arrow_batch, schema_dimension};
use crate::error::{Result, RetrievalError};
use crate::server::services::vector_store::CollectionRecord;

/// One LanceDB table per collection.
pub struct TableManager {
  connection: Connection,
}

impl TableManager {
  pub fn new(connection: Connection) -> Self {
    Self { connection }
  }

  pub async fn table_exists(&self, name: &str) -> Result<bool> {
    let tables = self
      .connection
      .table_names()
      .execute()
      .await
      .map_err(|e| RetrievalError::store_unavailable(format!("Failed to list tables: {e}")))?;
    Ok(tables.iter().any(|table| table == name))
  }

  pub async fn get_table(&self, name: &str) -> Result<Table> {
    self.connection.open_table(name).execute().await.map_err(|e| match e {
      lancedb::Error::TableNotFound { .. } => RetrievalError::collection_not_found(name),
      other => RetrievalError::storage(format!("Failed to open table '{name}': {other}")),
    })
  }

  pub async fn create_empty_table(&self, name: &str, dimension: usize) -> Result<()> {
    self
      .connection
      .create_empty_table(name, collection_schema(dimension))
      .execute()
      .await
      .map_err(|e| RetrievalError::storage(format!("Failed to create table '{name}': {e}")))?;

    bentley::info!("Created table '{name}' with {dimension}-dimensional embeddings");
    Ok(())
  }

  /// Embedding width of an existing table.
  pub async fn table_dimension(&self, name: &str) -> Result<Option<usize>> {
    let table = self.get_table(name).await?;
    let schema = table
      .schema()
      .await
      .map_err(|e| RetrievalError::storage(format!("Failed to read schema of '{name}': {e}")))?;
    Ok(schema_dimension(&schema))
  }

  pub async fn add_records(&self, name: &str, records: &[CollectionRecord], dimension: usize) -> Result<()> {
    let batch = records_to_arrow_batch(records, dimension)?;
    let schema = batch.schema();
    let batch_iter = RecordBatchIterator::new(vec![Ok(batch)], schema);

    let table = self.get_table(name).await?;
    table
      .add(batch_iter)
      .execute()
      .await
      .map_err(|e| RetrievalError::storage(format!("Failed to add records to '{name}': {e}")))?;
    Ok(())
  }

  pub async fn count_rows(&self, name: &str) -> Result<usize> {
    let table = self.get_table(name).await?;
    table
      .count_rows(None)
      .await
      .map_err(|e| RetrievalError::storage(format!("Failed to count rows in '{name}': {e}")))
  }

  /// Drop a table through the connection; `false` when it did not exist.
  pub async fn remove_table(&self, name: &str) -> Result<bool> {
    match self.connection.drop_table(name, &[]).await {
      Ok(()) => {
        bentley::info!("Dropped table '{name}'");
        Ok(true)
      }
      Err(lancedb::Error::TableNotFound { .. }) => Ok(false),
      Err(e) => Err(RetrievalError::storage(format!("Failed to drop table '{name}': {e}"))),
    }
  }
}
