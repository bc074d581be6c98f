//! Database connection management for LanceDB

use std::path::Path;

use lancedb::{connect, Connection};

use crate::error::{Result, RetrievalError};

/// Create a LanceDB connection, creating the data directory if needed
pub async fn create_connection(data_dir: &Path) -> Result<Connection> {
  ensure_data_directory_exists(data_dir)?;

  connect(&data_dir.to_string_lossy())
    .execute()
    .await
    .map_err(|e| RetrievalError::store_unavailable(format!("Failed to connect to LanceDB: {e}")))
}

fn ensure_data_directory_exists(data_dir: &Path) -> Result<()> {
  if !data_dir.exists() {
    std::fs::create_dir_all(data_dir)?;
  }
  Ok(())
}
