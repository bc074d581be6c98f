//! REST server startup and configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::serve;
use bentley::daemon_logs::DaemonLogs;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ExemplarConfig;
use crate::server::routing::{create_router, AppState};
use crate::server::services::collections::CollectionManager;
use crate::server::services::orchestrator::RetrievalService;

const COMPONENT: &str = "exemplar-server";

/// Start the REST server
pub async fn start_server(addr: SocketAddr, config: ExemplarConfig) -> Result<()> {
  let daemon_logs = Arc::new(DaemonLogs::new(server_logs_path())?);
  daemon_logs.info(&format!("Starting exemplar REST server on {addr}"), COMPONENT).await;

  let service = Arc::new(RetrievalService::new(&config));
  let collections = attach_backends(&service, &config, &daemon_logs).await;

  let state = AppState { service: service.clone(), collections, logs: daemon_logs.clone() };
  let app = create_router(state).layer(
    ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()),
  );

  let listener = TcpListener::bind(addr).await?;
  daemon_logs.info(&format!("Server listening on {addr}"), COMPONENT).await;

  let outcome = serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;
  service.close();

  match outcome {
    Ok(()) => {
      daemon_logs.info("Server shutdown gracefully", COMPONENT).await;
      Ok(())
    }
    Err(e) => {
      daemon_logs.error(&format!("Server error: {e}"), COMPONENT).await;
      Err(anyhow!("Server error: {e}"))
    }
  }
}

/// Load the embedding model and open the vector store, then hand both to the service.
///
/// Failures leave the service uninitialized; retrieval endpoints answer 503.
#[cfg(feature = "ml-features")]
#[cfg(not(tarpaulin_include))]
async fn attach_backends(
  service: &RetrievalService,
  config: &ExemplarConfig,
  logs: &DaemonLogs,
) -> Option<Arc<CollectionManager>> {
  use crate::server::services::embeddings::EmbeddingProvider;
  use crate::server::services::lancedb::LanceDbVectorStore;
  use crate::server::services::onnx::OnnxEmbeddingProvider;
  use crate::server::services::vector_store::VectorStore;

  let embedder: Arc<dyn EmbeddingProvider> = match OnnxEmbeddingProvider::load(&config.model).await {
    Ok(provider) => Arc::new(provider),
    Err(e) => {
      logs.error(&format!("Failed to load embedding model: {e}"), COMPONENT).await;
      return None;
    }
  };

  let store: Arc<dyn VectorStore> =
    match LanceDbVectorStore::open(config.store.data_dir.clone(), config.store.nprobe).await {
      Ok(store) => Arc::new(store),
      Err(e) => {
        logs.error(&format!("Failed to open vector store: {e}"), COMPONENT).await;
        return None;
      }
    };

  if let Err(e) = service.initialize(embedder.clone(), store.clone()) {
    logs.error(&format!("Failed to initialize retrieval service: {e}"), COMPONENT).await;
    return None;
  }

  logs.success("Retrieval backends attached", COMPONENT).await;
  Some(Arc::new(CollectionManager::new(embedder, store, config.store.clone())))
}

#[cfg(not(feature = "ml-features"))]
async fn attach_backends(
  _service: &RetrievalService,
  _config: &ExemplarConfig,
  logs: &DaemonLogs,
) -> Option<Arc<CollectionManager>> {
  logs
    .warn("ML features not available; rebuild with --features ml-features to serve retrievals", COMPONENT)
    .await;
  None
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    bentley::warn!("Failed to listen for shutdown signal: {e}");
    std::future::pending::<()>().await;
  }
}

fn server_logs_path() -> PathBuf {
  dirs::home_dir()
    .unwrap_or_else(std::env::temp_dir)
    .join(".exemplar")
    .join("server.logs.jsonl")
}
