//! Axum router configuration for all endpoints

use std::sync::Arc;

use axum::{
  middleware,
  routing::{delete, get, post},
  Router,
};
use bentley::daemon_logs::DaemonLogs;

use crate::server::handlers::{collections, logs, retrieval, status};
use crate::server::middleware::request_context_middleware;
use crate::server::services::collections::CollectionManager;
use crate::server::services::orchestrator::RetrievalService;

/// Shared handles for every handler
#[derive(Clone)]
pub struct AppState {
  pub service: Arc<RetrievalService>,

  /// Absent when the server runs without a vector store backend
  pub collections: Option<Arc<CollectionManager>>,

  pub logs: Arc<DaemonLogs>,
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
  let logs = state.logs.clone();

  Router::new()
    // Status and version endpoints
    .route("/status", get(status::status))
    .route("/version", get(status::version))
    .route("/api", get(status::api_info))
    .route("/api/schema", get(status::schema))
    // Logs endpoint
    .route("/logs", get(logs::get_logs))
    // Retrieval endpoints
    .route("/retrieve", post(retrieval::retrieve))
    .route("/retrieve/batch", post(retrieval::retrieve_batch))
    .route("/statistics", get(retrieval::statistics))
    // Collection administration
    .route("/collections", delete(collections::cleanup))
    .route("/collections/setup", post(collections::setup))
    .route("/collections/statistics", get(collections::statistics))
    .layer(middleware::from_fn_with_state(logs, request_context_middleware))
    .with_state(state)
}
