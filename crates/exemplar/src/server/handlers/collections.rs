//! Collection administration handlers

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
  extract::{Extension, State},
  http::StatusCode,
  response::Json,
};
use uuid::Uuid;

use crate::models::Language;
use crate::server::middleware::RequestContext;
use crate::server::routing::AppState;
use crate::server::services::collections::CollectionManager;
use crate::server::types::{
  failure, retrieval_failure, ApiError, ApiFailure, ApiResult, BaseResponse, CleanupRequest,
  CleanupResponse, CollectionStatisticsResponse, SetupRequest, SetupResponse,
};

/// POST /collections/setup - Create collections and import reference data
///
/// Admin endpoint: data files are read on the server. Configure
/// `store.import_dir` to confine them to one directory.
pub async fn setup(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  Json(request): Json<SetupRequest>,
) -> ApiResult<SetupResponse> {
  let transaction_id = Uuid::new_v4();
  let manager = require_manager(&state, transaction_id)?;
  let languages = parse_languages(request.languages.as_deref(), transaction_id)?;

  let resolve = |requested: Option<String>| -> Result<Option<PathBuf>, ApiFailure> {
    requested
      .map(|path| manager.resolve_import_path(&path))
      .transpose()
      .map_err(|e| retrieval_failure(&e, transaction_id))
  };
  let entities = resolve(request.entities_file)?;
  let sentences = resolve(request.sentences_file)?;

  match manager.setup(entities.as_deref(), sentences.as_deref(), &languages, request.recreate).await {
    Ok(report) => {
      context
        .log_success(&format!("Set up collections for {} languages", languages.len()), "collections-api")
        .await;
      Ok(Json(BaseResponse::success(SetupResponse { report }, transaction_id)))
    }
    Err(e) => {
      context.log_error(&format!("Collection setup failed: {e}"), "collections-api").await;
      Err(retrieval_failure(&e, transaction_id))
    }
  }
}

/// DELETE /collections - Drop both collections of each language
pub async fn cleanup(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  Json(request): Json<CleanupRequest>,
) -> ApiResult<CleanupResponse> {
  let transaction_id = Uuid::new_v4();
  let manager = require_manager(&state, transaction_id)?;
  let languages = parse_languages(request.languages.as_deref(), transaction_id)?;

  match manager.cleanup(&languages).await {
    Ok(dropped) => {
      context.log_info(&format!("Dropped {} collections", dropped.len()), "collections-api").await;
      Ok(Json(BaseResponse::success(CleanupResponse { dropped }, transaction_id)))
    }
    Err(e) => {
      context.log_error(&format!("Collection cleanup failed: {e}"), "collections-api").await;
      Err(retrieval_failure(&e, transaction_id))
    }
  }
}

/// GET /collections/statistics - Record counts for every supported language
pub async fn statistics(State(state): State<AppState>) -> ApiResult<CollectionStatisticsResponse> {
  let transaction_id = Uuid::new_v4();
  let manager = require_manager(&state, transaction_id)?;

  manager
    .statistics(&Language::ALL)
    .await
    .map(|statistics| {
      Json(BaseResponse::success(CollectionStatisticsResponse { statistics }, transaction_id))
    })
    .map_err(|e| retrieval_failure(&e, transaction_id))
}

fn require_manager(
  state: &AppState,
  transaction_id: Uuid,
) -> Result<Arc<CollectionManager>, ApiFailure> {
  state.collections.clone().ok_or_else(|| {
    let error =
      ApiError::new("collections_unavailable", "No vector store backend is attached to this server");
    failure(StatusCode::SERVICE_UNAVAILABLE, error, transaction_id)
  })
}

fn parse_languages(codes: Option<&[String]>, transaction_id: Uuid) -> Result<Vec<Language>, ApiFailure> {
  let Some(codes) = codes else {
    return Ok(Language::ALL.to_vec());
  };

  codes
    .iter()
    .map(|code| code.parse::<Language>())
    .collect::<crate::error::Result<Vec<_>>>()
    .map_err(|e| retrieval_failure(&e, transaction_id))
}
