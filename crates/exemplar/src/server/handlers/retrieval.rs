//! Retrieval endpoint handlers

use axum::{
  extract::{Extension, State},
  response::Json,
};
use uuid::Uuid;

use crate::models::RetrievalResult;
use crate::server::middleware::RequestContext;
use crate::server::routing::AppState;
use crate::server::services::orchestrator::ServiceStatistics;
use crate::server::types::{
  retrieval_failure, ApiResult, BaseResponse, BatchRetrieveRequest, BatchRetrieveResponse,
  RetrieveRequest,
};

/// POST /retrieve - Few-shot instruction for one query
pub async fn retrieve(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  Json(request): Json<RetrieveRequest>,
) -> ApiResult<RetrievalResult> {
  let transaction_id = Uuid::new_v4();

  match state.service.retrieve_and_format(&request.query, &request.language).await {
    Ok(result) => {
      context
        .log_success(
          &format!(
            "Retrieved {} sentences and {} entities ({})",
            result.statistics.total_similar_sentences,
            result.statistics.total_entities_found,
            result.language
          ),
          "retrieval-api",
        )
        .await;
      Ok(Json(BaseResponse::success(result, transaction_id)))
    }
    Err(e) => {
      context.log_warn(&format!("Retrieval failed: {e}"), "retrieval-api").await;
      Err(retrieval_failure(&e, transaction_id))
    }
  }
}

/// POST /retrieve/batch - Sequential retrieval; per-query failures stay in place
pub async fn retrieve_batch(
  State(state): State<AppState>,
  Extension(context): Extension<RequestContext>,
  Json(request): Json<BatchRetrieveRequest>,
) -> ApiResult<BatchRetrieveResponse> {
  let transaction_id = Uuid::new_v4();

  let results = state.service.batch_retrieve(&request.queries, &request.language).await;
  let failed = results.iter().filter(|entry| !entry.is_success()).count();

  let summary = format!("Batch of {} queries finished with {failed} failures", results.len());
  if failed == 0 {
    context.log_success(&summary, "retrieval-api").await;
  } else {
    context.log_warn(&summary, "retrieval-api").await;
  }

  Ok(Json(BaseResponse::success(BatchRetrieveResponse { results }, transaction_id)))
}

/// GET /statistics - Service configuration and per-language collection counts
pub async fn statistics(State(state): State<AppState>) -> ApiResult<ServiceStatistics> {
  let statistics = state.service.service_statistics().await;
  Ok(Json(BaseResponse::success(statistics, Uuid::new_v4())))
}
