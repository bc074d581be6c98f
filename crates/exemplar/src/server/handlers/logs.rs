//! Logs endpoint handler

use axum::{
  extract::{Extension, Query},
  http::StatusCode,
  response::Json,
};
use uuid::Uuid;

use crate::server::{
  middleware::RequestContext,
  types::{failure, ApiError, ApiResult, BaseResponse, LogsQuery, LogsResponse},
};

const DEFAULT_LOG_LIMIT: usize = 100;

/// GET /logs?limit=N&level=L - Newest server log entries, oldest first
pub async fn get_logs(
  Extension(context): Extension<RequestContext>,
  Query(query): Query<LogsQuery>,
) -> ApiResult<LogsResponse> {
  let transaction_id = Uuid::new_v4();
  let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT);

  match context.logger.entries(Some(limit), query.level.as_deref()).await {
    Ok(logs) => Ok(Json(BaseResponse::success(LogsResponse { logs }, transaction_id))),
    Err(e) => {
      context.log_error(&format!("Failed to read logs: {e}"), "logs-api").await;
      let error = ApiError::new("logs_read_failed", &format!("Failed to read logs: {e}"));
      Err(failure(StatusCode::INTERNAL_SERVER_ERROR, error, transaction_id))
    }
  }
}
