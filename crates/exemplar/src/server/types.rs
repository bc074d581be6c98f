//! REST API types with schemars annotations for schema generation

use axum::{http::StatusCode, response::Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RetrievalError;
use crate::models::BatchEntry;
use crate::server::services::collections::{DatabaseStatistics, SetupReport};

// Base Response Structure
// ======================

/// Base response object for all API endpoints
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BaseResponse<T> {
  /// API versioning information
  pub versioning: VersionInfo,

  /// Transaction ID for logging correlation
  pub transaction_id: Uuid,

  /// Optional error information
  #[serde(skip_serializing_if = "Vec::is_empty", default)]
  pub errors: Vec<ApiError>,

  /// Response data (generic for different endpoint types)
  #[serde(flatten)]
  pub data: T,
}

/// API versioning information
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionInfo {
  pub latest: String,
  pub requested: String,
  pub resolved: String,
}

/// API error information
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiError {
  /// Error key, stable across releases
  pub key: String,

  /// Human readable error message
  pub message: String,

  /// Additional error context
  #[serde(default)]
  pub context: serde_json::Value,
}

/// Error half of every handler's return type
pub type ApiFailure = (StatusCode, Json<BaseResponse<()>>);

pub type ApiResult<T> = Result<Json<BaseResponse<T>>, ApiFailure>;

// Status/Version Endpoints
// =======================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StatusResponse {
  /// `healthy` once the retrieval backends are attached, `degraded` before
  pub status: String,

  /// Retrieval service lifecycle state
  pub service_state: String,

  pub version: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct VersionResponse {
  pub version: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiInfoResponse {
  pub latest: String,
  pub versions: ApiVersions,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ApiVersions {
  pub latest: String,
  pub active: Vec<String>,
}

/// JSON schemas of the retrieval request and response bodies
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SchemaResponse {
  pub schemas: serde_json::Map<String, serde_json::Value>,
}

// Logs Endpoint
// =============

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LogsQuery {
  /// Maximum entries to return, newest kept
  pub limit: Option<usize>,

  /// Level filter, `all` for every level
  pub level: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LogsResponse {
  pub logs: Vec<LogEntry>,
}

/// Individual log entry (re-exported from bentley)
pub type LogEntry = bentley::daemon_logs::LogEntry;

/// Request context information for logs (re-exported from bentley)
pub type LogContext = bentley::daemon_logs::LogContext;

// Retrieval Endpoints
// ===================

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RetrieveRequest {
  pub query: String,

  /// Two-letter language code
  pub language: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BatchRetrieveRequest {
  pub queries: Vec<String>,
  pub language: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct BatchRetrieveResponse {
  /// One entry per query, in request order
  pub results: Vec<BatchEntry>,
}

// Collection Endpoints
// ====================

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct SetupRequest {
  /// Server-side path of the entities JSON file
  pub entities_file: Option<String>,

  /// Server-side path of the sentences JSON file
  pub sentences_file: Option<String>,

  /// Language codes to set up; all supported languages when omitted
  pub languages: Option<Vec<String>>,

  #[serde(default)]
  pub recreate: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SetupResponse {
  pub report: SetupReport,
}

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct CleanupRequest {
  pub languages: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CleanupResponse {
  pub dropped: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CollectionStatisticsResponse {
  pub statistics: DatabaseStatistics,
}

// Helper Functions
// ================

fn version_info() -> VersionInfo {
  let version = env!("CARGO_PKG_VERSION");
  VersionInfo {
    latest: version.to_string(),
    requested: version.to_string(),
    resolved: version.to_string(),
  }
}

impl<T> BaseResponse<T> {
  /// Create a successful response
  pub fn success(data: T, transaction_id: Uuid) -> Self {
    Self { versioning: version_info(), transaction_id, errors: Vec::new(), data }
  }

  /// Create an error response
  pub fn error(errors: Vec<ApiError>, transaction_id: Uuid) -> BaseResponse<()> {
    BaseResponse { versioning: version_info(), transaction_id, errors, data: () }
  }
}

impl ApiError {
  pub fn new(key: &str, message: &str) -> Self {
    Self { key: key.to_string(), message: message.to_string(), context: serde_json::Value::Null }
  }
}

impl From<&RetrievalError> for ApiError {
  fn from(error: &RetrievalError) -> Self {
    ApiError::new(error.kind(), &error.to_string())
  }
}

/// HTTP status for a retrieval failure.
pub fn status_for(error: &RetrievalError) -> StatusCode {
  match error {
    RetrievalError::InvalidInput { .. } | RetrievalError::UnsupportedLanguage { .. } => {
      StatusCode::BAD_REQUEST
    }
    RetrievalError::CollectionNotFound { .. } => StatusCode::NOT_FOUND,
    RetrievalError::NotInitialized
    | RetrievalError::ServiceClosed
    | RetrievalError::StoreUnavailable { .. }
    | RetrievalError::SearchTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

/// Wrap a single error in the response envelope.
pub fn failure(status: StatusCode, error: ApiError, transaction_id: Uuid) -> ApiFailure {
  (status, Json(BaseResponse::<()>::error(vec![error], transaction_id)))
}

pub fn retrieval_failure(error: &RetrievalError, transaction_id: Uuid) -> ApiFailure {
  failure(status_for(error), ApiError::from(error), transaction_id)
}

#[cfg(test)]
mod types_tests {
  use super::*;

  #[test]
  fn test_status_mapping() {
    assert_eq!(status_for(&RetrievalError::unsupported_language("xx")), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(&RetrievalError::invalid_input("empty")), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(&RetrievalError::collection_not_found("entity_en")), StatusCode::NOT_FOUND);
    assert_eq!(status_for(&RetrievalError::NotInitialized), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
      status_for(&RetrievalError::search_timeout("sentence_en", 10)),
      StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(status_for(&RetrievalError::storage("disk")), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn test_error_envelope_serialization() {
    let error = ApiError::from(&RetrievalError::unsupported_language("xx"));
    let response = BaseResponse::<()>::error(vec![error], Uuid::new_v4());
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["errors"][0]["key"], "unsupported_language");
    assert_eq!(json["versioning"]["latest"], env!("CARGO_PKG_VERSION"));
  }

  #[test]
  fn test_success_envelope_flattens_data() {
    let response = BaseResponse::success(VersionResponse { version: "1.0".into() }, Uuid::new_v4());
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["version"], "1.0");
    assert!(json.get("errors").is_none());
  }
}
