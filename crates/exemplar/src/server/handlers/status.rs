//! Status and version endpoint handlers

use axum::{extract::State, response::Json};
use schemars::schema_for;
use uuid::Uuid;

use crate::models::RetrievalResult;
use crate::server::routing::AppState;
use crate::server::types::{
  ApiInfoResponse, ApiVersions, BaseResponse, BatchRetrieveRequest, BatchRetrieveResponse,
  RetrieveRequest, SchemaResponse, StatusResponse, VersionResponse,
};

/// GET /status - Health check endpoint
pub async fn status(State(state): State<AppState>) -> Json<BaseResponse<StatusResponse>> {
  let service_state = state.service.state_name();
  let response = StatusResponse {
    status: if state.service.is_ready() { "healthy" } else { "degraded" }.to_string(),
    service_state: service_state.to_string(),
    version: env!("CARGO_PKG_VERSION").to_string(),
  };

  Json(BaseResponse::success(response, Uuid::new_v4()))
}

/// GET /version - Returns current API version
pub async fn version() -> Json<BaseResponse<VersionResponse>> {
  let response = VersionResponse { version: env!("CARGO_PKG_VERSION").to_string() };
  Json(BaseResponse::success(response, Uuid::new_v4()))
}

/// GET /api - Returns API information and supported versions
pub async fn api_info() -> Json<BaseResponse<ApiInfoResponse>> {
  let version = env!("CARGO_PKG_VERSION");
  let response = ApiInfoResponse {
    latest: version.to_string(),
    versions: ApiVersions { latest: version.to_string(), active: vec![version.to_string()] },
  };

  Json(BaseResponse::success(response, Uuid::new_v4()))
}

/// GET /api/schema - JSON schemas for the retrieval bodies
pub async fn schema() -> Json<BaseResponse<SchemaResponse>> {
  let mut schemas = serde_json::Map::new();
  let documents = [
    ("RetrieveRequest", serde_json::to_value(schema_for!(RetrieveRequest))),
    ("RetrievalResult", serde_json::to_value(schema_for!(RetrievalResult))),
    ("BatchRetrieveRequest", serde_json::to_value(schema_for!(BatchRetrieveRequest))),
    ("BatchRetrieveResponse", serde_json::to_value(schema_for!(BatchRetrieveResponse))),
  ];

  for (name, document) in documents {
    match document {
      Ok(value) => {
        schemas.insert(name.to_string(), value);
      }
      Err(e) => bentley::warn!("Could not serialize schema for {name}: {e}"),
    }
  }

  Json(BaseResponse::success(SchemaResponse { schemas }, Uuid::new_v4()))
}
