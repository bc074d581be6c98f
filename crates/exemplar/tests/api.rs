mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use bentley::daemon_logs::DaemonLogs;
use common::{obama_store, StubEmbedder, OBAMA_SENTENCE};
use exemplar::config::ExemplarConfig;
use exemplar::server::routing::{create_router, AppState};
use exemplar::server::services::collections::CollectionManager;
use exemplar::server::services::memory_store::InMemoryVectorStore;
use exemplar::server::services::orchestrator::RetrievalService;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestServer {
  router: Router,
  logs: Arc<DaemonLogs>,
  _dir: TempDir,
}

fn server(service: RetrievalService, collections: Option<Arc<CollectionManager>>) -> TestServer {
  let dir = TempDir::new().unwrap();
  let logs = Arc::new(DaemonLogs::silent(dir.path().join("server.logs.jsonl")).unwrap());
  let state = AppState { service: Arc::new(service), collections, logs: logs.clone() };
  TestServer { router: create_router(state), logs, _dir: dir }
}

fn ready_server() -> TestServer {
  let service = RetrievalService::new(&ExemplarConfig::default());
  service.initialize(Arc::new(StubEmbedder), Arc::new(obama_store())).unwrap();
  server(service, None)
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
  let builder = Request::builder().method(method).uri(uri);
  let request = match body {
    Some(body) => builder
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let response = router.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
  let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, json)
}

#[tokio::test]
async fn test_status_reports_degraded_until_initialized() {
  let server = server(RetrievalService::new(&ExemplarConfig::default()), None);

  let (status, body) = call(&server.router, "GET", "/status", None).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "degraded");
  assert_eq!(body["service_state"], "uninitialized");
  assert!(body["transaction_id"].is_string());
}

#[tokio::test]
async fn test_retrieve_before_initialization_is_unavailable() {
  let server = server(RetrievalService::new(&ExemplarConfig::default()), None);

  let (status, body) =
    call(&server.router, "POST", "/retrieve", Some(json!({"query": "hi", "language": "en"}))).await;

  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["errors"][0]["key"], "not_initialized");
}

#[tokio::test]
async fn test_retrieve_returns_result_in_envelope() {
  let server = ready_server();

  let (status, body) = call(
    &server.router,
    "POST",
    "/retrieve",
    Some(json!({"query": OBAMA_SENTENCE, "language": "en"})),
  )
  .await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["language"], "en");
  assert_eq!(body["statistics"]["total_entities_found"], 2);
  assert_eq!(body["entity_results"].as_object().unwrap().len(), 8);
  assert!(body["instruction"].as_str().unwrap().ends_with(&format!("Input: {OBAMA_SENTENCE}")));
}

#[tokio::test]
async fn test_retrieve_rejects_unsupported_language() {
  let server = ready_server();

  let (status, body) =
    call(&server.router, "POST", "/retrieve", Some(json!({"query": "hola", "language": "xx"}))).await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["errors"][0]["key"], "unsupported_language");
}

#[tokio::test]
async fn test_batch_returns_one_entry_per_query() {
  let server = ready_server();

  let (status, body) = call(
    &server.router,
    "POST",
    "/retrieve/batch",
    Some(json!({"queries": [OBAMA_SENTENCE, "unreachable", "Hawaii"], "language": "en"})),
  )
  .await;

  assert_eq!(status, StatusCode::OK);
  let results = body["results"].as_array().unwrap();
  assert_eq!(results.len(), 3);
  assert!(results[0]["instruction"].is_string());
  assert_eq!(results[1]["error_kind"], "store_unavailable");
  assert!(results[2]["instruction"].is_string());
}

#[tokio::test]
async fn test_statistics_endpoint() {
  let server = ready_server();

  let (status, body) = call(&server.router, "GET", "/statistics", None).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["service_status"], "ready");
  assert_eq!(body["database_statistics"]["en"]["entities"], 2);
}

#[tokio::test]
async fn test_collection_routes_without_backend() {
  let server = ready_server();

  let (status, body) =
    call(&server.router, "POST", "/collections/setup", Some(json!({"recreate": false}))).await;

  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["errors"][0]["key"], "collections_unavailable");
}

#[tokio::test]
async fn test_setup_and_cleanup_with_in_memory_store() {
  let store = Arc::new(InMemoryVectorStore::new());
  let mut config = ExemplarConfig::default();
  config.store.vector_dim = 2;
  let manager = Arc::new(CollectionManager::new(Arc::new(StubEmbedder), store.clone(), config.store.clone()));

  let service = RetrievalService::new(&config);
  service.initialize(Arc::new(StubEmbedder), store).unwrap();
  let server = server(service, Some(manager));

  let data = TempDir::new().unwrap();
  let entities = data.path().join("entities.json");
  std::fs::write(&entities, r#"{"en": {"PERSON": ["Barack Obama", "Angela Merkel"]}}"#).unwrap();

  let (status, body) = call(
    &server.router,
    "POST",
    "/collections/setup",
    Some(json!({"entities_file": entities, "languages": ["en"], "recreate": true})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["report"]["entities_imported"]["en"], 2);

  let (status, body) = call(&server.router, "GET", "/collections/statistics", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["statistics"]["total_entities"], 2);

  let (status, body) = call(
    &server.router,
    "POST",
    "/retrieve",
    Some(json!({"query": "Obama", "language": "en"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["entity_results"]["PERSON"].as_array().unwrap().len(), 2);

  let (status, body) =
    call(&server.router, "DELETE", "/collections", Some(json!({"languages": ["en"]}))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["dropped"], json!(["entity_en", "sentence_en"]));
}

#[tokio::test]
async fn test_setup_reads_only_inside_import_dir() {
  let imports = TempDir::new().unwrap();
  let outside = TempDir::new().unwrap();
  std::fs::write(imports.path().join("entities.json"), r#"{"en": {"PERSON": ["Barack Obama"]}}"#)
    .unwrap();
  let stray = outside.path().join("entities.json");
  std::fs::write(&stray, r#"{"en": {"PERSON": ["Nobody"]}}"#).unwrap();

  let store = Arc::new(InMemoryVectorStore::new());
  let mut config = ExemplarConfig::default();
  config.store.vector_dim = 2;
  config.store.import_dir = Some(imports.path().to_path_buf());
  let manager = Arc::new(CollectionManager::new(Arc::new(StubEmbedder), store.clone(), config.store.clone()));
  let service = RetrievalService::new(&config);
  service.initialize(Arc::new(StubEmbedder), store).unwrap();
  let server = server(service, Some(manager));

  let (status, body) = call(
    &server.router,
    "POST",
    "/collections/setup",
    Some(json!({"entities_file": stray, "languages": ["en"]})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["errors"][0]["key"], "invalid_input");

  let (status, body) = call(
    &server.router,
    "POST",
    "/collections/setup",
    Some(json!({"entities_file": "entities.json", "languages": ["en"]})),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["report"]["entities_imported"]["en"], 1);
}

#[tokio::test]
async fn test_requests_are_logged_with_context() {
  let server = ready_server();

  call(&server.router, "GET", "/version", None).await;

  let entries = server.logs.entries(None, None).await.unwrap();
  let completed = entries.iter().find(|entry| entry.message == "Request completed").unwrap();
  let context = completed.context.as_ref().unwrap();
  assert_eq!(context.path.as_deref(), Some("/version"));
  assert_eq!(context.status_code, Some(200));

  let (status, body) = call(&server.router, "GET", "/logs?limit=1&level=info", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["logs"].as_array().unwrap().len(), 1);
}
