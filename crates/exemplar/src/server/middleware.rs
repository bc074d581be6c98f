//! Request context and middleware for the exemplar REST API
//!
//! Every request gets a `RequestContext` holding its id, method, path and the
//! shared log store, injected as a request extension.

use std::sync::Arc;
use std::time::Instant;

use axum::{
  extract::{Request, State},
  http::{HeaderMap, Method, Uri},
  middleware::Next,
  response::Response,
};
use bentley::daemon_logs::{DaemonLogs, LogContext};
use bentley::Level;
use uuid::Uuid;

#[derive(Clone)]
pub struct RequestContext {
  pub request_id: Uuid,
  pub method: Method,
  pub uri: Uri,
  pub headers: HeaderMap,
  pub logger: Arc<DaemonLogs>,
}

impl RequestContext {
  pub fn new(method: Method, uri: Uri, headers: HeaderMap, logger: Arc<DaemonLogs>) -> Self {
    Self { request_id: Uuid::new_v4(), method, uri, headers, logger }
  }

  pub async fn log_info(&self, message: &str, component: &str) {
    self.log_with_context(Level::Info, message, component, None, None).await;
  }

  pub async fn log_success(&self, message: &str, component: &str) {
    self.log_with_context(Level::Success, message, component, None, None).await;
  }

  pub async fn log_warn(&self, message: &str, component: &str) {
    self.log_with_context(Level::Warn, message, component, None, None).await;
  }

  pub async fn log_error(&self, message: &str, component: &str) {
    self.log_with_context(Level::Error, message, component, None, None).await;
  }

  pub async fn log_with_context(
    &self,
    level: Level,
    message: &str,
    component: &str,
    status_code: Option<u16>,
    duration_ms: Option<f64>,
  ) {
    let user_agent =
      self.headers.get("user-agent").and_then(|v| v.to_str().ok()).map(str::to_string);

    let context = LogContext {
      request_id: Some(self.request_id.to_string()),
      method: Some(self.method.to_string()),
      path: Some(self.uri.path().to_string()),
      user_agent,
      duration_ms,
      status_code,
    };

    self.logger.record(level, message, component, Some(context)).await;
  }

  pub async fn log_request_start(&self) {
    self.log_with_context(Level::Info, "Request started", "http-request", None, None).await;
  }

  pub async fn log_request_complete(&self, status_code: u16, duration_ms: f64) {
    let level = if status_code >= 500 { Level::Error } else { Level::Info };
    self
      .log_with_context(level, "Request completed", "http-request", Some(status_code), Some(duration_ms))
      .await;
  }
}

/// Middleware to inject RequestContext into all requests
pub async fn request_context_middleware(
  State(logger): State<Arc<DaemonLogs>>,
  mut request: Request,
  next: Next,
) -> Response {
  let context = RequestContext::new(
    request.method().clone(),
    request.uri().clone(),
    request.headers().clone(),
    logger,
  );

  let start_time = Instant::now();
  context.log_request_start().await;

  request.extensions_mut().insert(context.clone());
  let response = next.run(request).await;

  let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
  context.log_request_complete(response.status().as_u16(), duration_ms).await;

  response
}
