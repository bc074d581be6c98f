//! HTTP client for the exemplar REST API
//!
//! The CLI is a thin client: every command is one request to a running
//! `exemplar_server`.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use crate::models::RetrievalResult;
use crate::server::services::collections::{DatabaseStatistics, SetupReport};
use crate::server::services::orchestrator::ServiceStatistics;
use crate::server::types::{
  BaseResponse, BatchRetrieveRequest, BatchRetrieveResponse, CleanupRequest, CleanupResponse,
  CollectionStatisticsResponse, LogEntry, LogsResponse, RetrieveRequest, SetupRequest,
  SetupResponse, StatusResponse,
};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:3030";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for the exemplar HTTP client
#[derive(Debug, Clone)]
pub struct ClientConfig {
  /// Base URL of the server, e.g. `http://localhost:3030`
  pub base_url: String,
  /// Request timeout in seconds
  pub timeout_secs: u64,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self { base_url: DEFAULT_SERVER_URL.to_string(), timeout_secs: DEFAULT_TIMEOUT_SECS }
  }
}

impl ClientConfig {
  /// `EXEMPLAR_SERVER_URL` and `EXEMPLAR_TIMEOUT_SECS`, with an explicit URL taking precedence.
  pub fn from_env(server: Option<&str>) -> Self {
    let base_url = server
      .map(str::to_string)
      .or_else(|| std::env::var("EXEMPLAR_SERVER_URL").ok())
      .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

    let timeout_secs = std::env::var("EXEMPLAR_TIMEOUT_SECS")
      .ok()
      .and_then(|value| value.parse().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Self { base_url: base_url.trim_end_matches('/').to_string(), timeout_secs }
  }
}

pub struct ExemplarClient {
  client: Client,
  config: ClientConfig,
}

impl ExemplarClient {
  pub fn with_config(config: ClientConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .context("Failed to create HTTP client")?;

    Ok(Self { client, config })
  }

  pub fn base_url(&self) -> &str {
    &self.config.base_url
  }

  pub async fn status(&self) -> Result<StatusResponse> {
    self.send(self.client.get(self.url("/status")), "fetch status").await
  }

  pub async fn logs(&self, limit: usize, level: &str) -> Result<Vec<LogEntry>> {
    let request =
      self.client.get(self.url("/logs")).query(&[("limit", limit.to_string()), ("level", level.to_string())]);
    let response: LogsResponse = self.send(request, "fetch logs").await?;
    Ok(response.logs)
  }

  pub async fn retrieve(&self, query: &str, language: &str) -> Result<RetrievalResult> {
    let body = RetrieveRequest { query: query.to_string(), language: language.to_string() };
    self.send(self.client.post(self.url("/retrieve")).json(&body), "retrieve").await
  }

  pub async fn batch_retrieve(&self, queries: &[String], language: &str) -> Result<BatchRetrieveResponse> {
    let body = BatchRetrieveRequest { queries: queries.to_vec(), language: language.to_string() };
    self.send(self.client.post(self.url("/retrieve/batch")).json(&body), "run batch").await
  }

  pub async fn statistics(&self) -> Result<ServiceStatistics> {
    self.send(self.client.get(self.url("/statistics")), "fetch statistics").await
  }

  pub async fn collection_statistics(&self) -> Result<DatabaseStatistics> {
    let response: CollectionStatisticsResponse =
      self.send(self.client.get(self.url("/collections/statistics")), "fetch collection statistics").await?;
    Ok(response.statistics)
  }

  pub async fn setup(&self, request: &SetupRequest) -> Result<SetupReport> {
    let response: SetupResponse =
      self.send(self.client.post(self.url("/collections/setup")).json(request), "set up collections").await?;
    Ok(response.report)
  }

  pub async fn cleanup(&self, languages: Option<Vec<String>>) -> Result<Vec<String>> {
    let body = CleanupRequest { languages };
    let response: CleanupResponse =
      self.send(self.client.delete(self.url("/collections")).json(&body), "clean up collections").await?;
    Ok(response.dropped)
  }

  fn url(&self, path: &str) -> String {
    format!("{}{path}", self.config.base_url)
  }

  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, action: &str) -> Result<T> {
    let response = timeout(Duration::from_secs(self.config.timeout_secs), request.send())
      .await
      .map_err(|_| anyhow!("Timed out trying to {action} after {}s", self.config.timeout_secs))?
      .with_context(|| format!("Could not reach exemplar server at {}", self.config.base_url))?;

    if !response.status().is_success() {
      let status = response.status();
      let error_text = response.text().await?;
      return Err(anyhow!("Failed to {action} ({status}): {}", error_message(&error_text)));
    }

    let body: BaseResponse<T> = response.json().await?;
    Ok(body.data)
  }
}

pub fn get_client(server: Option<&str>) -> Result<ExemplarClient> {
  ExemplarClient::with_config(ClientConfig::from_env(server))
}

/// First error message of an error envelope, or the raw body.
fn error_message(body: &str) -> String {
  serde_json::from_str::<BaseResponse<()>>(body)
    .ok()
    .and_then(|response| response.errors.into_iter().next())
    .map(|error| format!("{} [{}]", error.message, error.key))
    .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod client_tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn test_explicit_server_wins_over_env() {
    std::env::set_var("EXEMPLAR_SERVER_URL", "http://env:1");
    let config = ClientConfig::from_env(Some("http://explicit:2/"));
    assert_eq!(config.base_url, "http://explicit:2");

    let config = ClientConfig::from_env(None);
    assert_eq!(config.base_url, "http://env:1");
    std::env::remove_var("EXEMPLAR_SERVER_URL");
  }

  #[test]
  #[serial]
  fn test_timeout_falls_back_on_garbage() {
    std::env::set_var("EXEMPLAR_TIMEOUT_SECS", "soon");
    assert_eq!(ClientConfig::from_env(None).timeout_secs, DEFAULT_TIMEOUT_SECS);
    std::env::remove_var("EXEMPLAR_TIMEOUT_SECS");
  }

  #[test]
  fn test_error_message_prefers_envelope() {
    let body = r#"{"versioning":{"latest":"1","requested":"1","resolved":"1"},
      "transaction_id":"6f1c4c5e-4a43-4b8e-9f7e-2a0c1e1d2b3c",
      "errors":[{"key":"unsupported_language","message":"Unsupported language: xx"}]}"#;
    assert_eq!(error_message(body), "Unsupported language: xx [unsupported_language]");
    assert_eq!(error_message("plain failure"), "plain failure");
  }
}
