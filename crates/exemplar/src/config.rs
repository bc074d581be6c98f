//! Configuration management for Exemplar
//!
//! Loads store, retrieval, model and output settings from JSON, falling back to
//! defaults for every missing field.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_ENV_VAR: &str = "EXEMPLAR_CONFIG";
pub const DATA_DIR_ENV_VAR: &str = "EXEMPLAR_DATA_DIR";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExemplarConfig {
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub retrieval: RetrievalConfig,
  #[serde(default)]
  pub model: ModelConfig,
  #[serde(default)]
  pub output: OutputConfig,
}

/// Vector store location and index parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,
  #[serde(default = "default_vector_dim")]
  pub vector_dim: usize,
  #[serde(default = "default_index_type")]
  pub index_type: String,
  #[serde(default = "default_nlist")]
  pub nlist: usize,
  #[serde(default = "default_nprobe")]
  pub nprobe: usize,
  #[serde(default = "default_entity_batch_size")]
  pub entity_batch_size: usize,
  #[serde(default = "default_sentence_batch_size")]
  pub sentence_batch_size: usize,
  /// When set, `/collections/setup` only reads data files inside this directory
  #[serde(default)]
  pub import_dir: Option<PathBuf>,
}

/// Search sizes, pruning and instruction limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
  #[serde(default = "default_top_k")]
  pub top_k_entities: usize,
  #[serde(default = "default_top_k")]
  pub top_k_sentences: usize,
  /// Hits scoring below this are dropped; 0 disables the filter
  #[serde(default)]
  pub similarity_threshold: f32,
  #[serde(default = "default_max_examples")]
  pub max_entities_per_type: usize,
  #[serde(default = "default_max_examples")]
  pub max_examples_in_instruction: usize,
  #[serde(default = "default_search_timeout_ms")]
  pub search_timeout_ms: u64,
  #[serde(default = "default_query_instruction")]
  pub query_instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
  #[serde(default = "default_model_name")]
  pub model_name: String,
  #[serde(default = "default_max_length")]
  pub max_length: usize,
}

/// Shape of enhanced JSONL records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
  #[serde(default = "default_true")]
  pub include_metadata: bool,
  #[serde(default)]
  pub include_similarity_scores: bool,
  #[serde(default = "default_true")]
  pub preserve_original_fields: bool,
  #[serde(default = "default_input_field")]
  pub input_field: String,
}

fn default_data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var(DATA_DIR_ENV_VAR) {
    return PathBuf::from(dir);
  }
  dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".exemplar").join("vectors")
}
fn default_vector_dim() -> usize {
  4096
}
fn default_index_type() -> String {
  "IVF_FLAT".to_string()
}
fn default_nlist() -> usize {
  1024
}
fn default_nprobe() -> usize {
  10
}
fn default_entity_batch_size() -> usize {
  1000
}
fn default_sentence_batch_size() -> usize {
  500
}
fn default_top_k() -> usize {
  5
}
fn default_max_examples() -> usize {
  5
}
fn default_search_timeout_ms() -> u64 {
  10_000
}
fn default_query_instruction() -> String {
  "Given a text, retrieve relevant named entities:".to_string()
}
fn default_model_name() -> String {
  "onnx-community/embeddinggemma-300m-ONNX".to_string()
}
fn default_max_length() -> usize {
  512
}
fn default_true() -> bool {
  true
}
fn default_input_field() -> String {
  "input".to_string()
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      vector_dim: default_vector_dim(),
      index_type: default_index_type(),
      nlist: default_nlist(),
      nprobe: default_nprobe(),
      entity_batch_size: default_entity_batch_size(),
      sentence_batch_size: default_sentence_batch_size(),
      import_dir: None,
    }
  }
}

impl Default for RetrievalConfig {
  fn default() -> Self {
    Self {
      top_k_entities: default_top_k(),
      top_k_sentences: default_top_k(),
      similarity_threshold: 0.0,
      max_entities_per_type: default_max_examples(),
      max_examples_in_instruction: default_max_examples(),
      search_timeout_ms: default_search_timeout_ms(),
      query_instruction: default_query_instruction(),
    }
  }
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self { model_name: default_model_name(), max_length: default_max_length() }
  }
}

impl Default for OutputConfig {
  fn default() -> Self {
    Self {
      include_metadata: true,
      include_similarity_scores: false,
      preserve_original_fields: true,
      input_field: default_input_field(),
    }
  }
}

impl ExemplarConfig {
  /// Load configuration from a file
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: ExemplarConfig = serde_json::from_str(&content)
      .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config.validate()?;
    Ok(config)
  }

  /// Load configuration from an explicit path, `EXEMPLAR_CONFIG`, the current
  /// directory, or defaults, in that order.
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    if let Some(path) = explicit {
      return Self::load_from_file(path);
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
      return Self::load_from_file(path);
    }

    let config_paths = [".exemplar.json", "exemplar.json", ".exemplar/config.json"];
    for path in &config_paths {
      if Path::new(path).exists() {
        return Self::load_from_file(path);
      }
    }

    Ok(ExemplarConfig::default())
  }

  /// Save configuration to a file
  pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(self)?;
    std::fs::write(path, content)?;
    Ok(())
  }

  /// Reject settings that would make every retrieval empty or meaningless.
  pub fn validate(&self) -> Result<()> {
    let retrieval = &self.retrieval;
    if retrieval.top_k_entities == 0 || retrieval.top_k_sentences == 0 {
      return Err(anyhow!("top_k_entities and top_k_sentences must be at least 1"));
    }
    if !(0.0..=1.0).contains(&retrieval.similarity_threshold) {
      return Err(anyhow!(
        "similarity_threshold must be within [0, 1], got {}",
        retrieval.similarity_threshold
      ));
    }
    if retrieval.search_timeout_ms == 0 {
      return Err(anyhow!("search_timeout_ms must be positive"));
    }

    let store = &self.store;
    if store.vector_dim == 0 {
      return Err(anyhow!("vector_dim must be positive"));
    }
    if store.entity_batch_size == 0 || store.sentence_batch_size == 0 {
      return Err(anyhow!("ingest batch sizes must be at least 1"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod config_tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  #[test]
  fn test_defaults() {
    let config = ExemplarConfig::default();
    assert_eq!(config.store.vector_dim, 4096);
    assert_eq!(config.store.index_type, "IVF_FLAT");
    assert_eq!(config.store.nlist, 1024);
    assert_eq!(config.store.nprobe, 10);
    assert_eq!(config.retrieval.top_k_entities, 5);
    assert_eq!(config.retrieval.top_k_sentences, 5);
    assert_eq!(config.retrieval.max_examples_in_instruction, 5);
    assert_eq!(config.retrieval.similarity_threshold, 0.0);
    assert_eq!(config.output.input_field, "input");
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_file_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exemplar.json");
    std::fs::write(&path, r#"{"retrieval": {"top_k_entities": 3, "similarity_threshold": 0.4}}"#)
      .unwrap();

    let config = ExemplarConfig::load_from_file(&path).unwrap();
    assert_eq!(config.retrieval.top_k_entities, 3);
    assert_eq!(config.retrieval.top_k_sentences, 5);
    assert!((config.retrieval.similarity_threshold - 0.4).abs() < f32::EPSILON);
    assert_eq!(config.store.entity_batch_size, 1000);
  }

  #[test]
  fn test_invalid_threshold_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("exemplar.json");
    std::fs::write(&path, r#"{"retrieval": {"similarity_threshold": 1.5}}"#).unwrap();

    let err = ExemplarConfig::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("similarity_threshold"));
  }

  #[test]
  fn test_save_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("saved.json");
    let mut config = ExemplarConfig::default();
    config.retrieval.top_k_sentences = 9;
    config.save_to_file(&path).unwrap();

    assert_eq!(ExemplarConfig::load_from_file(&path).unwrap(), config);
  }

  #[test]
  #[serial]
  fn test_env_var_points_at_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("from_env.json");
    std::fs::write(&path, r#"{"model": {"max_length": 128}}"#).unwrap();

    std::env::set_var(CONFIG_ENV_VAR, &path);
    let config = ExemplarConfig::load(None);
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().model.max_length, 128);
  }
}
