//! ONNX Runtime embedding provider backed by a Hugging Face model repository.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use hf_hub::api::tokio::{Api, ApiRepo};
use ndarray::Array2;
use tokenizers::Tokenizer;

#[cfg(target_os = "linux")]
use ort::execution_providers::CUDAExecutionProvider;
#[cfg(target_os = "macos")]
use ort::execution_providers::CoreMLExecutionProvider;
use ort::{
  execution_providers::{CPUExecutionProvider, ExecutionProviderDispatch},
  session::Session,
  value::Value,
};

use super::embeddings::{mean_pool, normalize_embedding, EmbeddingProvider};
use crate::config::ModelConfig;
use crate::error::{Result, RetrievalError};

const TOKENIZER_FILE: &str = "tokenizer.json";
const MODEL_FILE: &str = "onnx/model.onnx";
const EXTERNAL_DATA_FILE: &str = "onnx/model.onnx_data";

struct ModelFiles {
  tokenizer_file: PathBuf,
  model_path: PathBuf,
}

pub struct OnnxEmbeddingProvider {
  session: Mutex<Session>,
  tokenizer: Tokenizer,
  input_names: Vec<String>,
  max_length: usize,
  dimension: usize,
}

#[cfg(not(tarpaulin_include))]
impl OnnxEmbeddingProvider {
  /// Download (or reuse the cached) model and probe its output width.
  pub async fn load(config: &ModelConfig) -> Result<Self> {
    bentley::info!("Loading embedding model {}...", config.model_name);

    let files = download_model(&config.model_name).await?;
    let tokenizer = Tokenizer::from_file(&files.tokenizer_file)
      .map_err(|e| RetrievalError::encoding(format!("Failed to load tokenizer: {e}")))?;
    let session = load_session(&files.model_path)?;
    let input_names = session.inputs.iter().map(|input| input.name.to_string()).collect();

    let mut provider = Self {
      session: Mutex::new(session),
      tokenizer,
      input_names,
      max_length: config.max_length,
      dimension: 0,
    };
    provider.dimension = provider.embed("test")?.len();

    bentley::success!("Embedding model loaded ({}-dimensional)", provider.dimension);
    Ok(provider)
  }

  fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let encoding = self
      .tokenizer
      .encode(text, true)
      .map_err(|e| RetrievalError::encoding(format!("Tokenization failed: {e}")))?;

    let len = encoding.get_ids().len().min(self.max_length);
    if encoding.get_ids().len() > self.max_length {
      bentley::verbose!("Truncating input from {} to {len} tokens", encoding.get_ids().len());
    }

    let input = self.prepare(
      &encoding.get_ids()[..len],
      &encoding.get_attention_mask()[..len],
      &encoding.get_type_ids()[..len],
    )?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| RetrievalError::encoding("Embedding session lock poisoned"))?;
    let outputs = session.run(input).map_err(ort_error)?;
    let tensor = outputs
      .get("last_hidden_state")
      .or_else(|| outputs.get("0"))
      .ok_or_else(|| RetrievalError::encoding("No output found from model"))?;
    let (shape, data) = tensor.try_extract_tensor::<f32>().map_err(ort_error)?;

    Ok(normalize_embedding(mean_pool(shape.as_ref(), data)?))
  }

  fn prepare(&self, ids: &[u32], mask: &[u32], type_ids: &[u32]) -> Result<HashMap<String, Value>> {
    let mut input = HashMap::new();
    input.insert("input_ids".to_string(), to_tensor(ids)?);
    input.insert("attention_mask".to_string(), to_tensor(mask)?);

    if self.expects("token_type_ids") {
      input.insert("token_type_ids".to_string(), to_tensor(type_ids)?);
    }
    if self.expects("position_ids") {
      let positions: Vec<u32> = (0..ids.len() as u32).collect();
      input.insert("position_ids".to_string(), to_tensor(&positions)?);
    }
    Ok(input)
  }

  fn expects(&self, name: &str) -> bool {
    self.input_names.iter().any(|input| input == name)
  }
}

#[async_trait]
#[cfg(not(tarpaulin_include))]
impl EmbeddingProvider for OnnxEmbeddingProvider {
  async fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    texts.iter().map(|text| self.embed(text)).collect()
  }

  async fn encode_queries(&self, items: &[(String, String)]) -> Result<Vec<Vec<f32>>> {
    items
      .iter()
      .map(|(instruction, text)| self.embed(&query_prompt(instruction, text)))
      .collect()
  }

  fn dimension(&self) -> usize {
    self.dimension
  }
}

/// Prompt layout for instruction-tuned query encoding.
pub fn query_prompt(instruction: &str, text: &str) -> String {
  format!("task: {instruction} | query: {text}")
}

#[cfg(not(tarpaulin_include))]
async fn download_model(model_name: &str) -> Result<ModelFiles> {
  let api = Api::new()
    .map_err(|e| RetrievalError::encoding(format!("HF API initialization failed: {e}")))?;
  let repo = api.model(model_name.to_string());

  let tokenizer_file = repo
    .get(TOKENIZER_FILE)
    .await
    .map_err(|e| RetrievalError::encoding(format!("Failed to download tokenizer: {e}")))?;
  let model_path = repo
    .get(MODEL_FILE)
    .await
    .map_err(|e| RetrievalError::encoding(format!("Failed to download ONNX model: {e}")))?;

  ensure_external_data_file(&model_path, &repo).await;

  Ok(ModelFiles { tokenizer_file, model_path })
}

/// Larger exports keep weights next to the graph; smaller ones have none.
#[cfg(not(tarpaulin_include))]
async fn ensure_external_data_file(model_path: &Path, repo: &ApiRepo) {
  if model_path.with_file_name("model.onnx_data").exists() {
    return;
  }
  match repo.get(EXTERNAL_DATA_FILE).await {
    Ok(_) => bentley::info!("Downloaded external model data"),
    Err(e) => bentley::verbose!("No external data file for this model: {e}"),
  }
}

#[cfg(not(tarpaulin_include))]
fn load_session(model_path: &Path) -> Result<Session> {
  Session::builder()
    .and_then(|builder| builder.with_execution_providers(execution_providers()))
    .and_then(|builder| builder.commit_from_file(model_path))
    .map_err(|e| RetrievalError::encoding(format!("Failed to load ONNX model: {e}")))
}

#[cfg(not(tarpaulin_include))]
fn execution_providers() -> Vec<ExecutionProviderDispatch> {
  let mut providers = Vec::new();

  #[cfg(target_os = "macos")]
  {
    providers.push(CoreMLExecutionProvider::default().into());
  }

  #[cfg(target_os = "linux")]
  {
    if is_cuda_available() {
      providers.push(CUDAExecutionProvider::default().build().error_on_failure());
    }
  }

  providers.push(CPUExecutionProvider::default().into());
  providers
}

#[cfg(target_os = "linux")]
fn is_cuda_available() -> bool {
  std::process::Command::new("nvidia-smi")
    .output()
    .map(|output| output.status.success())
    .unwrap_or(false)
}

fn to_tensor(values: &[u32]) -> Result<Value> {
  let ids: Vec<i64> = values.iter().map(|&x| x as i64).collect();
  let array = Array2::from_shape_vec((1, ids.len()), ids)
    .map_err(|e| RetrievalError::encoding(format!("Invalid input shape: {e}")))?;
  Ok(Value::from_array(array).map_err(ort_error)?.into())
}

fn ort_error(e: ort::Error) -> RetrievalError {
  RetrievalError::encoding(format!("ONNX runtime error: {e}"))
}

#[cfg(test)]
mod onnx_tests {
  use super::*;

  #[test]
  fn test_query_prompt_layout() {
    assert_eq!(
      query_prompt("Retrieve entities", "Barack Obama"),
      "task: Retrieve entities | query: Barack Obama"
    );
  }
}
