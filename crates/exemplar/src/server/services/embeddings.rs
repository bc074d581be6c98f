//! Embedding provider abstraction.
//!
//! Documents (reference entities, reference sentences and incoming queries at
//! retrieval time) are encoded plainly. Query mode prefixes an instruction and
//! is used when a caller wants instruction-tuned query vectors.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::error::{Result, RetrievalError};

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
  /// Encode texts without any instruction prefix.
  async fn encode_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

  /// Encode `(instruction, text)` pairs.
  async fn encode_queries(&self, items: &[(String, String)]) -> Result<Vec<Vec<f32>>>;

  /// Output dimension of every vector this provider produces.
  fn dimension(&self) -> usize;
}

/// Encode a single text as a document and check the vector's shape.
pub async fn encode_one(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
  let mut vectors = provider.encode_documents(&[text.to_string()]).await?;
  let vector = vectors
    .pop()
    .ok_or_else(|| RetrievalError::encoding("embedding provider returned no vectors"))?;

  if vector.len() != provider.dimension() {
    return Err(RetrievalError::encoding(format!(
      "embedding provider returned {} values, expected {}",
      vector.len(),
      provider.dimension()
    )));
  }
  Ok(vector)
}

/// Perform mean pooling over the sequence dimension of a `[batch, seq, hidden]` tensor.
pub fn mean_pool(shape: &[i64], data: &[f32]) -> Result<Vec<f32>> {
  if shape.len() != 3 {
    return Err(RetrievalError::encoding(format!("expected a rank-3 tensor, got shape {shape:?}")));
  }

  let seq_length = shape[1] as usize;
  let hidden_size = shape[2] as usize;
  if seq_length == 0 || data.len() < seq_length * hidden_size {
    return Err(RetrievalError::encoding("model output is empty or truncated"));
  }

  let mut embedding = vec![0.0f32; hidden_size];
  for token_idx in 0..seq_length {
    let start = token_idx * hidden_size;
    for (i, &value) in data[start..start + hidden_size].iter().enumerate() {
      embedding[i] += value;
    }
  }

  for value in embedding.iter_mut() {
    *value /= seq_length as f32;
  }

  Ok(embedding)
}

/// Normalize embedding vector to unit length
pub fn normalize_embedding(mut embedding: Vec<f32>) -> Vec<f32> {
  let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

  if magnitude < f32::EPSILON {
    bentley::warn!("Zero-magnitude embedding detected - returning unchanged");
    return embedding;
  }

  for value in embedding.iter_mut() {
    *value /= magnitude;
  }
  embedding
}

#[cfg(test)]
mod embeddings_tests {
  use super::*;

  #[test]
  fn test_mean_pool_averages_tokens() {
    let shape = [1i64, 2, 3];
    let data = [1.0f32, 2.0, 3.0, 3.0, 4.0, 5.0];
    assert_eq!(mean_pool(&shape, &data).unwrap(), vec![2.0, 3.0, 4.0]);
  }

  #[test]
  fn test_mean_pool_rejects_bad_shapes() {
    assert!(mean_pool(&[2, 3], &[0.0; 6]).is_err());
    assert!(mean_pool(&[1, 0, 3], &[]).is_err());
    assert!(mean_pool(&[1, 2, 3], &[0.0; 4]).is_err());
  }

  #[test]
  fn test_normalize_embedding() {
    let normalized = normalize_embedding(vec![3.0, 4.0]);
    assert!((normalized[0] - 0.6).abs() < 1e-6);
    assert!((normalized[1] - 0.8).abs() < 1e-6);
    assert_eq!(normalize_embedding(vec![0.0, 0.0]), vec![0.0, 0.0]);
  }

  #[tokio::test]
  async fn test_encode_one_checks_dimension() {
    let mut provider = MockEmbeddingProvider::new();
    provider.expect_encode_documents().returning(|_| Ok(vec![vec![1.0, 0.0]]));
    provider.expect_dimension().return_const(3usize);

    let err = encode_one(&provider, "text").await.unwrap_err();
    assert!(matches!(err, RetrievalError::Encoding { .. }));
  }

  #[tokio::test]
  async fn test_encode_one_returns_single_vector() {
    let mut provider = MockEmbeddingProvider::new();
    provider
      .expect_encode_documents()
      .withf(|texts| texts.len() == 1 && texts[0] == "Barack Obama")
      .returning(|_| Ok(vec![vec![0.0, 1.0]]));
    provider.expect_dimension().return_const(2usize);

    assert_eq!(encode_one(&provider, "Barack Obama").await.unwrap(), vec![0.0, 1.0]);
  }
}
