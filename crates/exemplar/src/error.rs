use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
  #[error("Invalid input: {message}")]
  InvalidInput { message: String },

  #[error("Unsupported language '{language}'")]
  UnsupportedLanguage { language: String },

  #[error("Retrieval service has not been initialized")]
  NotInitialized,

  #[error("Retrieval service has been closed")]
  ServiceClosed,

  #[error("Collection '{collection}' does not exist")]
  CollectionNotFound { collection: String },

  #[error("Failed to encode text: {message}")]
  Encoding { message: String },

  #[error("Search in '{collection}' exceeded {timeout_ms}ms")]
  SearchTimeout { collection: String, timeout_ms: u64 },

  #[error("Vector store unavailable: {message}")]
  StoreUnavailable { message: String },

  #[error("Collection '{collection}' expects {expected}-dimensional vectors, got {actual}")]
  DimensionMismatch { collection: String, expected: usize, actual: usize },

  #[error("Vector store error: {message}")]
  Storage { message: String },

  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl RetrievalError {
  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::InvalidInput { message: message.into() }
  }

  pub fn unsupported_language(language: impl Into<String>) -> Self {
    Self::UnsupportedLanguage { language: language.into() }
  }

  pub fn collection_not_found(collection: impl Into<String>) -> Self {
    Self::CollectionNotFound { collection: collection.into() }
  }

  pub fn encoding(message: impl Into<String>) -> Self {
    Self::Encoding { message: message.into() }
  }

  pub fn search_timeout(collection: impl Into<String>, timeout_ms: u64) -> Self {
    Self::SearchTimeout { collection: collection.into(), timeout_ms }
  }

  pub fn store_unavailable(message: impl Into<String>) -> Self {
    Self::StoreUnavailable { message: message.into() }
  }

  pub fn dimension_mismatch(collection: impl Into<String>, expected: usize, actual: usize) -> Self {
    Self::DimensionMismatch { collection: collection.into(), expected, actual }
  }

  pub fn storage(message: impl Into<String>) -> Self {
    Self::Storage { message: message.into() }
  }

  /// Stable snake_case key for API payloads and batch entries.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::InvalidInput { .. } => "invalid_input",
      Self::UnsupportedLanguage { .. } => "unsupported_language",
      Self::NotInitialized => "not_initialized",
      Self::ServiceClosed => "service_closed",
      Self::CollectionNotFound { .. } => "collection_not_found",
      Self::Encoding { .. } => "encoding_failed",
      Self::SearchTimeout { .. } => "search_timeout",
      Self::StoreUnavailable { .. } => "store_unavailable",
      Self::DimensionMismatch { .. } => "dimension_mismatch",
      Self::Storage { .. } => "storage_error",
      Self::Io(_) => "io_error",
      Self::Serialization(_) => "serialization_error",
    }
  }

  /// Only search timeouts are retryable; `StoreUnavailable` is fatal.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::SearchTimeout { .. })
  }

  /// Errors caused by the caller rather than the service.
  pub fn is_invalid_input(&self) -> bool {
    matches!(self, Self::InvalidInput { .. } | Self::UnsupportedLanguage { .. })
  }
}
