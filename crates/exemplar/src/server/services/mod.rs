pub mod collections;
pub mod embeddings;
pub mod memory_store;
pub mod orchestrator;
pub mod retrieval;
pub mod vector_store;

#[cfg(feature = "ml-features")]
pub mod lancedb;
#[cfg(feature = "ml-features")]
pub mod onnx;
