//! Exemplar - few-shot NER instruction retrieval
//!
//! Embeds an incoming sentence, searches per-language collections of
//! reference entities and annotated sentences, and renders the nearest
//! examples into an instruction prompt for a downstream NER model.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod server;
pub mod template;

pub use error::{Result, RetrievalError};
