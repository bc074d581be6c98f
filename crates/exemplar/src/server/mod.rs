//! REST API module for the exemplar retrieval service
//!
//! Provides HTTP endpoints for few-shot instruction retrieval and collection
//! administration. Uses axum for routing and schemars for schema documents.

pub mod handlers;
pub mod middleware;
pub mod routing;
pub mod services;
pub mod startup;
pub mod types;
