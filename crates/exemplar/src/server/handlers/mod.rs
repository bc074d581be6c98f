//! HTTP endpoint handlers

pub mod collections;
pub mod logs;
pub mod retrieval;
pub mod status;
