//! Multi-model weather forecast pipeline.
//!
//! The teacher binary declared its modules directly in `main.rs`; this
//! crate ships a CLI binary alongside the HTTP server, so the module
//! tree lives here instead and both binaries depend on it.

pub mod adapters;
pub mod aggregate;
pub mod cache;
pub mod config;
pub mod confidence;
pub mod domain;
pub mod errors;
pub mod geocoding;
pub mod models;
pub mod pipeline;
pub mod stats;
