//! Shared library for the KortekStream upstream API core.
//!
//! This crate provides common functionality used across the binary crates:
//! - Configuration management
//! - Database models and operations
//! - Endpoint registry with cached reads
//! - Source-domain URL helpers
//! - Logging infrastructure

pub mod config;
pub mod db;
pub mod domain;
pub mod logging;
pub mod models;
pub mod registry;

// Re-export commonly used types
pub use config::{ApiConfig, BackoffConfig, Config, MonitorConfig};
pub use db::Database;
pub use logging::LogConfig;
pub use models::*;
pub use registry::{EndpointRegistry, RegistryError};

/// Common result type using anyhow::Error
pub type Result<T> = anyhow::Result<T>;
