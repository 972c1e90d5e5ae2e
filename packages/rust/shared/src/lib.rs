//! Shared types, error model, and configuration for LexRisk.
//!
//! This crate is the foundation depended on by all other LexRisk crates.
//! It provides:
//! - [`LexRiskError`], the unified error type
//! - Domain types ([`Identity`], [`Document`], [`Chunk`], [`DocumentType`],
//!   [`AnalysisReport`], [`AnalysisRecord`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalysisConfig, AppConfig, IndexingConfig, OpenRouterConfig, StorageConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{LexRiskError, Result};
pub use types::{
    AnalysisRecord, AnalysisReport, Chunk, Document, DocumentType, Identity, content_hash,
};
