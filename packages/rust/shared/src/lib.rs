//! Shared types, error model, and configuration for listharvest.
//!
//! This crate is the foundation depended on by all other listharvest crates.
//! It provides:
//! - [`HarvestError`] - the unified error type
//! - Domain types ([`Target`], [`PostLink`], [`ExtractedRecord`], [`ManifestBody`])
//! - Configuration ([`AppConfig`], runtime configs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, BatchingConfig, ExtractConfig, LayoutsConfig, LogFormat,
    LoggingConfig, MediaConfig, SiteConfig, StorageBackend, StorageConfig, TraversalConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{HarvestError, Result};
pub use types::{ExtractedRecord, ManifestBody, MediaAsset, PostLink, Target};
