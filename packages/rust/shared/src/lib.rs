//! Shared types, error model, and configuration for the Oireachtas corpus tools.
//!
//! This crate is the foundation depended on by all other crates in the workspace.
//! It provides:
//! - [`OireachtasError`]: the unified error type
//! - Domain types ([`ResourceReference`], [`DownloadedDocument`], [`FlatRow`])
//! - Configuration ([`AppConfig`], [`HarvestOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    ApiConfig, AppConfig, CorpusConfig, Delimiter, FlattenConfig, HarvestConfig,
    HarvestOptions, SourceWindow, SourcesConfig, config_dir, config_file_path, init_config,
    load_config, load_config_from, validate_config,
};
pub use error::{OireachtasError, Result};
pub use types::{
    CORPUS_ROOT_TAG, Chamber, DownloadedDocument, ElementType, FLAT_ROW_WIDTH, FlatRow,
    RECORD_DATA_TAG, RECORD_TAG, ResourceReference, SourceKind,
};
