//! Shared types, error model, and configuration for groundwork.
//!
//! This crate is the foundation depended on by all other groundwork crates.
//! It provides:
//! - [`GroundworkError`] — the unified error type
//! - Domain types ([`Passage`], [`SourceKind`], [`Query`], [`CacheSnapshot`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheConfig, CrawlSettings, InternalPagesConfig, PublicDocsConfig,
    RetrievalConfig, ServerConfig, TicketHistoryConfig, ValidationConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_secret,
};
pub use error::{GroundworkError, Result};
pub use types::{
    CacheMetadata, CacheSnapshot, DocCategory, Passage, PassageId, Query, SourceKind,
    DEFAULT_MAX_RESULTS,
};
