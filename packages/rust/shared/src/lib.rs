//! Shared types, error model, and configuration for DealScope.
//!
//! This crate is the foundation depended on by all other DealScope crates.
//! It provides:
//! - [`DealScopeError`] — the unified error type
//! - Domain types ([`Deal`], [`Contact`], [`Company`], [`EngagementRecord`])
//! - Timestamp parsing/formatting ([`time`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod time;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AnalysisConfig, AppConfig, CrmConfig, StorageConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, require_env,
};
pub use error::{DealScopeError, Result};
pub use types::{
    AssociationEdge, Company, Contact, Deal, EngagementCategory, EngagementDetail,
    EngagementRecord,
};
