//! Shared types, error model, and configuration for lakeexport.
//!
//! This crate is the foundation depended on by all other lakeexport crates.
//! It provides:
//! - [`LakeExportError`]: the unified error type
//! - Remote data model ([`User`], [`Repo`], [`DocSummary`], [`DocDetail`])
//! - Configuration ([`AppConfig`], config loading)
//! - [`ProgressReporter`]: progress callbacks shared by crawl and build

pub mod config;
pub mod error;
pub mod progress;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, DEFAULT_HOST, init_config, load_config_from, load_token,
};
pub use error::{LakeExportError, Result};
pub use progress::{ProgressReporter, SilentProgress};
pub use types::{
    DocDetail, DocSummary, Remote, Repo, User, has_update, validate_path_component,
};
