//! Shared types, error model, and configuration for Docuify.
//!
//! This crate is the foundation depended on by all other Docuify crates.
//! It provides:
//! - [`DocuifyError`]: the unified error type
//! - Domain types ([`NodeKind`], [`Metadata`], [`extension_of`])
//! - Configuration ([`AppConfig`], [`PreloadConfig`], [`FilterConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, FilterConfig, GithubDefaults, PreloadConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_token,
};
pub use error::{DocuifyError, Result};
pub use types::{Metadata, NodeKind, extension_of, split_path};
