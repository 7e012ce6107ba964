//! Shared types, error model, and configuration for docbuild.
//!
//! This crate is the foundation depended on by all other docbuild crates.
//! It provides:
//! - [`DocBuildError`], the unified error type
//! - Domain types ([`Module`], [`TestSuite`], [`SuiteKind`], [`IndexEntry`])
//! - Configuration ([`ProjectConfig`], [`Project`], config loading)
//! - The link-name normalization transform ([`normalize_name`])

pub mod config;
pub mod error;
pub mod naming;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    CONFIG_FILE_NAME, ExtractorConfig, ModuleConfig, Project, ProjectConfig, RenderConfig,
    RenderEngine, SuiteConfig, init_config, load_config, load_config_from, load_project,
};
pub use error::{DocBuildError, Result, read_optional, read_required};
pub use naming::{normalize_name, page_stem};
pub use types::{IndexEntry, Module, SuiteKind, TestSuite};
