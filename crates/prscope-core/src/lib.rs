//! Core types, configuration, and error handling for PRScope.
//!
//! This crate provides the shared foundation used by the other PRScope crates:
//! - [`PrscopeError`]: unified error type using `thiserror`
//! - [`PrscopeConfig`]: configuration loaded from `prscope.config.json` or `.prscope.toml`
//! - Shared types: [`ChangedFile`], [`Finding`], [`ReviewResult`], [`ReviewProfile`],
//!   [`Severity`], [`RiskLevel`], [`Category`]

mod config;
mod error;
mod hash;
mod types;

pub use config::{ConfigOverrides, PrscopeConfig};
pub use error::PrscopeError;
pub use hash::compute_review_hash;
pub use types::{
    Category, ChangedFile, CommentMode, FileStatus, Finding, OutputFormat, ProviderKind,
    ReviewProfile, ReviewResult, RiskLevel, Severity, COMMENT_MARKER, CONFIG_FILENAMES,
    DEFAULT_MAX_DIFF_BYTES, DEFAULT_MAX_FILES,
};

/// A convenience `Result` type for PRScope operations.
pub type Result<T> = std::result::Result<T, PrscopeError>;
