use std::path::PathBuf;

/// Errors that can occur across PRScope.
///
/// Library crates use this type directly; the binary converts to
/// `miette` diagnostics at the boundary. Model output validation has its own
/// error type in `prscope-review` since it never escapes the review pipeline.
///
/// # Examples
///
/// ```
/// use prscope_core::PrscopeError;
///
/// let err = PrscopeError::Config("maxFiles must be positive".into());
/// assert!(err.to_string().contains("maxFiles"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum PrscopeError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(prscope::config),
        help("check prscope.config.json, or run 'prscope init' to create one")
    )]
    Config(String),

    /// GitHub API failure.
    #[error("GitHub error: {0}")]
    #[diagnostic(code(prscope::github))]
    GitHub(String),

    /// Model provider request or response failure.
    #[error("LLM error: {0}")]
    Llm(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}
