//! Review orchestration for PRScope.
//!
//! Provides the review pipeline: chat providers, prompt construction,
//! response validation, comment rendering, and GitHub PR integration.

pub mod github;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod schema;
