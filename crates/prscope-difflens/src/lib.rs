//! Diff triage before anything reaches the model.
//!
//! Drops noise files (lockfiles, build output, vendored code, binary assets),
//! caps the file count, splits a byte budget evenly across the remaining files,
//! and truncates oversized patches on line boundaries.

pub mod budget;
pub mod filter;
pub mod parser;
