//! File Merger
//!
//! Rebuilds the original file from the splits listed in a manifest, dropping
//! the replicated header lines, and optionally removes the splits and the
//! manifest afterwards.

pub mod types;
pub mod merger;

pub use types::*;
pub use merger::FileMerger;
