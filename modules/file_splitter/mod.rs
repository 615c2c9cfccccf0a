//! File Splitter
//!
//! Streams one source file into numbered splits bounded by a byte size or a
//! line count, and writes the manifest the merger needs to put them back
//! together. Splits can be cut anywhere, only at line breaks, or carry a copy
//! of the source's first line at their start.

pub mod types;
pub mod splitter;
pub mod readers;

// Re-export main types and the FileSplitter
pub use types::*;
pub use splitter::FileSplitter;
