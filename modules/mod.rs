//! Split/merge engine
//!
//! This library provides modules for:
//! - Splitting a file into size- or line-bounded pieces
//! - Recording those pieces in a CSV manifest
//! - Merging the pieces back into the original file
//! - Transcoding text between encodings while splitting

pub mod common;
pub mod error;
pub mod codec;
pub mod manifest;
pub mod file_splitter;
pub mod file_merger;

// Re-export commonly used types and structs
pub use common::{TerminateFlag, MANIFEST_FILE_NAME, SPLIT_DELIMITER};
pub use error::{Result, SplitError};
pub use manifest::ManifestRecord;
pub use file_splitter::{FileSplitter, SplitConfig, SplitMode, SplitOptions, SplitSummary};
pub use file_merger::{FileMerger, MergeConfig, MergeSummary};
