//! # filesplit
//!
//! Lossless file splitting and merging:
//! - Split by byte size (anywhere, or only at line breaks) or by line count
//! - Optional replication of the first line (e.g. a CSV header) into every split
//! - Optional transcoding from a read encoding to a write encoding
//! - A CSV manifest that lets the merger rebuild the original byte for byte
//! - Cooperative cancellation through a shared [`TerminateFlag`]
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use filesplit_lib::{FileMerger, FileSplitter, MergeConfig, SplitConfig, TerminateFlag};
//! use std::path::Path;
//!
//! fn main() -> filesplit_lib::Result<()> {
//!     // 100k rows per split, each split starting with the CSV header
//!     let mut config = SplitConfig::by_line_count(100_000);
//!     config.options.include_header = true;
//!
//!     let splitter = FileSplitter::with_config(config)?;
//!     let summary = splitter.split_with(
//!         Path::new("data/export.csv"),
//!         Path::new("data/parts"),
//!         &TerminateFlag::new(),
//!         |path, size| println!("{} ({} bytes)", path.display(), size),
//!     )?;
//!     println!("Wrote {} splits", summary.splits.len());
//!
//!     // Put the original back together and remove the pieces
//!     let merger = FileMerger::with_config(MergeConfig {
//!         cleanup: true,
//!         ..Default::default()
//!     })?;
//!     let merged = merger.merge_dir(Path::new("data/parts"))?;
//!     println!("Merged {} bytes into {}", merged.size_bytes, merged.output_path.display());
//!
//!     Ok(())
//! }
//! ```

// Include the modules from the modules directory
#[path = "../modules/mod.rs"]
pub mod modules;

// Re-export everything from modules for easy access
pub use modules::*;

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library information
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
