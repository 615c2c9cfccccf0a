//! Constants and small shared types used by both the splitter and the merger

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Separator placed between the source file stem and the split sequence number
pub const SPLIT_DELIMITER: &str = "_";

/// Default name of the manifest written next to the splits
pub const MANIFEST_FILE_NAME: &str = "fs_manifest.csv";

/// Upper bound for a single raw read, whatever the configured byte limit is
pub const MAX_READ_BUFFER: usize = 1024 * 1024;

/// Cooperative cancellation flag shared between an operation and its observers.
///
/// Clones share the same underlying flag, so a clone handed to another thread
/// can stop a running split or merge. The operation only looks at the flag
/// between units of work; it never interrupts a read or write in flight.
#[derive(Debug, Clone, Default)]
pub struct TerminateFlag(Arc<AtomicBool>);

impl TerminateFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running operation to stop at its next checkpoint
    pub fn terminate(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Build the name of the `seq`-th split: `{stem}{delimiter}{seq}{ext}`.
///
/// `ext` includes its leading dot, or is empty.
pub fn split_file_name(stem: &str, delimiter: &str, seq: usize, ext: &str) -> String {
    format!("{stem}{delimiter}{seq}{ext}")
}
