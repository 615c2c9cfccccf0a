use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::modules::common::{MANIFEST_FILE_NAME, SPLIT_DELIMITER};
use crate::modules::error::{Result, SplitError};

/// Configuration for merge operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Manifest to read; defaults to `manifest_name` inside the input directory
    pub manifest_path: Option<PathBuf>,
    /// File to write; defaults to a name derived from the first split, inside the input directory
    pub output_path: Option<PathBuf>,
    /// Remove the splits and the manifest after a complete merge
    pub cleanup: bool,
    /// Separator the splits were named with
    pub delimiter: String,
    pub manifest_name: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            manifest_path: None,
            output_path: None,
            cleanup: false,
            delimiter: SPLIT_DELIMITER.to_string(),
            manifest_name: MANIFEST_FILE_NAME.to_string(),
        }
    }
}

impl MergeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(SplitError::configuration("split delimiter must not be empty"));
        }
        if self.manifest_path.is_none() && self.manifest_name.trim().is_empty() {
            return Err(SplitError::configuration("manifest name must not be empty"));
        }
        Ok(())
    }
}

/// Outcome of one merge operation
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub output_path: PathBuf,
    pub size_bytes: u64,
    /// Number of manifest records copied into the output
    pub splits_merged: usize,
    /// Set when the merge stopped early on request; the output is then incomplete
    pub terminated: bool,
    pub cleaned_up: bool,
}

/// Name of the merged file for a split called `split_name`.
///
/// Strips a trailing `{delimiter}{number}` from the stem and keeps the
/// extension: `data_3.csv` becomes `data.csv`. Names without such a suffix
/// are returned unchanged.
pub fn merged_file_name(split_name: &str, delimiter: &str) -> String {
    let path = Path::new(split_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let base = match stem.rsplit_once(delimiter) {
        Some((base, seq)) if !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => stem.as_str(),
    };
    format!("{base}{ext}")
}
