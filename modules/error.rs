//! Error types for split and merge operations

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for split and merge operations
pub type Result<T> = std::result::Result<T, SplitError>;

/// Errors raised by the splitter and the merger.
///
/// Precondition failures are reported before any file is touched. Anything
/// that goes wrong while streaming surfaces as [`SplitError::Io`].
#[derive(Debug, Error)]
pub enum SplitError {
    /// Source file, manifest or a split named by the manifest does not exist
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Directory to read from or write into is missing or not a directory
    #[error("not a valid directory: {}", path.display())]
    InvalidDestination { path: PathBuf },

    /// Mode, limit or encoding settings that cannot be satisfied
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    /// Manifest content that cannot be interpreted
    #[error("malformed manifest {}: {message}", path.display())]
    MalformedManifest { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SplitError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        SplitError::NotFound { path: path.into() }
    }

    pub fn invalid_destination(path: impl Into<PathBuf>) -> Self {
        SplitError::InvalidDestination { path: path.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        SplitError::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed_manifest(path: &Path, message: impl Into<String>) -> Self {
        SplitError::MalformedManifest {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Wrap a `csv` failure on the manifest at `path`, keeping plain I/O errors as I/O
    pub(crate) fn from_csv(path: &Path, err: csv::Error) -> Self {
        if err.is_io_error() {
            match err.into_kind() {
                csv::ErrorKind::Io(io_err) => SplitError::Io(io_err),
                other => SplitError::malformed_manifest(path, format!("{other:?}")),
            }
        } else {
            SplitError::malformed_manifest(path, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_path() {
        let err = SplitError::not_found("/tmp/missing.txt");
        assert_eq!(err.to_string(), "file not found: /tmp/missing.txt");

        let err = SplitError::invalid_destination("/tmp/nowhere");
        assert!(err.to_string().contains("/tmp/nowhere"));

        let err = SplitError::configuration("limit must be positive");
        assert_eq!(err.to_string(), "invalid configuration: limit must be positive");
    }

    #[test]
    fn test_io_errors_pass_through() {
        let err: SplitError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, SplitError::Io(ref e) if e.kind() == io::ErrorKind::PermissionDenied));
        assert_eq!(err.to_string(), "denied");
    }
}
