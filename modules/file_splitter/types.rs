use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::modules::codec::TextCodec;
use crate::modules::common::{MANIFEST_FILE_NAME, MAX_READ_BUFFER, SPLIT_DELIMITER};
use crate::modules::error::{Result, SplitError};
use crate::modules::manifest::ManifestRecord;

/// What the split limit counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Limit is a maximum number of bytes per split
    #[default]
    ByteSize,
    /// Limit is a maximum number of lines per split, not counting a replicated header
    LineCount,
}

impl SplitMode {
    pub fn unit_name(&self) -> &'static str {
        match self {
            SplitMode::ByteSize => "bytes",
            SplitMode::LineCount => "lines",
        }
    }
}

impl FromStr for SplitMode {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "size" | "bytesize" | "byte_size" | "bytes" => Ok(SplitMode::ByteSize),
            "linecount" | "line_count" | "lines" => Ok(SplitMode::LineCount),
            other => Err(SplitError::configuration(format!(
                "unsupported split mode `{other}`"
            ))),
        }
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitMode::ByteSize => f.write_str("size"),
            SplitMode::LineCount => f.write_str("linecount"),
        }
    }
}

/// Options that shape how the source is cut
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    /// Only cut at line breaks (always the case in line-count mode)
    pub newline_aligned: bool,
    /// Repeat the first line of the source at the start of every split
    pub include_header: bool,
    /// Encoding the source is decoded with; `None` reads raw bytes
    pub read_encoding: Option<String>,
    /// Encoding the splits are written in; defaults to the read encoding
    pub write_encoding: Option<String>,
}

/// Configuration for file splitting operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub mode: SplitMode,
    /// Bytes or lines per split, depending on `mode`
    pub limit: u64,
    pub options: SplitOptions,
    /// Separator between the source stem and the split number
    pub delimiter: String,
    /// File name of the manifest written into the output directory
    pub manifest_name: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            mode: SplitMode::ByteSize,
            limit: 5 * 1024 * 1024,
            options: SplitOptions::default(),
            delimiter: SPLIT_DELIMITER.to_string(),
            manifest_name: MANIFEST_FILE_NAME.to_string(),
        }
    }
}

impl SplitConfig {
    pub fn by_size(limit: u64) -> Self {
        Self {
            mode: SplitMode::ByteSize,
            limit,
            ..Default::default()
        }
    }

    pub fn by_line_count(limit: u64) -> Self {
        Self {
            mode: SplitMode::LineCount,
            limit,
            ..Default::default()
        }
    }

    /// Whether units are read line by line rather than as raw chunks.
    ///
    /// Header replication implies it: a header can only be prepended when
    /// every split ends on a line break.
    pub fn line_oriented(&self) -> bool {
        self.mode == SplitMode::LineCount
            || self.options.newline_aligned
            || self.options.include_header
    }

    /// Size of one raw read in byte-size mode
    pub fn read_buffer_size(&self) -> usize {
        usize::try_from(self.limit).map_or(MAX_READ_BUFFER, |limit| limit.min(MAX_READ_BUFFER))
    }

    /// Check the configuration and resolve its encodings into `(read, write)` codecs
    pub fn validate(&self) -> Result<(Option<TextCodec>, Option<TextCodec>)> {
        if self.limit == 0 {
            return Err(SplitError::configuration("split limit must be positive"));
        }
        if self.delimiter.is_empty() {
            return Err(SplitError::configuration("split delimiter must not be empty"));
        }
        if self.manifest_name.trim().is_empty() {
            return Err(SplitError::configuration("manifest name must not be empty"));
        }

        let read = self.options.read_encoding.as_deref();
        let write = self.options.write_encoding.as_deref();
        match (read, write) {
            (None, Some(write)) => Err(SplitError::configuration(format!(
                "write encoding `{write}` requires a read encoding"
            ))),
            (None, None) => Ok((None, None)),
            (Some(read), write) => {
                let read_codec = TextCodec::for_label(read)?;
                let write_codec = TextCodec::for_writing(write.unwrap_or(read))?;
                Ok((Some(read_codec), Some(write_codec)))
            }
        }
    }
}

/// Outcome of one split operation
#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub manifest_path: PathBuf,
    /// Manifest rows, one per split, in creation order
    pub splits: Vec<ManifestRecord>,
    /// Set when the operation stopped early on request
    pub terminated: bool,
}

impl SplitSummary {
    pub fn total_bytes(&self) -> u64 {
        self.splits.iter().map(|s| s.filesize).sum()
    }
}

/// Source of the units splits are assembled from: raw chunks or whole lines
pub trait UnitReader {
    /// Next unit of the source, or `None` once it is exhausted
    fn next_unit(&mut self) -> io::Result<Option<Vec<u8>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("size".parse::<SplitMode>().unwrap(), SplitMode::ByteSize);
        assert_eq!("LineCount".parse::<SplitMode>().unwrap(), SplitMode::LineCount);
        assert_eq!(" line_count ".parse::<SplitMode>().unwrap(), SplitMode::LineCount);
        assert!(matches!(
            "words".parse::<SplitMode>(),
            Err(SplitError::Configuration { .. })
        ));
    }

    #[test]
    fn test_read_buffer_is_capped() {
        assert_eq!(SplitConfig::by_size(350).read_buffer_size(), 350);
        assert_eq!(SplitConfig::by_size(10 * 1024 * 1024 * 1024).read_buffer_size(), MAX_READ_BUFFER);
    }

    #[test]
    fn test_header_forces_line_orientation() {
        let mut config = SplitConfig::by_size(100);
        assert!(!config.line_oriented());
        config.options.include_header = true;
        assert!(config.line_oriented());
        assert!(SplitConfig::by_line_count(3).line_oriented());
    }

    #[test]
    fn test_validation() {
        assert!(SplitConfig::default().validate().is_ok());
        assert!(SplitConfig::by_size(0).validate().is_err());

        let mut config = SplitConfig::by_size(10);
        config.delimiter.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_encoding_requires_read_encoding() {
        let mut config = SplitConfig::by_size(10);
        config.options.write_encoding = Some("utf-8".to_string());
        assert!(matches!(config.validate(), Err(SplitError::Configuration { .. })));

        config.options.read_encoding = Some("latin1".to_string());
        let (read, write) = config.validate().unwrap();
        assert_eq!(read.unwrap().name(), "windows-1252");
        assert_eq!(write.unwrap().name(), "UTF-8");
    }

    #[test]
    fn test_unwritable_read_encoding_needs_write_encoding() {
        let mut config = SplitConfig::by_size(10);
        config.options.read_encoding = Some("utf-16le".to_string());
        assert!(config.validate().is_err());

        config.options.write_encoding = Some("utf-8".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let config: SplitConfig = serde_json::from_str(
            r#"{"mode": "line_count", "limit": 4, "options": {"include_header": true}}"#,
        )
        .unwrap();
        assert_eq!(config.mode, SplitMode::LineCount);
        assert_eq!(config.limit, 4);
        assert!(config.options.include_header);
        assert_eq!(config.delimiter, "_");
        assert_eq!(config.manifest_name, "fs_manifest.csv");
    }
}
