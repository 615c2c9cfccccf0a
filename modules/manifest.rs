//! Manifest describing the splits of one file.
//!
//! The manifest is a CSV table with the header row
//! `filename,filesize,encoding,header` followed by one row per split, in the
//! order the splits were created. That order is also the merge order.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::{Result, SplitError};

/// Column names of the manifest header row, in order
pub const MANIFEST_COLUMNS: [&str; 4] = ["filename", "filesize", "encoding", "header"];

/// One row of the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// File name of the split, without directory
    pub filename: String,
    /// Number of bytes written to the split
    pub filesize: u64,
    /// Encoding the split is written in; `None` for raw bytes
    #[serde(default)]
    pub encoding: Option<String>,
    /// Whether the split starts with a replicated header line
    #[serde(
        default,
        serialize_with = "serialize_flag",
        deserialize_with = "deserialize_flag"
    )]
    pub header: bool,
}

fn serialize_flag<S: Serializer>(value: &bool, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "true" } else { "false" })
}

// Anything other than a case-insensitive `true`, including an empty cell, is false.
fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let token: Option<String> = Option::deserialize(deserializer)?;
    Ok(token.is_some_and(|t| t.trim().eq_ignore_ascii_case("true")))
}

/// Appends records to a freshly created manifest file.
///
/// Every record is flushed as soon as it is written, so a manifest left
/// behind by a failed or cancelled split still lists every finished split.
pub struct ManifestWriter {
    path: PathBuf,
    writer: csv::Writer<BufWriter<File>>,
}

impl ManifestWriter {
    /// Create (or truncate) the manifest at `path` and write its header row
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::new(file));
        writer
            .write_record(MANIFEST_COLUMNS)
            .map_err(|e| SplitError::from_csv(path, e))?;
        writer.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &ManifestRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .map_err(|e| SplitError::from_csv(&self.path, e))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Read every record of the manifest at `path`, in stored order
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestRecord>> {
    if !path.is_file() {
        return Err(SplitError::not_found(path));
    }
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader
        .headers()
        .map_err(|e| SplitError::from_csv(path, e))?
        .clone();
    for required in &MANIFEST_COLUMNS[..2] {
        if !headers.iter().any(|h| h == *required) {
            return Err(SplitError::malformed_manifest(
                path,
                format!("missing `{required}` column"),
            ));
        }
    }

    reader
        .deserialize::<ManifestRecord>()
        .map(|row| row.map_err(|e| SplitError::from_csv(path, e)))
        .collect()
}
