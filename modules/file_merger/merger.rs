use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use super::types::*;
use crate::modules::codec::TextCodec;
use crate::modules::common::TerminateFlag;
use crate::modules::error::{Result, SplitError};
use crate::modules::manifest::{read_manifest, ManifestRecord};

/// Reassembles a file from the splits listed in its manifest
pub struct FileMerger {
    config: MergeConfig,
}

impl FileMerger {
    /// Create a file merger with the default configuration
    pub fn new() -> Self {
        Self {
            config: MergeConfig::default(),
        }
    }

    pub fn with_config(config: MergeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge the splits in `input_dir` without a completion callback or cancellation
    pub fn merge_dir(&self, input_dir: &Path) -> Result<MergeSummary> {
        self.merge_with(input_dir, &TerminateFlag::new(), |_, _| {})
    }

    /// Merge the splits in `input_dir` into one output file.
    ///
    /// `terminate` is checked before each manifest record. A terminated merge
    /// leaves the output holding the records copied so far, skips cleanup and
    /// does not call `on_complete`.
    pub fn merge_with<F>(
        &self,
        input_dir: &Path,
        terminate: &TerminateFlag,
        on_complete: F,
    ) -> Result<MergeSummary>
    where
        F: FnOnce(&Path, u64),
    {
        let start_time = Instant::now();
        info!("Starting file merge from {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(SplitError::invalid_destination(input_dir));
        }
        let manifest_path = self.manifest_path(input_dir);
        if !manifest_path.is_file() {
            return Err(SplitError::not_found(&manifest_path));
        }

        let records = read_manifest(&manifest_path)?;
        let output_path = self.output_path(input_dir, &manifest_path, &records)?;
        let overwrites_input = output_path == manifest_path
            || records.iter().any(|r| input_dir.join(&r.filename) == output_path);
        if overwrites_input {
            return Err(SplitError::configuration(format!(
                "merge output {} would overwrite one of its inputs",
                output_path.display()
            )));
        }

        let mut writer = BufWriter::new(File::create(&output_path)?);
        let CopyOutcome { merged, terminated } =
            copy_records(&mut writer, input_dir, &records, terminate, |record, copied| {
                debug!("Merged {} ({} bytes)", record.filename, copied);
            })?;
        writer.flush()?;
        drop(writer);

        let size_bytes = fs::metadata(&output_path)?.len();
        let mut summary = MergeSummary {
            output_path,
            size_bytes,
            splits_merged: merged,
            terminated,
            cleaned_up: false,
        };
        if terminated {
            return Ok(summary);
        }

        if self.config.cleanup {
            remove_merged_files(input_dir, &records, &manifest_path)?;
            summary.cleaned_up = true;
        }
        on_complete(&summary.output_path, summary.size_bytes);

        info!(
            "File merge into {} completed in {:?}: {} splits, {} bytes",
            summary.output_path.display(),
            start_time.elapsed(),
            merged,
            size_bytes
        );
        Ok(summary)
    }

    fn manifest_path(&self, input_dir: &Path) -> PathBuf {
        self.config
            .manifest_path
            .clone()
            .unwrap_or_else(|| input_dir.join(&self.config.manifest_name))
    }

    fn output_path(&self, input_dir: &Path, manifest_path: &Path, records: &[ManifestRecord]) -> Result<PathBuf> {
        if let Some(path) = &self.config.output_path {
            if path.is_dir() {
                return Err(SplitError::invalid_destination(path));
            }
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.is_dir() {
                    return Err(SplitError::invalid_destination(parent));
                }
            }
            return Ok(path.clone());
        }

        let first = records.first().ok_or_else(|| {
            SplitError::malformed_manifest(manifest_path, "no splits listed to derive the output name from")
        })?;
        Ok(input_dir.join(merged_file_name(&first.filename, &self.config.delimiter)))
    }
}

impl Default for FileMerger {
    fn default() -> Self {
        Self::new()
    }
}

struct CopyOutcome {
    merged: usize,
    terminated: bool,
}

/// Append the splits listed in `records` to `writer` in order.
///
/// `terminate` is checked before each record; `on_record` sees every record
/// once it has been copied, with the number of bytes it contributed.
fn copy_records<W, F>(
    writer: &mut W,
    input_dir: &Path,
    records: &[ManifestRecord],
    terminate: &TerminateFlag,
    mut on_record: F,
) -> Result<CopyOutcome>
where
    W: Write,
    F: FnMut(&ManifestRecord, u64),
{
    let mut skip_header = false;
    let mut merged = 0;

    for record in records {
        if terminate.is_set() {
            info!("Terminate flag set, stopping after {} of {} splits", merged, records.len());
            return Ok(CopyOutcome {
                merged,
                terminated: true,
            });
        }
        let copied = append_split(writer, input_dir, record, skip_header)?;
        merged += 1;
        on_record(record, copied);
        // Once one split carried a header, every later one repeats it.
        if record.header {
            skip_header = true;
        }
    }
    Ok(CopyOutcome {
        merged,
        terminated: false,
    })
}

/// Copy one split to the end of `writer`, dropping its first line when `skip_header` is set
fn append_split<W: Write>(
    writer: &mut W,
    input_dir: &Path,
    record: &ManifestRecord,
    skip_header: bool,
) -> Result<u64> {
    // The header line can only be found by byte in an ASCII-compatible
    // encoding. Splits copied whole are taken as they are.
    if skip_header {
        if let Some(label) = &record.encoding {
            TextCodec::for_writing(label)?;
        }
    }

    let split_path = input_dir.join(&record.filename);
    if !split_path.is_file() {
        return Err(SplitError::not_found(split_path));
    }
    let mut reader = BufReader::new(File::open(&split_path)?);

    if skip_header {
        let mut header = Vec::new();
        reader.read_until(b'\n', &mut header)?;
    }
    Ok(io::copy(&mut reader, writer)?)
}

fn remove_merged_files(input_dir: &Path, records: &[ManifestRecord], manifest_path: &Path) -> Result<()> {
    for record in records {
        remove_if_exists(&input_dir.join(&record.filename))?;
    }
    debug!("Removed {} splits and {}", records.len(), manifest_path.display());
    remove_if_exists(manifest_path)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::file_splitter::{FileSplitter, SplitConfig};
    use tempfile::TempDir;

    #[test]
    fn test_terminate_between_records_keeps_copied_prefix() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let source = src.path().join("rows.csv");
        let data: String = std::iter::once("id,value\n".to_string())
            .chain((0..9).map(|i| format!("{i},v{i}\n")))
            .collect();
        fs::write(&source, &data).unwrap();

        let mut config = SplitConfig::by_line_count(2);
        config.options.include_header = true;
        let split = FileSplitter::with_config(config)
            .unwrap()
            .split_file(&source, out.path())
            .unwrap();
        assert_eq!(split.splits.len(), 5);

        let flag = TerminateFlag::new();
        let mut seen = Vec::new();
        let mut output = Vec::new();
        let outcome = copy_records(&mut output, out.path(), &split.splits, &flag, |record, _| {
            seen.push(record.filename.clone());
            if seen.len() == 2 {
                flag.terminate();
            }
        })
        .unwrap();

        assert!(outcome.terminated);
        assert_eq!(outcome.merged, 2);
        assert_eq!(seen, vec!["rows_1.csv", "rows_2.csv"]);

        let first = fs::read(out.path().join("rows_1.csv")).unwrap();
        let second = fs::read(out.path().join("rows_2.csv")).unwrap();
        let mut expected = first;
        expected.extend_from_slice(&second[b"id,value\n".len()..]);
        assert_eq!(output, expected);
        assert_eq!(output, b"id,value\n0,v0\n1,v1\n2,v2\n3,v3\n");
    }

    #[test]
    fn test_unwritable_encoding_only_matters_when_a_header_is_dropped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("u_1.txt"), b"\xff\xfeh\x00").unwrap();
        fs::write(dir.path().join("u_2.txt"), b"i\x00").unwrap();
        let record = |name: &str, header| ManifestRecord {
            filename: name.to_string(),
            filesize: 2,
            encoding: Some("UTF-16LE".to_string()),
            header,
        };

        let verbatim = [record("u_1.txt", false), record("u_2.txt", false)];
        let mut output = Vec::new();
        let outcome =
            copy_records(&mut output, dir.path(), &verbatim, &TerminateFlag::new(), |_, _| {})
                .unwrap();
        assert_eq!(outcome.merged, 2);
        assert_eq!(output, b"\xff\xfeh\x00i\x00");

        let with_header = [record("u_1.txt", true), record("u_2.txt", true)];
        let mut output = Vec::<u8>::new();
        let result =
            copy_records(&mut output, dir.path(), &with_header, &TerminateFlag::new(), |_, _| {});
        assert!(matches!(result, Err(SplitError::Configuration { .. })));
    }
}
