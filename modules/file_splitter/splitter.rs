use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::readers::{ChunkReader, LineReader};
use super::types::*;
use crate::modules::codec::TextCodec;
use crate::modules::common::{split_file_name, TerminateFlag};
use crate::modules::error::{Result, SplitError};
use crate::modules::manifest::{ManifestRecord, ManifestWriter};

/// Streams a source file into numbered splits and writes the manifest describing them
pub struct FileSplitter {
    config: SplitConfig,
    read_codec: Option<TextCodec>,
    write_codec: Option<TextCodec>,
}

/// State owned by one split operation
struct SplitContext<'a> {
    terminate: &'a TerminateFlag,
    /// First line of the source, encoded, once captured
    header: Option<Bytes>,
    header_read: bool,
    /// Unit read for the previous split that did not fit into it
    carryover: Option<Bytes>,
    /// Decoded text cut off the end of the previous split, read before the source
    pending_text: Option<Vec<u8>>,
}

/// What one split file ended up holding
struct SplitOutcome {
    bytes: u64,
    units: u64,
    terminated: bool,
}

/// Running totals of the split being written
struct Budget {
    mode: SplitMode,
    limit: u64,
    bytes: u64,
    body_units: u64,
}

impl Budget {
    fn new(mode: SplitMode, limit: u64) -> Self {
        Self {
            mode,
            limit,
            bytes: 0,
            body_units: 0,
        }
    }

    /// Whether a unit of `len` encoded bytes still fits.
    ///
    /// The first body unit is always admitted so a split never closes empty
    /// while the source has data left.
    fn admits(&self, len: u64) -> bool {
        self.body_units == 0 || self.fits(len)
    }

    fn fits(&self, len: u64) -> bool {
        match self.mode {
            SplitMode::ByteSize => self.bytes + len <= self.limit,
            SplitMode::LineCount => self.body_units < self.limit,
        }
    }

    /// Bytes left before the byte-size limit is reached
    fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.bytes)
    }

    fn charge_header(&mut self, len: u64) {
        self.bytes += len;
    }

    fn charge(&mut self, len: u64) {
        self.bytes += len;
        self.body_units += 1;
    }
}

impl FileSplitter {
    /// Create a file splitter with the default configuration
    pub fn new() -> Self {
        Self {
            config: SplitConfig::default(),
            read_codec: None,
            write_codec: None,
        }
    }

    /// Create a file splitter with a custom configuration, rejecting settings that cannot be satisfied
    pub fn with_config(config: SplitConfig) -> Result<Self> {
        let (read_codec, write_codec) = config.validate()?;
        Ok(Self {
            config,
            read_codec,
            write_codec,
        })
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Path of the `seq`-th split this splitter produces for `source` inside `output_dir`
    pub fn split_path(&self, source: &Path, output_dir: &Path, seq: usize) -> PathBuf {
        let (stem, ext) = name_parts(source);
        output_dir.join(split_file_name(&stem, &self.config.delimiter, seq, &ext))
    }

    /// Split `source` into `output_dir` without progress reporting or cancellation
    pub fn split_file(&self, source: &Path, output_dir: &Path) -> Result<SplitSummary> {
        self.split_with(source, output_dir, &TerminateFlag::new(), |_, _| {})
    }

    /// Split `source` into `output_dir`.
    ///
    /// `on_split` is called with the path and byte size of every split once it
    /// is closed. Setting `terminate` makes the current split the last one:
    /// it is closed and recorded with whatever it holds, and the summary comes
    /// back with `terminated` set.
    pub fn split_with<F>(
        &self,
        source: &Path,
        output_dir: &Path,
        terminate: &TerminateFlag,
        mut on_split: F,
    ) -> Result<SplitSummary>
    where
        F: FnMut(&Path, u64),
    {
        let start_time = Instant::now();
        info!(
            "Starting file split: {} -> {} ({} {} per split)",
            source.display(),
            output_dir.display(),
            self.config.limit,
            self.config.mode.unit_name()
        );

        if !source.is_file() {
            return Err(SplitError::not_found(source));
        }
        if !output_dir.is_dir() {
            return Err(SplitError::invalid_destination(output_dir));
        }

        let source_path = fs::canonicalize(source)?;
        let manifest_path = output_dir.join(&self.config.manifest_name);
        ensure_not_source(&manifest_path, &source_path)?;

        let (stem, ext) = name_parts(source);
        let mut units = self.open_units(source)?;
        let mut manifest = ManifestWriter::create(&manifest_path)?;

        let mut ctx = SplitContext {
            terminate,
            header: None,
            header_read: false,
            carryover: None,
            pending_text: None,
        };
        let mut splits = Vec::new();
        let mut terminated = false;

        for seq in 1.. {
            let filename = split_file_name(&stem, &self.config.delimiter, seq, &ext);
            let split_path = output_dir.join(&filename);
            ensure_not_source(&split_path, &source_path)?;
            let outcome = self.write_split(&split_path, units.as_mut(), &mut ctx)?;

            let record = ManifestRecord {
                filename,
                filesize: outcome.bytes,
                encoding: self.write_codec.map(|c| c.name().to_string()),
                header: ctx.header.is_some(),
            };
            manifest.append(&record)?;
            debug!(
                "Wrote split {} ({} bytes, {} units)",
                split_path.display(),
                outcome.bytes,
                outcome.units
            );
            on_split(&split_path, outcome.bytes);
            splits.push(record);

            if outcome.terminated {
                info!("Terminate flag set, stopping after split {}", seq);
                terminated = true;
                break;
            }
            if ctx.carryover.is_none() && ctx.pending_text.is_none() {
                break;
            }
        }
        manifest.finish()?;

        info!(
            "File split of {} completed in {:?}: {} splits",
            source.display(),
            start_time.elapsed(),
            splits.len()
        );

        Ok(SplitSummary {
            manifest_path,
            splits,
            terminated,
        })
    }

    fn open_units(&self, source: &Path) -> Result<Box<dyn UnitReader>> {
        let file = File::open(source)?;
        let reader: Box<dyn BufRead> = match self.read_codec {
            Some(codec) => Box::new(BufReader::new(codec.decode_reader(file))),
            None => Box::new(BufReader::new(file)),
        };

        let units: Box<dyn UnitReader> = if self.config.line_oriented() {
            Box::new(LineReader::new(reader))
        } else if self.read_codec.is_some() {
            Box::new(ChunkReader::text(reader, self.config.read_buffer_size()))
        } else {
            Box::new(ChunkReader::new(reader, self.config.read_buffer_size()))
        };
        Ok(units)
    }

    /// Next unit in the form it is written to disk
    fn next_encoded(&self, units: &mut dyn UnitReader) -> Result<Option<Bytes>> {
        match units.next_unit()? {
            Some(unit) => Ok(Some(self.encode(&unit)?)),
            None => Ok(None),
        }
    }

    fn encode(&self, unit: &[u8]) -> Result<Bytes> {
        let encoded = match self.write_codec {
            Some(codec) => codec.encode(unit)?,
            None => unit.to_vec(),
        };
        Ok(Bytes::from(encoded))
    }

    /// Raw chunks of decoded text may be cut anywhere between characters
    fn trims_text_chunks(&self) -> bool {
        self.config.mode == SplitMode::ByteSize
            && !self.config.line_oriented()
            && self.write_codec.is_some()
    }

    /// Write as much of the text chunk `unit` as the budget leaves room for.
    ///
    /// The rest is kept in the context and starts the next split. A single
    /// character larger than the whole limit is written on its own.
    fn write_text_prefix<W: Write>(
        &self,
        writer: &mut W,
        unit: Vec<u8>,
        budget: &mut Budget,
        ctx: &mut SplitContext<'_>,
        path: &Path,
    ) -> Result<()> {
        let Some(codec) = self.write_codec else {
            return Ok(());
        };
        let mut cut = codec.fitting_prefix(&unit, budget.remaining())?;
        if cut == 0 && budget.body_units == 0 {
            cut = std::str::from_utf8(&unit)
                .ok()
                .and_then(|text| text.chars().next())
                .map_or(unit.len(), char::len_utf8);
            warn!(
                "Character does not fit the {} byte limit, writing it to {} anyway",
                self.config.limit,
                path.display()
            );
        }

        if cut > 0 {
            let head = codec.encode(&unit[..cut])?;
            writer.write_all(&head)?;
            budget.charge(head.len() as u64);
        }
        if cut < unit.len() {
            ctx.pending_text = Some(unit[cut..].to_vec());
        }
        Ok(())
    }

    fn write_split(
        &self,
        path: &Path,
        units: &mut dyn UnitReader,
        ctx: &mut SplitContext<'_>,
    ) -> Result<SplitOutcome> {
        let mut writer = BufWriter::new(File::create(path)?);
        let mut budget = Budget::new(self.config.mode, self.config.limit);
        let mut terminated = false;

        if self.config.options.include_header {
            if !ctx.header_read {
                ctx.header = self.next_encoded(units)?.filter(|h| !h.is_empty());
                ctx.header_read = true;
            }
            if let Some(header) = &ctx.header {
                writer.write_all(header)?;
                budget.charge_header(header.len() as u64);
            }
        }

        if let Some(carryover) = ctx.carryover.take() {
            writer.write_all(&carryover)?;
            budget.charge(carryover.len() as u64);
        }

        loop {
            if ctx.terminate.is_set() {
                terminated = true;
                break;
            }
            let raw = match ctx.pending_text.take() {
                Some(text) => Some(text),
                None => units.next_unit()?,
            };
            let Some(raw) = raw else {
                break;
            };
            let unit = self.encode(&raw)?;
            let len = unit.len() as u64;
            if self.trims_text_chunks() && !budget.fits(len) {
                self.write_text_prefix(&mut writer, raw, &mut budget, ctx, path)?;
                if ctx.pending_text.is_some() {
                    break;
                }
                continue;
            }
            if !budget.admits(len) {
                ctx.carryover = Some(unit);
                break;
            }
            if self.config.mode == SplitMode::ByteSize && budget.bytes + len > self.config.limit {
                warn!(
                    "Unit of {} bytes does not fit the {} byte limit, writing it to {} anyway",
                    len,
                    self.config.limit,
                    path.display()
                );
            }
            writer.write_all(&unit)?;
            budget.charge(len);
        }

        writer.flush()?;
        Ok(SplitOutcome {
            bytes: budget.bytes,
            units: budget.body_units,
            terminated,
        })
    }
}

impl Default for FileSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Refuse to create `path` when it resolves to the source being split.
///
/// A path that does not exist yet cannot be the source.
fn ensure_not_source(path: &Path, source: &Path) -> Result<()> {
    match fs::canonicalize(path) {
        Ok(resolved) if resolved == source => Err(SplitError::configuration(format!(
            "{} would overwrite the file being split",
            path.display()
        ))),
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Split a file name into stem and extension (with its dot), the way split names are built from it
fn name_parts(source: &Path) -> (String, String) {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = source
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_source(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_raw_byte_split_sizes() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "blob.bin", &[7u8; 1000]);
        let out = TempDir::new().unwrap();

        let splitter = FileSplitter::with_config(SplitConfig::by_size(300)).unwrap();
        let summary = splitter.split_file(&source, out.path()).unwrap();

        let sizes: Vec<u64> = summary.splits.iter().map(|s| s.filesize).collect();
        assert_eq!(sizes, vec![300, 300, 300, 100]);
        assert!(!summary.terminated);
        for record in &summary.splits {
            let on_disk = fs::metadata(out.path().join(&record.filename)).unwrap().len();
            assert_eq!(on_disk, record.filesize);
        }
    }

    #[test]
    fn test_split_names_follow_sequence() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "report.final.csv", b"0123456789");
        let out = TempDir::new().unwrap();

        let mut config = SplitConfig::by_size(4);
        config.delimiter = "-".to_string();
        let splitter = FileSplitter::with_config(config).unwrap();
        let summary = splitter.split_file(&source, out.path()).unwrap();

        let names: Vec<&str> = summary.splits.iter().map(|s| s.filename.as_str()).collect();
        assert_eq!(names, vec!["report.final-1.csv", "report.final-2.csv", "report.final-3.csv"]);
        assert_eq!(splitter.split_path(&source, out.path(), 2), out.path().join("report.final-2.csv"));
    }

    #[test]
    fn test_empty_source_gives_one_empty_split() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "empty.txt", b"");
        let out = TempDir::new().unwrap();

        let mut config = SplitConfig::by_line_count(3);
        config.options.include_header = true;
        let summary = FileSplitter::with_config(config)
            .unwrap()
            .split_file(&source, out.path())
            .unwrap();

        assert_eq!(summary.splits.len(), 1);
        assert_eq!(summary.splits[0].filesize, 0);
        assert!(!summary.splits[0].header);
    }

    #[test]
    fn test_oversized_line_gets_its_own_split() {
        let dir = TempDir::new().unwrap();
        let long = "x".repeat(50);
        let source = write_source(&dir, "lines.txt", format!("short\n{long}\nend\n").as_bytes());
        let out = TempDir::new().unwrap();

        let mut config = SplitConfig::by_size(20);
        config.options.newline_aligned = true;
        let summary = FileSplitter::with_config(config)
            .unwrap()
            .split_file(&source, out.path())
            .unwrap();

        let sizes: Vec<u64> = summary.splits.iter().map(|s| s.filesize).collect();
        assert_eq!(sizes, vec![6, 51, 4]);
    }

    #[test]
    fn test_callback_sees_every_split() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "data.txt", b"a\nb\nc\nd\ne\n");
        let out = TempDir::new().unwrap();

        let splitter = FileSplitter::with_config(SplitConfig::by_line_count(2)).unwrap();
        let mut seen = Vec::new();
        let summary = splitter
            .split_with(&source, out.path(), &TerminateFlag::new(), |path, size| {
                seen.push((path.to_path_buf(), size));
            })
            .unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (out.path().join("data_1.txt"), 4));
        assert_eq!(seen[2], (out.path().join("data_3.txt"), 2));
        assert_eq!(summary.total_bytes(), 10);
    }

    #[test]
    fn test_terminate_before_start_keeps_one_empty_split() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "data.txt", b"a\nb\nc\n");
        let out = TempDir::new().unwrap();

        let flag = TerminateFlag::new();
        flag.terminate();
        let summary = FileSplitter::with_config(SplitConfig::by_line_count(1))
            .unwrap()
            .split_with(&source, out.path(), &flag, |_, _| {})
            .unwrap();

        assert!(summary.terminated);
        assert_eq!(summary.splits.len(), 1);
        assert_eq!(summary.splits[0].filesize, 0);
        assert!(!out.path().join("data_2.txt").exists());
    }

    #[test]
    fn test_terminate_from_callback_stops_after_current_split() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "data.txt", b"1\n2\n3\n4\n5\n6\n");
        let out = TempDir::new().unwrap();

        let flag = TerminateFlag::new();
        let observer = flag.clone();
        let summary = FileSplitter::with_config(SplitConfig::by_line_count(2))
            .unwrap()
            .split_with(&source, out.path(), &flag, |_, _| observer.terminate())
            .unwrap();

        // Split 2 starts with the carryover line and stops at its first checkpoint.
        assert!(summary.terminated);
        assert_eq!(summary.splits.len(), 2);
        assert_eq!(fs::read(out.path().join("data_1.txt")).unwrap(), b"1\n2\n");
        assert_eq!(fs::read(out.path().join("data_2.txt")).unwrap(), b"3\n");

        let manifest = crate::modules::manifest::read_manifest(&summary.manifest_path).unwrap();
        assert_eq!(manifest, summary.splits);
    }

    #[test]
    fn test_precondition_errors() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "data.txt", b"abc");
        let splitter = FileSplitter::with_config(SplitConfig::by_size(2)).unwrap();

        let missing = splitter.split_file(&dir.path().join("missing.txt"), dir.path());
        assert!(matches!(missing, Err(SplitError::NotFound { .. })));

        let bad_dir = splitter.split_file(&source, &dir.path().join("nowhere"));
        assert!(matches!(bad_dir, Err(SplitError::InvalidDestination { .. })));

        let not_a_dir = splitter.split_file(&source, &source);
        assert!(matches!(not_a_dir, Err(SplitError::InvalidDestination { .. })));
    }

    #[test]
    fn test_manifest_is_recreated() {
        let dir = TempDir::new().unwrap();
        let source = write_source(&dir, "data.txt", b"abcdef");
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("fs_manifest.csv"), "stale content\nfrom an older run\n").unwrap();

        let summary = FileSplitter::with_config(SplitConfig::by_size(3))
            .unwrap()
            .split_file(&source, out.path())
            .unwrap();

        let manifest = crate::modules::manifest::read_manifest(&summary.manifest_path).unwrap();
        assert_eq!(manifest.len(), 2);
    }
}
