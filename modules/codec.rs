//! Text encoding support for splits.
//!
//! A split operation configured with a read encoding decodes the source into
//! UTF-8 on the fly ([`DecodeReader`]) and re-encodes every unit with the write
//! encoding ([`TextCodec::encode`]) before its size is counted. Only
//! ASCII-compatible encodings can be written: they are the ones whose encoded
//! form keeps `\n` as a single byte, which the merger relies on when it drops
//! replicated header lines.

use std::io::{self, Read};

use encoding_rs::{Decoder, DecoderResult, Encoding};

use super::error::{Result, SplitError};

const DECODE_BUFFER: usize = 8 * 1024;

/// A resolved text encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextCodec {
    encoding: &'static Encoding,
}

impl TextCodec {
    /// Resolve an encoding label such as `utf-8`, `latin1` or `shift_jis`
    pub fn for_label(label: &str) -> Result<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(|encoding| Self { encoding })
            .ok_or_else(|| SplitError::configuration(format!("unknown encoding `{label}`")))
    }

    /// Resolve an encoding that split files can be written in
    pub fn for_writing(label: &str) -> Result<Self> {
        let codec = Self::for_label(label)?;
        if !codec.is_writable() {
            return Err(SplitError::configuration(format!(
                "split files cannot be written as {}",
                codec.name()
            )));
        }
        Ok(codec)
    }

    /// Canonical name, as recorded in the manifest
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    pub fn is_writable(&self) -> bool {
        self.encoding.output_encoding() == self.encoding && self.encoding.is_ascii_compatible()
    }

    /// Wrap `inner` so that reads yield the UTF-8 form of its content
    pub fn decode_reader<R: Read>(&self, inner: R) -> DecodeReader<R> {
        DecodeReader::new(inner, self.encoding.new_decoder_without_bom_handling())
    }

    /// Encode one complete UTF-8 unit.
    ///
    /// Fails with `InvalidData` when `utf8` is not valid UTF-8 or holds a
    /// character this encoding cannot represent.
    pub fn encode(&self, utf8: &[u8]) -> io::Result<Vec<u8>> {
        let text = std::str::from_utf8(utf8)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let (bytes, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("text cannot be represented in {}", self.name()),
            ));
        }
        Ok(bytes.into_owned())
    }

    /// Length in bytes of the longest prefix of `utf8`, cut on a character
    /// boundary, whose encoded form takes at most `max_len` bytes
    pub fn fitting_prefix(&self, utf8: &[u8], max_len: u64) -> io::Result<usize> {
        let text = std::str::from_utf8(utf8)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let mut char_buf = [0u8; 4];
        let mut used = 0u64;
        for (idx, ch) in text.char_indices() {
            let len = self.encode(ch.encode_utf8(&mut char_buf).as_bytes())?.len() as u64;
            if used + len > max_len {
                return Ok(idx);
            }
            used += len;
        }
        Ok(text.len())
    }
}

/// Streaming decoder producing UTF-8 from any encoding `encoding_rs` can read.
///
/// Malformed input is reported as an `InvalidData` error rather than replaced.
pub struct DecodeReader<R> {
    inner: R,
    decoder: Decoder,
    input: Box<[u8]>,
    input_pos: usize,
    input_len: usize,
    output: Box<[u8]>,
    output_pos: usize,
    output_len: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> DecodeReader<R> {
    fn new(inner: R, decoder: Decoder) -> Self {
        Self {
            inner,
            decoder,
            input: vec![0; DECODE_BUFFER].into_boxed_slice(),
            input_pos: 0,
            input_len: 0,
            output: vec![0; DECODE_BUFFER * 3].into_boxed_slice(),
            output_pos: 0,
            output_len: 0,
            eof: false,
            finished: false,
        }
    }

    fn refill_input(&mut self) -> io::Result<()> {
        if self.input_pos < self.input_len || self.eof {
            return Ok(());
        }
        self.input_pos = 0;
        self.input_len = loop {
            match self.inner.read(&mut self.input) {
                Ok(n) => break n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        };
        if self.input_len == 0 {
            self.eof = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for DecodeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.output_pos < self.output_len {
                let n = buf.len().min(self.output_len - self.output_pos);
                buf[..n].copy_from_slice(&self.output[self.output_pos..self.output_pos + n]);
                self.output_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }

            self.refill_input()?;
            let last = self.eof;
            let (result, read, written) = self.decoder.decode_to_utf8_without_replacement(
                &self.input[self.input_pos..self.input_len],
                &mut self.output,
                last,
            );
            self.input_pos += read;
            self.output_pos = 0;
            self.output_len = written;

            match result {
                DecoderResult::InputEmpty => {
                    if last {
                        self.finished = true;
                    }
                }
                DecoderResult::OutputFull => {}
                DecoderResult::Malformed(_, _) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("input is not valid {}", self.decoder.encoding().name()),
                    ));
                }
            }
        }
    }
}
