use std::io::{self, Read};

use super::super::types::UnitReader;

/// Yields the source in chunks of `buffer_size` bytes; only the last chunk may be shorter.
///
/// In text mode the source is UTF-8 produced by a decoder, and chunks are
/// trimmed back to a character boundary so that every chunk can be
/// re-encoded on its own. The trimmed tail starts the next chunk.
pub struct ChunkReader<R> {
    inner: R,
    buffer_size: usize,
    text: bool,
    pending: Vec<u8>,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(inner: R, buffer_size: usize) -> Self {
        Self {
            inner,
            buffer_size: buffer_size.max(1),
            text: false,
            pending: Vec::new(),
        }
    }

    pub fn text(inner: R, buffer_size: usize) -> Self {
        Self {
            text: true,
            ..Self::new(inner, buffer_size)
        }
    }

    fn fill(&mut self, chunk: &mut Vec<u8>, target: usize) -> io::Result<usize> {
        let wanted = target.saturating_sub(chunk.len()) as u64;
        self.inner.by_ref().take(wanted).read_to_end(chunk)
    }

    fn align_to_char_boundary(&mut self, chunk: &mut Vec<u8>) -> io::Result<()> {
        loop {
            match std::str::from_utf8(chunk).map(|_| ()) {
                Ok(_) => return Ok(()),
                Err(err) if err.error_len().is_some() => {
                    return Err(io::Error::new(io::ErrorKind::InvalidData, err));
                }
                Err(err) if err.valid_up_to() > 0 => {
                    self.pending = chunk.split_off(err.valid_up_to());
                    return Ok(());
                }
                // Buffer shorter than the first character: grow until it is complete.
                Err(err) => {
                    let target = chunk.len() + 1;
                    if self.fill(chunk, target)? == 0 {
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, err));
                    }
                }
            }
        }
    }
}

impl<R: Read> UnitReader for ChunkReader<R> {
    fn next_unit(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut chunk = std::mem::take(&mut self.pending);
        self.fill(&mut chunk, self.buffer_size)?;
        if chunk.is_empty() {
            return Ok(None);
        }
        if self.text {
            self.align_to_char_boundary(&mut chunk)?;
        }
        Ok(Some(chunk))
    }
}
