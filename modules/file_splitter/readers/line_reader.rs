use std::io::{self, BufRead};

use super::super::types::UnitReader;

/// Yields the source one line at a time, line terminator included
pub struct LineReader<R> {
    inner: R,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: BufRead> UnitReader for LineReader<R> {
    fn next_unit(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        if self.inner.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(data: &[u8]) -> Vec<Vec<u8>> {
        let mut reader = LineReader::new(data);
        let mut units = Vec::new();
        while let Some(unit) = reader.next_unit().unwrap() {
            units.push(unit);
        }
        units
    }

    #[test]
    fn test_lines_keep_terminators() {
        let units = collect(b"a,b\r\n1,2\n\nlast");
        assert_eq!(
            units,
            vec![b"a,b\r\n".to_vec(), b"1,2\n".to_vec(), b"\n".to_vec(), b"last".to_vec()]
        );
    }

    #[test]
    fn test_empty_source() {
        assert!(collect(b"").is_empty());
    }
}
