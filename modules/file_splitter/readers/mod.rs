//! Unit readers feeding the split engine
//!
//! - ChunkReader: fixed-size raw chunks, for byte-size splits that may cut mid-line
//! - LineReader: one line per unit, for newline-aligned and line-count splits

pub mod chunk_reader;
pub mod line_reader;

pub use chunk_reader::ChunkReader;
pub use line_reader::LineReader;
