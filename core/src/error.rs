//! Error types for stream operations.
//!
//! Every variant is fatal: the pipeline that produced it should stop. The
//! recoverable outcomes of the stream contracts (end of segment, end of
//! stream, unsupported seek) are ordinary return values, never errors.

use std::io;

/// Result type alias for stream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for stream operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error from the underlying handle.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// File does not start with the expected magic bytes.
    #[error("bad magic: expected {expected:?}, got {got:?}")]
    BadMagic { expected: [u8; 4], got: [u8; 4] },

    /// Unknown format version.
    #[error("unknown version: expected {expected}, got {got}")]
    BadVersion { expected: i32, got: i32 },

    /// Structural corruption of a file.
    #[error("corrupt stream: {0}")]
    Corrupt(String),

    /// A segment carried a different number than the cursor expected.
    #[error("segment mismatch: expected segment {expected}, found {found}")]
    SegmentMismatch { expected: usize, found: usize },

    /// Segment index and data disagree.
    #[error("index mismatch: {0}")]
    IndexMismatch(String),

    /// The file ended inside a record.
    #[error("truncated {0}")]
    Truncated(&'static str),

    /// Frame width differs from what the stream requires.
    #[error("width mismatch: expected {expected}, got {got}")]
    WidthMismatch { expected: usize, got: usize },

    /// A label value does not fit the consumer's range.
    #[error("label {label} out of range (size {size})")]
    LabelOutOfRange { label: u32, size: usize },

    /// Data was read before the first `nextseg()`.
    #[error("read before nextseg")]
    NotPositioned,

    /// Two streams that must advance together disagreed.
    #[error("inconsistent streams: {0}")]
    Inconsistent(String),

    /// Seek target lies outside the stream.
    #[error("seek out of range: segment {segno}, frame {frameno}")]
    SeekOutOfRange { segno: usize, frameno: usize },

    /// An operation needs a seekable, indexed upstream.
    #[error("stream is not seekable: {0}")]
    NotSeekable(&'static str),

    /// Caller supplied an output buffer too small for the request.
    #[error("buffer too small: need {need} values, got {got}")]
    BufferTooSmall { need: usize, got: usize },

    /// Text input could not be parsed.
    #[error("parse error at line {line}: {msg}")]
    Parse { line: usize, msg: String },

    /// Invalid construction parameters.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A writer was asked to finish a segment with no frames.
    #[error("zero length segment {0}")]
    ZeroLengthSegment(usize),

    /// A writer was closed with frames not yet terminated by `doneseg()`.
    #[error("closed in the middle of segment {0}")]
    UnfinishedSegment(usize),
}

impl Error {
    /// Builds a [`Error::Corrupt`] from anything printable.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// Builds a [`Error::Inconsistent`] from anything printable.
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Error::Inconsistent(msg.into())
    }
}
