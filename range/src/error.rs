//! Error types for range expressions.

use std::io;
use std::path::PathBuf;

/// Result type alias for range parsing.
pub type Result<T> = std::result::Result<T, RangeError>;

/// Error type for range parsing.
#[derive(Debug, thiserror::Error)]
pub enum RangeError {
    /// The expression does not follow the grammar.
    #[error("{msg} at line {line}, offset {offset}: {text:?}")]
    Parse {
        msg: &'static str,
        /// Line of a range file; 1 for inline expressions.
        line: usize,
        /// Byte offset in the line.
        offset: usize,
        text: String,
    },

    /// A `@file` expression named a file that could not be read.
    #[error("cannot read range file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
