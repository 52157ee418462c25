//! Error types for byte-level I/O
//!
//! A short read is always reported with the number of bytes that were
//! actually available, so callers can tell a stream that ended exactly at a
//! record boundary (zero bytes obtained) from one that was torn mid-record.

use std::io;
use thiserror::Error;

/// Result type alias for cursor operations
pub type CursorResult<T> = std::result::Result<T, CursorError>;

/// Errors raised by [`ByteCursor`](crate::ByteCursor)
#[derive(Debug, Error)]
pub enum CursorError {
    /// Fewer bytes were available than a read required
    #[error("Unexpected end of stream at offset {position}: needed {expected} bytes, got {actual}")]
    UnexpectedEof {
        /// Offset at which the read started
        position: u64,
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes actually obtained
        actual: usize,
    },

    /// A length prefix carried a value that cannot describe a byte string
    #[error("Invalid length prefix {length} at offset {position}")]
    InvalidLength {
        /// Offset of the length prefix
        position: u64,
        /// Decoded length value
        length: i64,
    },

    /// A byte string is too long for a u32 length prefix
    #[error("Length {length} does not fit in a u32 length prefix")]
    LengthOverflow {
        /// Length of the byte string
        length: usize,
    },

    /// Underlying I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CursorError {
    /// True for any short read.
    pub fn is_eof(&self) -> bool {
        matches!(self, CursorError::UnexpectedEof { .. })
    }

    /// True when the stream was exhausted before a single byte of the read
    /// could be obtained.
    pub fn is_clean_eof(&self) -> bool {
        matches!(self, CursorError::UnexpectedEof { actual: 0, .. })
    }
}
