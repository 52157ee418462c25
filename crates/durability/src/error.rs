//! Dump and restore errors.
//!
//! Every failure is fatal to the operation that raised it. Classifiers
//! group variants the way a driver reports them to a user:
//! - [`DumpError::is_format`]: the input is not a readable dump
//! - [`DumpError::is_integrity`]: the bytes or the recorded metadata
//!   disagree with what the dump claims

use std::io;

use dbdump_core::CursorError;
use dbdump_wire::WireError;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::writer::WriterState;

/// Result type for dump and restore operations
pub type DumpResult<T> = Result<T, DumpError>;

/// Errors raised while writing, reading or verifying a dump
#[derive(Debug, Error)]
pub enum DumpError {
    /// File does not start with the dump title
    #[error("Input is not a recognized dump")]
    NotADump,

    /// Dump version is newer than this reader supports
    #[error("Dump version {version} is not supported (maximum supported is {max})")]
    UnsupportedVersion {
        /// Version found in the file
        version: u64,
        /// Newest readable version
        max: u64,
    },

    /// Header segment marker is missing
    #[error("Cannot find header block: found marker {found:#04x}")]
    MissingHeaderBlock {
        /// Byte found where the marker was expected
        found: u8,
    },

    /// Header bytes do not match the stored digest
    #[error("Dump header does not match checksum: expected {expected}, got {actual}")]
    HeaderChecksumMismatch {
        /// Stored digest (hex)
        expected: String,
        /// Digest of the bytes read (hex)
        actual: String,
    },

    /// Data segment marker is missing
    #[error("Cannot read data block {index}: found marker {found:#04x}")]
    MissingDataBlock {
        /// Zero-based segment index
        index: u64,
        /// Byte found where the marker was expected
        found: u8,
    },

    /// Data segment payload does not match its stored digest
    #[error("Data block {index} does not match checksum: expected {expected}, got {actual}")]
    BlockChecksumMismatch {
        /// Zero-based segment index
        index: u64,
        /// Stored digest (hex)
        expected: String,
        /// Digest of the bytes read (hex)
        actual: String,
    },

    /// The file ended inside a field
    #[error("Dump is truncated while reading {context}: {source}")]
    Truncated {
        /// What was being read
        context: String,
        /// Underlying short read
        #[source]
        source: CursorError,
    },

    /// Received chunk count differs from the declared count
    #[error("Block {object_id} declares {declared} chunks but {received} were received")]
    BlockCountMismatch {
        /// Schema object id
        object_id: Uuid,
        /// `data_blocks_count` from the descriptor
        declared: u64,
        /// Chunks actually received
        received: u64,
    },

    /// Received byte total differs from the declared size
    #[error("Block {object_id} declares {declared} bytes but {received} were received")]
    DataSizeMismatch {
        /// Schema object id
        object_id: Uuid,
        /// `data_size` from the descriptor
        declared: u64,
        /// Bytes actually received
        received: u64,
    },

    /// Chunks arrived for an object no descriptor declares
    #[error("Received data for undeclared object {object_id}")]
    UndeclaredObject {
        /// Schema object id
        object_id: Uuid,
    },

    /// The same object was declared twice
    #[error("Object {object_id} is declared more than once")]
    DuplicateDescriptor {
        /// Schema object id
        object_id: Uuid,
    },

    /// A chunk does not fit one data segment
    #[error("Chunk of {size} bytes for object {object_id} exceeds the limit of {max} bytes")]
    ChunkTooLarge {
        /// Schema object id
        object_id: Uuid,
        /// Chunk length
        size: u64,
        /// Configured limit
        max: u64,
    },

    /// Data segments disagree with the chunk table in the header
    #[error("Data block {index} disagrees with the header: {reason}")]
    ChunkTableMismatch {
        /// Zero-based segment index
        index: u64,
        /// Description of the disagreement
        reason: String,
    },

    /// Block sequence used after it already failed
    #[error("Block sequence was aborted by an earlier error")]
    SequenceAborted,

    /// Writer operation called in the wrong state
    #[error("Cannot {operation} while the dump writer is {state}")]
    InvalidState {
        /// Operation attempted
        operation: &'static str,
        /// Current writer state
        state: WriterState,
    },

    /// Header bytes are well-formed but not a valid header
    #[error("Invalid dump header: {reason}")]
    InvalidHeader {
        /// Description of the problem
        reason: String,
    },

    /// The server answered a dump or restore with `ErrorResponse`
    #[error("Server error {code:#010x}: {message}")]
    Server {
        /// Server error code
        code: u32,
        /// Server error message
        message: String,
    },

    /// The server's replies do not follow the dump or restore flow
    #[error("Protocol violation: {reason}")]
    Protocol {
        /// Description of the violation
        reason: String,
    },

    /// The dump source failed
    #[error("Dump source failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The restore sink failed
    #[error("Restore sink failed: {0}")]
    Sink(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Byte-level encoding failure
    #[error("Encoding error: {0}")]
    Cursor(#[from] CursorError),

    /// Wire message failure
    #[error("Wire protocol error: {0}")]
    Wire(#[from] WireError),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DumpError {
    /// Wrap a dump source failure.
    pub fn source_failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        DumpError::Source(err.into())
    }

    /// Describe a protocol violation.
    pub fn protocol(reason: impl Into<String>) -> Self {
        DumpError::Protocol {
            reason: reason.into(),
        }
    }

    /// Wrap a restore sink failure.
    pub fn sink_failed(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        DumpError::Sink(err.into())
    }

    /// Bytes or recorded metadata contradict the dump's own claims.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            DumpError::HeaderChecksumMismatch { .. }
                | DumpError::BlockChecksumMismatch { .. }
                | DumpError::BlockCountMismatch { .. }
                | DumpError::DataSizeMismatch { .. }
                | DumpError::UndeclaredObject { .. }
                | DumpError::DuplicateDescriptor { .. }
                | DumpError::ChunkTableMismatch { .. }
        )
    }

    /// Input is structurally not a readable dump.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            DumpError::NotADump
                | DumpError::UnsupportedVersion { .. }
                | DumpError::MissingHeaderBlock { .. }
                | DumpError::MissingDataBlock { .. }
                | DumpError::Truncated { .. }
                | DumpError::InvalidHeader { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_version_names_version() {
        let err = DumpError::UnsupportedVersion { version: 7, max: 1 };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(err.is_format());
        assert!(!err.is_integrity());
    }

    #[test]
    fn test_checksum_mismatch_is_integrity() {
        let err = DumpError::BlockChecksumMismatch {
            index: 3,
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(err.is_integrity());
        assert!(err.to_string().contains("expected aa, got bb"));
    }

    #[test]
    fn test_truncated_keeps_source() {
        use std::error::Error as _;
        let err = DumpError::Truncated {
            context: "data block 0 payload".into(),
            source: CursorError::UnexpectedEof {
                position: 80,
                expected: 10,
                actual: 4,
            },
        };
        assert!(err.source().is_some());
        assert!(err.is_format());
    }

    #[test]
    fn test_source_wrapping() {
        let err = DumpError::source_failed("connection reset");
        assert!(matches!(err, DumpError::Source(_)));
        assert!(!err.is_format() && !err.is_integrity());
    }

    #[test]
    fn test_missing_block_marker_display() {
        let err = DumpError::MissingHeaderBlock { found: b'D' };
        assert!(err.to_string().contains("0x44"));
    }

    #[test]
    fn test_server_error_display() {
        let err = DumpError::Server {
            code: 0x0500_0001,
            message: "restore failed".into(),
        };
        assert_eq!(err.to_string(), "Server error 0x05000001: restore failed");
        assert!(!err.is_format() && !err.is_integrity());
        assert!(DumpError::protocol("no header").to_string().contains("no header"));
    }
}
