//! Core byte-level primitives for dbdump
//!
//! This crate defines the pieces shared by the wire codec and the dump file
//! format:
//! - ByteCursor: position-aware big-endian reader/writer over any stream
//! - CursorError: short-read and framing errors, with byte counts
//! - SHA-1 digest helpers used for dump integrity

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checksum;
pub mod cursor;
pub mod error;

pub use checksum::{digest_hex, sha1_digest, Sha1Digest, SHA1_DIGEST_LEN};
pub use cursor::ByteCursor;
pub use error::{CursorError, CursorResult};
