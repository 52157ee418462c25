//! Dump file constants.
//!
//! # File Layout
//!
//! ```text
//! HEADER_TITLE                              17 bytes
//! dump_version                              u64
//! 'H' + SHA-1(header) + header_len (u64)    29 bytes
//! header                                    header_len bytes
//! repeated:
//!   'D' + SHA-1(payload) + payload_len (u32) 25 bytes
//!   payload                                 payload_len bytes
//! ```
//!
//! All integers are big-endian.

use dbdump_core::SHA1_DIGEST_LEN;

/// Magic title at the start of every dump file.
pub const HEADER_TITLE: &[u8; 17] = b"\xFF\xD8\x00\x00\xD8EDGEDB\x00DUMP\x00";

/// Dump format version written by this crate.
pub const DUMP_PROTO_VER: u64 = 1;

/// Newest dump format version this crate can read.
pub const MAX_SUPPORTED_DUMP_VER: u64 = 1;

/// Marker byte of the header segment.
pub const HEADER_BLOCK_MARKER: u8 = b'H';

/// Marker byte of a data segment.
pub const DATA_BLOCK_MARKER: u8 = b'D';

/// Default buffer size for copying staged chunk bytes into the dump (10 MiB).
pub const COPY_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// Smallest accepted copy buffer (4 KiB).
pub const MIN_COPY_BUFFER_SIZE: usize = 4 * 1024;

/// Title plus version.
pub const FILE_PREFIX_SIZE: usize = HEADER_TITLE.len() + 8;

/// Marker, digest and u64 length of the header segment.
pub const HEADER_SEGMENT_PREFIX_SIZE: usize = 1 + SHA1_DIGEST_LEN + 8;

/// Marker, digest and u32 length of a data segment.
pub const DATA_SEGMENT_PREFIX_SIZE: usize = 1 + SHA1_DIGEST_LEN + 4;

/// Offset of the first header byte.
pub const HEADER_OFFSET: usize = FILE_PREFIX_SIZE + HEADER_SEGMENT_PREFIX_SIZE;
