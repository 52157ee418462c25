//! On-disk byte format of dump files.
//!
//! Kept apart from the writer and reader so the layout is defined in one
//! place.
//!
//! # Module Structure
//!
//! - `constants`: title, versions, markers, segment sizes
//! - `header`: header contents and their serialization

pub mod constants;
pub mod header;

pub use constants::{
    COPY_BUFFER_SIZE, DATA_BLOCK_MARKER, DATA_SEGMENT_PREFIX_SIZE, DUMP_PROTO_VER,
    FILE_PREFIX_SIZE, HEADER_BLOCK_MARKER, HEADER_OFFSET, HEADER_SEGMENT_PREFIX_SIZE,
    HEADER_TITLE, MAX_SUPPORTED_DUMP_VER, MIN_COPY_BUFFER_SIZE,
};
pub use header::{BlockDescriptor, ChunkInfo, DumpDescriptor, DumpHeader, HeaderBlock, ServerInfo};
