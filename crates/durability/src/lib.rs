//! Dump and restore for dbdump
//!
//! This crate handles everything that touches the dump file:
//!
//! - Binary file format: title, version, checksummed header, data segments
//! - DumpWriter: stages chunks from a source, checks the declared metadata
//!   and writes the file atomically
//! - DumpReader: verifies the header and yields checksum-verified data blocks
//!   until the file ends at a segment boundary
//! - A dump source reading a server's dump replies, and restore sinks,
//!   including one that replays the dump over the wire
//! - Offline verification against the recorded chunk table

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config; // Dump and restore configuration
pub mod error; // DumpError and classifiers
pub mod format; // On-disk layout and header serialization
pub mod protocol; // Wire-backed dump source and restore sink
pub mod reader; // Header verification and the data block sequence
pub mod sink; // Restore sink seam and built-in sinks
pub mod source; // Dump source seam and in-memory source
pub mod staging; // Scratch file for chunks received during a dump
pub mod verify; // Offline verification
pub mod writer; // DumpWriter state machine

// === Re-exports ===
pub use config::{ConfigError, DumpConfig, RestoreConfig};
pub use error::{DumpError, DumpResult};
pub use format::{
    BlockDescriptor, ChunkInfo, DumpDescriptor, DumpHeader, HeaderBlock, ServerInfo,
    COPY_BUFFER_SIZE, DATA_BLOCK_MARKER, DUMP_PROTO_VER, HEADER_BLOCK_MARKER, HEADER_TITLE,
    MAX_SUPPORTED_DUMP_VER,
};
pub use reader::{BlockStep, DumpBlocks, DumpReader, ReaderState};
pub use protocol::{ProtocolDumpSource, ProtocolRestoreSink};
pub use sink::{
    restore_from_path, restore_from_path_with_config, MemorySink, RestoreSink, RestoreSummary,
};
pub use source::{DumpEvent, DumpSource, MemorySource};
pub use staging::{ChunkStaging, StagedChunk};
pub use verify::{verify_dump, verify_dump_from, BlockSummary, DumpVerifyInfo};
pub use writer::{write_dump, DumpWriteInfo, DumpWriter, WriterState};
