//! dbdump - checksummed database dump files and their wire protocol
//!
//! A dump is a single file: a magic title, a format version, a header
//! protected by SHA-1, then a sequence of SHA-1 protected data segments.
//! Restoring replays the verified header and blocks to a server.
//!
//! # Quick Start
//!
//! ```ignore
//! use dbdump::{write_dump, restore_from_path, DumpConfig, MemorySink, MemorySource, ServerInfo};
//!
//! let mut source = MemorySource::new(ServerInfo::new(0, "1.0", ""));
//! source.push_object(object_id, vec![], vec![], vec![b"abc".to_vec()]);
//! write_dump(&mut source, path, DumpConfig::default())?;
//!
//! let mut sink = MemorySink::new();
//! restore_from_path(path, &mut sink)?;
//! ```
//!
//! # Architecture
//!
//! - [`core`]: big-endian byte cursor and digest helpers
//! - [`wire`]: protocol message catalog and framing
//! - [`durability`]: dump file writer, reader, restore and verification

pub use dbdump_core as core;
pub use dbdump_durability as durability;
pub use dbdump_wire as wire;

pub use dbdump_durability::{
    restore_from_path, restore_from_path_with_config, verify_dump, write_dump, BlockDescriptor,
    BlockStep, DumpBlocks, DumpConfig, DumpError, DumpEvent, DumpReader, DumpResult, DumpSource,
    DumpVerifyInfo, DumpWriteInfo, DumpWriter, MemorySink, MemorySource, ProtocolDumpSource,
    ProtocolRestoreSink, RestoreConfig, RestoreSink, RestoreSummary, ServerInfo, WriterState,
};
