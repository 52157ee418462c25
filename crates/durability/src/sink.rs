//! Restore sink seam.
//!
//! A sink consumes a verified dump: the header bytes first, then the data
//! blocks, pulled from the reader one at a time. The sink decides what the
//! bytes mean; this layer only guarantees they are exactly what was dumped.
//! The wire-backed sink lives in [`crate::protocol`].

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::config::RestoreConfig;
use crate::error::DumpResult;
use crate::reader::{DumpBlocks, DumpReader, ReaderState};

/// Consumer of a verified dump.
pub trait RestoreSink {
    /// Restore `header` followed by the data blocks in `blocks`.
    ///
    /// Any error from `blocks` must be returned unchanged.
    fn restore<R: Read>(&mut self, header: &[u8], blocks: &mut DumpBlocks<R>) -> DumpResult<()>;
}

/// Summary of a finished restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    /// Dump format version
    pub version: u64,
    /// Header length in bytes
    pub header_bytes: u64,
    /// Data blocks handed to the sink
    pub blocks: u64,
    /// Payload bytes handed to the sink
    pub data_bytes: u64,
    /// Whether the sink consumed the sequence to its end
    pub complete: bool,
}

/// Restore the dump at `path` into `sink`.
pub fn restore_from_path<S: RestoreSink>(
    path: &Path,
    sink: &mut S,
) -> DumpResult<RestoreSummary> {
    restore_from_path_with_config(path, sink, &RestoreConfig::default())
}

/// Restore the dump at `path` into `sink` with `config`.
pub fn restore_from_path_with_config<S: RestoreSink>(
    path: &Path,
    sink: &mut S,
    config: &RestoreConfig,
) -> DumpResult<RestoreSummary> {
    let reader = DumpReader::open_with_config(path, config)?;
    let version = reader.version();
    let (header, mut blocks) = reader.into_parts();

    sink.restore(&header, &mut blocks)?;

    let summary = RestoreSummary {
        version,
        header_bytes: header.len() as u64,
        blocks: blocks.blocks_read(),
        data_bytes: blocks.bytes_read(),
        complete: blocks.state() == ReaderState::Done,
    };
    info!(
        target: "dbdump::restore",
        path = %path.display(),
        blocks = summary.blocks,
        bytes = summary.data_bytes,
        complete = summary.complete,
        "Restore completed"
    );
    Ok(summary)
}

/// Sink that keeps everything in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    /// Header bytes received
    pub header: Vec<u8>,
    /// Data blocks received, in order
    pub blocks: Vec<Vec<u8>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RestoreSink for MemorySink {
    fn restore<R: Read>(&mut self, header: &[u8], blocks: &mut DumpBlocks<R>) -> DumpResult<()> {
        self.header = header.to_vec();
        for block in blocks {
            self.blocks.push(block?);
        }
        Ok(())
    }
}
