//! Offline dump verification.
//!
//! Reads a whole dump without restoring it: every checksum is checked and
//! every data segment is matched against the chunk table in the header.

use std::io::Read;
use std::path::{Path, PathBuf};

use dbdump_core::digest_hex;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::config::RestoreConfig;
use crate::error::DumpResult;
use crate::format::ServerInfo;
use crate::reader::DumpReader;

/// Summary of one block of a verified dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    /// Schema object id
    pub schema_object_id: Uuid,
    /// Objects restored before this one
    pub schema_deps: Vec<Uuid>,
    /// Payload bytes
    pub data_size: u64,
    /// Data segments
    pub data_blocks_count: u64,
}

/// Result of a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpVerifyInfo {
    /// Verified file, if read from a path
    pub path: Option<PathBuf>,
    /// Dump format version
    pub version: u64,
    /// SHA-1 of the header (hex)
    pub header_digest: String,
    /// Producing server
    pub server: ServerInfo,
    /// Blocks in file order
    pub blocks: Vec<BlockSummary>,
    /// Data segments read
    pub chunks: u64,
    /// Payload bytes read
    pub data_bytes: u64,
}

impl DumpVerifyInfo {
    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Verify the dump at `path`.
pub fn verify_dump(path: &Path) -> DumpResult<DumpVerifyInfo> {
    let config = RestoreConfig::new().with_verify_header_table(true);
    let reader = DumpReader::open_with_config(path, &config)?;
    let mut info = verify_reader(reader)?;
    info.path = Some(path.to_path_buf());
    Ok(info)
}

/// Verify a dump read from `reader`.
pub fn verify_dump_from<R: Read>(reader: R) -> DumpResult<DumpVerifyInfo> {
    let config = RestoreConfig::new().with_verify_header_table(true);
    verify_reader(DumpReader::from_reader_with_config(reader, &config)?)
}

fn verify_reader<R: Read>(reader: DumpReader<R>) -> DumpResult<DumpVerifyInfo> {
    let header = reader.decode_header()?;
    let version = reader.version();
    let header_digest = digest_hex(reader.header_digest());

    let mut blocks = reader.blocks();
    for block in blocks.by_ref() {
        block?;
    }

    let info = DumpVerifyInfo {
        path: None,
        version,
        header_digest,
        blocks: header
            .blocks
            .into_iter()
            .map(|b| BlockSummary {
                schema_object_id: b.descriptor.schema_object_id,
                schema_deps: b.descriptor.schema_deps,
                data_size: b.descriptor.data_size,
                data_blocks_count: b.descriptor.data_blocks_count,
            })
            .collect(),
        server: header.server,
        chunks: blocks.blocks_read(),
        data_bytes: blocks.bytes_read(),
    };
    info!(
        target: "dbdump::restore",
        blocks = info.blocks.len(),
        chunks = info.chunks,
        bytes = info.data_bytes,
        "Dump verified"
    );
    Ok(info)
}
