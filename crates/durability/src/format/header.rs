//! Dump header layout.
//!
//! The header describes the server that produced the dump and, per schema
//! object, its dependencies, type description and the size and digest of
//! every data chunk in arrival order:
//!
//! ```text
//! server_timestamp          u64
//! server_version            u32-length-prefixed bytes
//! schema_ddl_text           u32-length-prefixed bytes
//! block_count               u64
//! for each block:
//!   schema_object_id        16 bytes
//!   dep_count               u32
//!   deps[dep_count]         16 bytes each
//!   type_desc               u32-length-prefixed bytes
//!   data_size               u64
//!   data_blocks_count       u64
//!   for each chunk:
//!     chunk_size            u64
//!     chunk_sha1            20 bytes
//! ```

use dbdump_core::{ByteCursor, CursorError, Sha1Digest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DumpError, DumpResult};

/// Upper bound on entries reserved ahead of a count read from a header.
const HEADER_PREALLOC_LIMIT: usize = 4096;

/// Server that produced a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Server time at dump start (seconds since epoch).
    pub server_timestamp: u64,
    /// Server version string.
    pub server_version: String,
    /// Schema DDL text.
    pub schema_ddl_text: String,
}

impl ServerInfo {
    /// Create server information.
    pub fn new(
        server_timestamp: u64,
        server_version: impl Into<String>,
        schema_ddl_text: impl Into<String>,
    ) -> Self {
        ServerInfo {
            server_timestamp,
            server_version: server_version.into(),
            schema_ddl_text: schema_ddl_text.into(),
        }
    }
}

/// Metadata of one schema object in a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    /// Schema object id.
    pub schema_object_id: Uuid,
    /// Objects that must be restored before this one.
    pub schema_deps: Vec<Uuid>,
    /// Opaque description of the object's type layout.
    pub type_desc: Vec<u8>,
    /// Sum of all chunk sizes for this object.
    pub data_size: u64,
    /// Number of chunks the source emits for this object.
    pub data_blocks_count: u64,
}

impl BlockDescriptor {
    /// Create a descriptor with no dependencies and an empty type description.
    pub fn new(schema_object_id: Uuid, data_size: u64, data_blocks_count: u64) -> Self {
        BlockDescriptor {
            schema_object_id,
            schema_deps: Vec::new(),
            type_desc: Vec::new(),
            data_size,
            data_blocks_count,
        }
    }

    /// Set dependencies (builder pattern).
    pub fn with_deps(mut self, deps: Vec<Uuid>) -> Self {
        self.schema_deps = deps;
        self
    }

    /// Set type description (builder pattern).
    pub fn with_type_desc(mut self, type_desc: Vec<u8>) -> Self {
        self.type_desc = type_desc;
        self
    }
}

/// Server information plus the ordered block descriptors of a dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpDescriptor {
    /// Producing server.
    pub server: ServerInfo,
    /// Block descriptors in declaration order.
    pub blocks: Vec<BlockDescriptor>,
}

impl DumpDescriptor {
    /// Descriptor with no blocks yet.
    pub fn new(server: ServerInfo) -> Self {
        DumpDescriptor {
            server,
            blocks: Vec::new(),
        }
    }

    /// Find the descriptor for `object_id`.
    pub fn block(&self, object_id: &Uuid) -> Option<&BlockDescriptor> {
        self.blocks.iter().find(|b| b.schema_object_id == *object_id)
    }
}

/// Size and digest of one recorded chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkInfo {
    /// Chunk length in bytes.
    pub size: u64,
    /// SHA-1 of the chunk bytes.
    pub digest: Sha1Digest,
}

/// A block descriptor with its recorded chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Declared metadata.
    pub descriptor: BlockDescriptor,
    /// Recorded chunks, in arrival order.
    pub chunks: Vec<ChunkInfo>,
}

/// Decoded dump header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpHeader {
    /// Producing server.
    pub server: ServerInfo,
    /// Blocks in file order.
    pub blocks: Vec<HeaderBlock>,
}

impl DumpHeader {
    /// Total number of recorded chunks.
    pub fn chunk_count(&self) -> usize {
        self.blocks.iter().map(|b| b.chunks.len()).sum()
    }

    /// Recorded chunks of every block, flattened in file order.
    pub fn chunk_table(&self) -> Vec<ChunkInfo> {
        self.blocks
            .iter()
            .flat_map(|b| b.chunks.iter().copied())
            .collect()
    }

    /// Serialize the header.
    ///
    /// Each block's chunk list is written as-is; the caller is responsible
    /// for it agreeing with `data_blocks_count`.
    pub fn encode(&self) -> DumpResult<Vec<u8>> {
        let mut cursor = ByteCursor::new(Vec::new());
        cursor.write_u64(self.server.server_timestamp)?;
        cursor.write_length_prefixed_bytes(self.server.server_version.as_bytes())?;
        cursor.write_length_prefixed_bytes(self.server.schema_ddl_text.as_bytes())?;
        cursor.write_u64(self.blocks.len() as u64)?;

        for block in &self.blocks {
            let desc = &block.descriptor;
            if block.chunks.len() as u64 != desc.data_blocks_count {
                return Err(DumpError::InvalidHeader {
                    reason: format!(
                        "block {} records {} chunks but declares {}",
                        desc.schema_object_id,
                        block.chunks.len(),
                        desc.data_blocks_count
                    ),
                });
            }
            let dep_count = u32::try_from(desc.schema_deps.len()).map_err(|_| {
                DumpError::InvalidHeader {
                    reason: format!("block {} has too many dependencies", desc.schema_object_id),
                }
            })?;

            cursor.write_uuid(&desc.schema_object_id)?;
            cursor.write_u32(dep_count)?;
            for dep in &desc.schema_deps {
                cursor.write_uuid(dep)?;
            }
            cursor.write_length_prefixed_bytes(&desc.type_desc)?;
            cursor.write_u64(desc.data_size)?;
            cursor.write_u64(desc.data_blocks_count)?;
            for chunk in &block.chunks {
                cursor.write_u64(chunk.size)?;
                cursor.write_bytes(&chunk.digest)?;
            }
        }

        Ok(cursor.into_inner())
    }

    /// Parse a header, requiring every byte to be consumed.
    pub fn decode(bytes: &[u8]) -> DumpResult<Self> {
        let mut cursor = ByteCursor::new(bytes);
        let at = |context: &str| {
            let context = context.to_string();
            move |source: CursorError| DumpError::Truncated {
                context: format!("header {}", context),
                source,
            }
        };

        let server_timestamp = cursor.read_u64().map_err(at("server_timestamp"))?;
        let server_version = utf8(
            cursor.read_length_prefixed_bytes().map_err(at("server_version"))?,
            "server_version",
        )?;
        let schema_ddl_text = utf8(
            cursor.read_length_prefixed_bytes().map_err(at("schema_ddl_text"))?,
            "schema_ddl_text",
        )?;
        let block_count = cursor.read_u64().map_err(at("block_count"))?;

        let mut blocks = Vec::with_capacity(prealloc(block_count));
        for _ in 0..block_count {
            let schema_object_id = cursor.read_uuid().map_err(at("schema_object_id"))?;
            let dep_count = cursor.read_u32().map_err(at("dep_count"))?;
            let mut schema_deps = Vec::with_capacity(prealloc(u64::from(dep_count)));
            for _ in 0..dep_count {
                schema_deps.push(cursor.read_uuid().map_err(at("schema_deps"))?);
            }
            let type_desc = cursor.read_length_prefixed_bytes().map_err(at("type_desc"))?;
            let data_size = cursor.read_u64().map_err(at("data_size"))?;
            let data_blocks_count = cursor.read_u64().map_err(at("data_blocks_count"))?;

            let mut chunks = Vec::with_capacity(prealloc(data_blocks_count));
            for _ in 0..data_blocks_count {
                let size = cursor.read_u64().map_err(at("chunk_size"))?;
                let digest = cursor.read_array().map_err(at("chunk_sha1"))?;
                chunks.push(ChunkInfo { size, digest });
            }

            blocks.push(HeaderBlock {
                descriptor: BlockDescriptor {
                    schema_object_id,
                    schema_deps,
                    type_desc,
                    data_size,
                    data_blocks_count,
                },
                chunks,
            });
        }

        let remaining = cursor.get_ref().len();
        if remaining != 0 {
            return Err(DumpError::InvalidHeader {
                reason: format!("{} unexpected bytes after the last block", remaining),
            });
        }

        Ok(DumpHeader {
            server: ServerInfo {
                server_timestamp,
                server_version,
                schema_ddl_text,
            },
            blocks,
        })
    }
}

fn utf8(bytes: Vec<u8>, field: &str) -> DumpResult<String> {
    String::from_utf8(bytes).map_err(|_| DumpError::InvalidHeader {
        reason: format!("{} is not valid UTF-8", field),
    })
}

fn prealloc(count: u64) -> usize {
    usize::try_from(count)
        .unwrap_or(usize::MAX)
        .min(HEADER_PREALLOC_LIMIT)
}
