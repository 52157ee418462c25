//! Dump file writer
//!
//! # State Machine
//!
//! ```text
//! Idle --begin--> Streaming --finish--> Finalizing --> Done
//!   \                 |                     |
//!    `----------------+---------------------+--> Failed
//! ```
//!
//! While streaming, descriptors and chunks may arrive in any order. Chunks
//! go to a scratch file as they arrive. `finish` checks every descriptor
//! against the chunks actually received before anything is written to the
//! destination, so a source that misreports its own output never produces
//! a file.
//!
//! # Crash Safety
//!
//! With `atomic_output` (the default) the file is written as:
//! 1. Write to `<name>.tmp`
//! 2. fsync the temporary file
//! 3. Atomic rename to the final path
//! 4. fsync the parent directory
//!
//! An interrupted dump never leaves a file at the destination path.

use std::collections::HashSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use dbdump_core::{digest_hex, sha1_digest, ByteCursor};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DumpConfig;
use crate::error::{DumpError, DumpResult};
use crate::format::{
    BlockDescriptor, DumpDescriptor, DumpHeader, HeaderBlock, ServerInfo, DATA_BLOCK_MARKER,
    DUMP_PROTO_VER, HEADER_BLOCK_MARKER, HEADER_TITLE,
};
use crate::source::{DumpEvent, DumpSource};
use crate::staging::{ChunkStaging, StagedChunk};

const OUTPUT_BUFFER_SIZE: usize = 64 * 1024;

/// Dump writer lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Not started
    Idle,
    /// Receiving descriptors and chunks
    Streaming,
    /// Checking metadata and writing the file
    Finalizing,
    /// File written
    Done,
    /// Aborted; the writer cannot be reused
    Failed,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriterState::Idle => "idle",
            WriterState::Streaming => "streaming",
            WriterState::Finalizing => "finalizing",
            WriterState::Done => "done",
            WriterState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a written dump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpWriteInfo {
    /// Final path of the dump file
    pub path: PathBuf,
    /// Number of blocks (schema objects)
    pub blocks: usize,
    /// Number of data segments
    pub chunks: usize,
    /// Total payload bytes
    pub data_bytes: u64,
    /// Size of the dump file
    pub file_bytes: u64,
    /// SHA-1 of the header (hex)
    pub header_digest: String,
}

/// Streams a dump source into a dump file
#[derive(Debug)]
pub struct DumpWriter {
    config: DumpConfig,
    state: WriterState,
    descriptor: Option<DumpDescriptor>,
    declared: HashSet<Uuid>,
    staging: Option<ChunkStaging>,
}

impl DumpWriter {
    /// Create a writer, validating `config`.
    pub fn new(config: DumpConfig) -> DumpResult<Self> {
        config.validate()?;
        Ok(DumpWriter {
            config,
            state: WriterState::Idle,
            descriptor: None,
            declared: HashSet::new(),
            staging: None,
        })
    }

    /// Current state
    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Writer configuration
    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    /// Descriptor collected so far
    pub fn descriptor(&self) -> Option<&DumpDescriptor> {
        self.descriptor.as_ref()
    }

    /// Drain `source` into a dump file at `path`.
    pub fn dump<S: DumpSource + ?Sized>(
        &mut self,
        source: &mut S,
        path: &Path,
    ) -> DumpResult<DumpWriteInfo> {
        let server = source.server_info();
        let server = self.guard(server)?;
        self.begin(server)?;

        loop {
            let event = source.next_event();
            match self.guard(event)? {
                Some(DumpEvent::Descriptor(descriptor)) => self.add_descriptor(descriptor)?,
                Some(DumpEvent::Chunk { object_id, data }) => self.add_chunk(object_id, &data)?,
                None => break,
            }
        }

        self.finish(path)
    }

    /// Start a dump: `Idle -> Streaming`.
    pub fn begin(&mut self, server: ServerInfo) -> DumpResult<()> {
        self.expect_state(WriterState::Idle, "begin a dump")?;
        info!(
            target: "dbdump::dump",
            server_version = %server.server_version,
            server_timestamp = server.server_timestamp,
            "Dump started"
        );

        let staging = ChunkStaging::new(self.config.staging_dir.as_deref()).map_err(DumpError::from);
        self.staging = Some(self.guard(staging)?);
        self.descriptor = Some(DumpDescriptor::new(server));
        self.state = WriterState::Streaming;
        Ok(())
    }

    /// Record the descriptor of one schema object.
    pub fn add_descriptor(&mut self, descriptor: BlockDescriptor) -> DumpResult<()> {
        self.expect_state(WriterState::Streaming, "add a descriptor")?;
        let object_id = descriptor.schema_object_id;
        if !self.declared.insert(object_id) {
            return self.guard(Err(DumpError::DuplicateDescriptor { object_id }));
        }

        debug!(
            target: "dbdump::dump",
            %object_id,
            data_size = descriptor.data_size,
            data_blocks_count = descriptor.data_blocks_count,
            deps = descriptor.schema_deps.len(),
            "Block descriptor"
        );
        if let Some(dump) = self.descriptor.as_mut() {
            dump.blocks.push(descriptor);
        }
        Ok(())
    }

    /// Stage one data chunk of `object_id`.
    ///
    /// The owning descriptor may arrive before or after its chunks.
    pub fn add_chunk(&mut self, object_id: Uuid, data: &[u8]) -> DumpResult<()> {
        self.expect_state(WriterState::Streaming, "add a chunk")?;
        let size = data.len() as u64;
        if size > self.config.max_chunk_size {
            return self.guard(Err(DumpError::ChunkTooLarge {
                object_id,
                size,
                max: self.config.max_chunk_size,
            }));
        }

        let staged = match self.staging.as_mut() {
            Some(staging) => staging.stage(object_id, data).map_err(DumpError::from),
            None => Err(self.invalid_state("add a chunk")),
        };
        self.guard(staged)?;
        Ok(())
    }

    /// Check metadata and write the dump: `Streaming -> Finalizing -> Done`.
    pub fn finish(&mut self, path: &Path) -> DumpResult<DumpWriteInfo> {
        self.expect_state(WriterState::Streaming, "finish a dump")?;
        self.state = WriterState::Finalizing;

        let result = self.finalize(path);
        let info = self.guard(result)?;
        self.state = WriterState::Done;

        info!(
            target: "dbdump::dump",
            path = %info.path.display(),
            blocks = info.blocks,
            chunks = info.chunks,
            bytes = info.file_bytes,
            "Dump completed"
        );
        Ok(info)
    }

    fn finalize(&mut self, path: &Path) -> DumpResult<DumpWriteInfo> {
        let (descriptor, mut staging) = match (self.descriptor.take(), self.staging.take()) {
            (Some(descriptor), Some(staging)) => (descriptor, staging),
            _ => return Err(self.invalid_state("finish a dump")),
        };

        let header = build_header(descriptor, &staging)?;
        let header_bytes = header.encode()?;
        let header_digest = sha1_digest(&header_bytes);

        let write_path = if self.config.atomic_output {
            temp_path(path)
        } else {
            path.to_path_buf()
        };

        let written = write_dump_file(
            &write_path,
            &header,
            &header_bytes,
            &mut staging,
            self.config.copy_buffer_size,
        );
        let file_bytes = match written {
            Ok(bytes) => bytes,
            Err(e) => {
                if self.config.atomic_output {
                    let _ = fs::remove_file(&write_path);
                }
                return Err(e);
            }
        };

        if self.config.atomic_output {
            if let Err(e) = fs::rename(&write_path, path) {
                let _ = fs::remove_file(&write_path);
                return Err(e.into());
            }
            sync_parent_dir(path)?;
        }

        Ok(DumpWriteInfo {
            path: path.to_path_buf(),
            blocks: header.blocks.len(),
            chunks: header.chunk_count(),
            data_bytes: staging.total_bytes(),
            file_bytes,
            header_digest: digest_hex(&header_digest),
        })
    }

    fn expect_state(&self, expected: WriterState, operation: &'static str) -> DumpResult<()> {
        if self.state != expected {
            return Err(self.invalid_state(operation));
        }
        Ok(())
    }

    fn invalid_state(&self, operation: &'static str) -> DumpError {
        DumpError::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// Move to `Failed` and release staging if `result` is an error.
    fn guard<T>(&mut self, result: DumpResult<T>) -> DumpResult<T> {
        if let Err(e) = &result {
            warn!(target: "dbdump::dump", state = %self.state, error = %e, "Dump failed");
            self.state = WriterState::Failed;
            self.staging = None;
            self.descriptor = None;
        }
        result
    }
}

/// Drain `source` into a dump file at `path` with `config`.
pub fn write_dump<S: DumpSource + ?Sized>(
    source: &mut S,
    path: &Path,
    config: DumpConfig,
) -> DumpResult<DumpWriteInfo> {
    DumpWriter::new(config)?.dump(source, path)
}

/// Check received chunks against every descriptor and assemble the header.
fn build_header(descriptor: DumpDescriptor, staging: &ChunkStaging) -> DumpResult<DumpHeader> {
    for object_id in staging.objects() {
        if descriptor.block(object_id).is_none() {
            return Err(DumpError::UndeclaredObject {
                object_id: *object_id,
            });
        }
    }

    let mut blocks = Vec::with_capacity(descriptor.blocks.len());
    for block in descriptor.blocks {
        let chunks = staging.chunks(&block.schema_object_id);
        let received_count = chunks.len() as u64;
        if received_count != block.data_blocks_count {
            return Err(DumpError::BlockCountMismatch {
                object_id: block.schema_object_id,
                declared: block.data_blocks_count,
                received: received_count,
            });
        }
        let received_size: u64 = chunks.iter().map(|c| c.len).sum();
        if received_size != block.data_size {
            return Err(DumpError::DataSizeMismatch {
                object_id: block.schema_object_id,
                declared: block.data_size,
                received: received_size,
            });
        }

        blocks.push(HeaderBlock {
            chunks: chunks.iter().map(StagedChunk::info).collect(),
            descriptor: block,
        });
    }

    Ok(DumpHeader {
        server: descriptor.server,
        blocks,
    })
}

/// Write title, header segment and one data segment per chunk.
///
/// Returns the size of the written file.
fn write_dump_file(
    path: &Path,
    header: &DumpHeader,
    header_bytes: &[u8],
    staging: &mut ChunkStaging,
    copy_buffer_size: usize,
) -> DumpResult<u64> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    let mut cursor = ByteCursor::new(BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, file));

    cursor.write_bytes(HEADER_TITLE)?;
    cursor.write_u64(DUMP_PROTO_VER)?;
    cursor.write_u8(HEADER_BLOCK_MARKER)?;
    cursor.write_bytes(&sha1_digest(header_bytes))?;
    cursor.write_u64(header_bytes.len() as u64)?;
    cursor.write_bytes(header_bytes)?;

    let mut buf = vec![0u8; copy_buffer_size];
    for block in &header.blocks {
        let object_id = block.descriptor.schema_object_id;
        let chunks: Vec<StagedChunk> = staging.chunks(&object_id).to_vec();
        for chunk in &chunks {
            let len = u32::try_from(chunk.len).map_err(|_| DumpError::ChunkTooLarge {
                object_id,
                size: chunk.len,
                max: u64::from(u32::MAX),
            })?;
            cursor.write_u8(DATA_BLOCK_MARKER)?;
            cursor.write_bytes(&chunk.digest)?;
            cursor.write_u32(len)?;
            staging.copy_chunk(chunk, cursor.get_mut(), &mut buf)?;
        }
    }

    let mut writer = cursor.into_inner();
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn sync_parent_dir(path: &Path) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()
}
