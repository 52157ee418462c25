//! Scratch storage for chunks received during a dump.
//!
//! Every chunk is appended to one anonymous temporary file. An index keeps,
//! per schema object and in arrival order, the byte range and SHA-1 of each
//! chunk. The file has no name on disk and is reclaimed by the OS when the
//! staging area is dropped, on success and failure alike.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use dbdump_core::{sha1_digest, Sha1Digest};
use tracing::trace;
use uuid::Uuid;

use crate::format::ChunkInfo;

/// Location and digest of one staged chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedChunk {
    /// Offset in the scratch file.
    pub offset: u64,
    /// Length in bytes.
    pub len: u64,
    /// SHA-1 of the chunk bytes.
    pub digest: Sha1Digest,
}

impl StagedChunk {
    /// Size and digest as recorded in the header.
    pub fn info(&self) -> ChunkInfo {
        ChunkInfo {
            size: self.len,
            digest: self.digest,
        }
    }
}

/// Append-only chunk scratch file with a per-object index.
#[derive(Debug)]
pub struct ChunkStaging {
    file: File,
    len: u64,
    index: HashMap<Uuid, Vec<StagedChunk>>,
    arrival: Vec<Uuid>,
}

impl ChunkStaging {
    /// Create a scratch file in `dir`, or in the system temp dir.
    pub fn new(dir: Option<&Path>) -> io::Result<Self> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        Ok(ChunkStaging {
            file,
            len: 0,
            index: HashMap::new(),
            arrival: Vec::new(),
        })
    }

    /// Append a chunk for `object_id`.
    pub fn stage(&mut self, object_id: Uuid, data: &[u8]) -> io::Result<StagedChunk> {
        let chunk = StagedChunk {
            offset: self.len,
            len: data.len() as u64,
            digest: sha1_digest(data),
        };
        self.file.seek(SeekFrom::Start(chunk.offset))?;
        self.file.write_all(data)?;
        self.len += chunk.len;

        let chunks = self.index.entry(object_id).or_insert_with(|| {
            self.arrival.push(object_id);
            Vec::new()
        });
        chunks.push(chunk);
        trace!(target: "dbdump::dump", %object_id, len = chunk.len, seq = chunks.len(), "Staged chunk");
        Ok(chunk)
    }

    /// Chunks of `object_id` in arrival order.
    pub fn chunks(&self, object_id: &Uuid) -> &[StagedChunk] {
        self.index.get(object_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Objects with at least one chunk, in order of first arrival.
    pub fn objects(&self) -> &[Uuid] {
        &self.arrival
    }

    /// Total staged bytes.
    pub fn total_bytes(&self) -> u64 {
        self.len
    }

    /// Total staged chunks.
    pub fn chunk_count(&self) -> usize {
        self.index.values().map(Vec::len).sum()
    }

    /// Copy a staged chunk to `out` through `buf`.
    ///
    /// At most `buf.len()` bytes are held in memory at a time.
    pub fn copy_chunk<W: Write>(
        &mut self,
        chunk: &StagedChunk,
        out: &mut W,
        buf: &mut [u8],
    ) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(chunk.offset))?;
        let mut remaining = chunk.len;
        while remaining > 0 {
            let n = usize::try_from(remaining).unwrap_or(usize::MAX).min(buf.len());
            self.file.read_exact(&mut buf[..n])?;
            out.write_all(&buf[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }
}
