//! Dump file reader
//!
//! Opening a dump verifies everything in front of the data segments:
//! title, version, header marker and the header checksum. The verified
//! header bytes are handed out undecoded. Data segments are then pulled one
//! at a time from [`DumpBlocks`], each checked against its own digest
//! before it is returned.
//!
//! # End of Sequence
//!
//! The file has no trailer. A stream that is exhausted exactly where the
//! next segment marker would start is the normal end of the dump. A stream
//! that ends anywhere inside a segment is truncated and fails.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use dbdump_core::{digest_hex, sha1_digest, ByteCursor, CursorError, Sha1Digest};
use tracing::{debug, info};

use crate::config::RestoreConfig;
use crate::error::{DumpError, DumpResult};
use crate::format::{
    ChunkInfo, DumpHeader, DATA_BLOCK_MARKER, HEADER_BLOCK_MARKER, HEADER_TITLE,
    MAX_SUPPORTED_DUMP_VER,
};

/// Restore-side lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Header verified, no data segment read yet
    HeaderParsed,
    /// Reading data segments
    Streaming,
    /// Every data segment was read and verified
    Done,
    /// A segment failed; the sequence yields nothing more
    Failed,
}

/// Outcome of one step of the block sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockStep {
    /// A verified data block
    Block(Vec<u8>),
    /// The dump ended at a segment boundary
    EndOfSequence,
}

/// A dump whose header has been verified
#[derive(Debug)]
pub struct DumpReader<R> {
    cursor: ByteCursor<R>,
    version: u64,
    header: Vec<u8>,
    header_digest: Sha1Digest,
    table: Option<Vec<ChunkInfo>>,
}

impl DumpReader<BufReader<File>> {
    /// Open and verify the dump at `path`.
    pub fn open(path: &Path) -> DumpResult<Self> {
        Self::open_with_config(path, &RestoreConfig::default())
    }

    /// Open and verify the dump at `path` with `config`.
    pub fn open_with_config(path: &Path, config: &RestoreConfig) -> DumpResult<Self> {
        info!(target: "dbdump::restore", path = %path.display(), "Opening dump");
        let file = File::open(path)?;
        Self::from_reader_with_config(BufReader::new(file), config)
    }
}

impl<R: Read> DumpReader<R> {
    /// Verify the dump at the start of `reader`.
    pub fn from_reader(reader: R) -> DumpResult<Self> {
        Self::from_reader_with_config(reader, &RestoreConfig::default())
    }

    /// Verify the dump at the start of `reader` with `config`.
    ///
    /// Checks, in order: title, version, header marker, header checksum.
    /// With `verify_header_table` the header is also decoded so data
    /// segments can be matched against the recorded chunks.
    pub fn from_reader_with_config(reader: R, config: &RestoreConfig) -> DumpResult<Self> {
        let mut cursor = ByteCursor::new(reader);

        let title = match cursor.read_bytes(HEADER_TITLE.len()) {
            Ok(title) => title,
            Err(e) if e.is_eof() => return Err(DumpError::NotADump),
            Err(e) => return Err(e.into()),
        };
        if title != HEADER_TITLE[..] {
            return Err(DumpError::NotADump);
        }

        let version = cursor.read_u64().map_err(|e| short_read("dump version", e))?;
        if version > MAX_SUPPORTED_DUMP_VER {
            return Err(DumpError::UnsupportedVersion {
                version,
                max: MAX_SUPPORTED_DUMP_VER,
            });
        }

        let marker = cursor
            .read_u8()
            .map_err(|e| short_read("header block marker", e))?;
        if marker != HEADER_BLOCK_MARKER {
            return Err(DumpError::MissingHeaderBlock { found: marker });
        }

        let expected: Sha1Digest = cursor
            .read_array()
            .map_err(|e| short_read("header digest", e))?;
        let header_len = cursor
            .read_u64()
            .map_err(|e| short_read("header length", e))?;
        let header_len = usize::try_from(header_len).map_err(|_| DumpError::InvalidHeader {
            reason: format!("header length {} exceeds addressable memory", header_len),
        })?;
        let header = cursor
            .read_bytes(header_len)
            .map_err(|e| short_read("header bytes", e))?;

        let actual = sha1_digest(&header);
        if actual != expected {
            return Err(DumpError::HeaderChecksumMismatch {
                expected: digest_hex(&expected),
                actual: digest_hex(&actual),
            });
        }

        let table = if config.verify_header_table {
            Some(DumpHeader::decode(&header)?.chunk_table())
        } else {
            None
        };

        debug!(
            target: "dbdump::restore",
            version,
            header_len,
            recorded_chunks = table.as_ref().map(Vec::len),
            "Dump header verified"
        );

        Ok(DumpReader {
            cursor,
            version,
            header,
            header_digest: actual,
            table,
        })
    }

    /// Dump format version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Verified header bytes, undecoded
    pub fn header_bytes(&self) -> &[u8] {
        &self.header
    }

    /// SHA-1 of the header
    pub fn header_digest(&self) -> &Sha1Digest {
        &self.header_digest
    }

    /// Decode the header bytes.
    pub fn decode_header(&self) -> DumpResult<DumpHeader> {
        DumpHeader::decode(&self.header)
    }

    /// Start reading data segments, discarding the header.
    pub fn blocks(self) -> DumpBlocks<R> {
        self.into_parts().1
    }

    /// Split into the header bytes and the data segment sequence.
    pub fn into_parts(self) -> (Vec<u8>, DumpBlocks<R>) {
        let blocks = DumpBlocks {
            cursor: self.cursor,
            table: self.table,
            state: ReaderState::HeaderParsed,
            blocks_read: 0,
            bytes_read: 0,
        };
        (self.header, blocks)
    }
}

/// Lazy, non-restartable sequence of verified data blocks
#[derive(Debug)]
pub struct DumpBlocks<R> {
    cursor: ByteCursor<R>,
    table: Option<Vec<ChunkInfo>>,
    state: ReaderState,
    blocks_read: u64,
    bytes_read: u64,
}

impl<R: Read> DumpBlocks<R> {
    /// Read and verify the next data segment.
    ///
    /// Keeps returning `EndOfSequence` once the dump is exhausted. After an
    /// error every call fails with [`DumpError::SequenceAborted`].
    pub fn next_block(&mut self) -> DumpResult<BlockStep> {
        match self.state {
            ReaderState::Done => return Ok(BlockStep::EndOfSequence),
            ReaderState::Failed => return Err(DumpError::SequenceAborted),
            ReaderState::HeaderParsed | ReaderState::Streaming => {}
        }
        self.state = ReaderState::Streaming;

        match self.read_segment() {
            Ok(Some(payload)) => {
                self.blocks_read += 1;
                self.bytes_read += payload.len() as u64;
                Ok(BlockStep::Block(payload))
            }
            Ok(None) => {
                self.state = ReaderState::Done;
                info!(
                    target: "dbdump::restore",
                    blocks = self.blocks_read,
                    bytes = self.bytes_read,
                    "All data blocks verified"
                );
                Ok(BlockStep::EndOfSequence)
            }
            Err(e) => {
                self.state = ReaderState::Failed;
                Err(e)
            }
        }
    }

    fn read_segment(&mut self) -> DumpResult<Option<Vec<u8>>> {
        let index = self.blocks_read;
        let marker = match self.cursor.read_u8() {
            Ok(marker) => marker,
            Err(e) if e.is_clean_eof() => {
                self.check_table_complete(index)?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        if marker != DATA_BLOCK_MARKER {
            return Err(DumpError::MissingDataBlock {
                index,
                found: marker,
            });
        }

        let expected: Sha1Digest = self
            .cursor
            .read_array()
            .map_err(|e| short_read(&format!("data block {} digest", index), e))?;
        let len = self
            .cursor
            .read_u32()
            .map_err(|e| short_read(&format!("data block {} length", index), e))?;
        self.check_table_entry(index, len, &expected)?;

        let payload = self
            .cursor
            .read_bytes(len as usize)
            .map_err(|e| short_read(&format!("data block {} payload", index), e))?;
        let actual = sha1_digest(&payload);
        if actual != expected {
            return Err(DumpError::BlockChecksumMismatch {
                index,
                expected: digest_hex(&expected),
                actual: digest_hex(&actual),
            });
        }

        debug!(target: "dbdump::restore", index, len, "Data block verified");
        Ok(Some(payload))
    }

    fn check_table_entry(&self, index: u64, len: u32, digest: &Sha1Digest) -> DumpResult<()> {
        let Some(table) = &self.table else {
            return Ok(());
        };
        let Some(chunk) = usize::try_from(index).ok().and_then(|i| table.get(i)) else {
            return Err(DumpError::ChunkTableMismatch {
                index,
                reason: format!("header records only {} chunks", table.len()),
            });
        };
        if chunk.size != u64::from(len) {
            return Err(DumpError::ChunkTableMismatch {
                index,
                reason: format!("length {} differs from recorded size {}", len, chunk.size),
            });
        }
        if chunk.digest != *digest {
            return Err(DumpError::ChunkTableMismatch {
                index,
                reason: format!(
                    "digest {} differs from recorded digest {}",
                    digest_hex(digest),
                    digest_hex(&chunk.digest)
                ),
            });
        }
        Ok(())
    }

    fn check_table_complete(&self, index: u64) -> DumpResult<()> {
        match &self.table {
            Some(table) if (table.len() as u64) > index => Err(DumpError::ChunkTableMismatch {
                index,
                reason: format!("dump ends after {} of {} recorded chunks", index, table.len()),
            }),
            _ => Ok(()),
        }
    }

    /// Current state
    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Data blocks returned so far
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    /// Payload bytes returned so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Offset in the dump file
    pub fn position(&self) -> u64 {
        self.cursor.tell()
    }
}

impl<R: Read> Iterator for DumpBlocks<R> {
    type Item = DumpResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, ReaderState::Done | ReaderState::Failed) {
            return None;
        }
        match self.next_block() {
            Ok(BlockStep::Block(payload)) => Some(Ok(payload)),
            Ok(BlockStep::EndOfSequence) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Short reads become `Truncated`; other I/O failures pass through.
fn short_read(context: &str, err: CursorError) -> DumpError {
    if err.is_eof() {
        DumpError::Truncated {
            context: context.to_string(),
            source: err,
        }
    } else {
        DumpError::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{
        BlockDescriptor, HeaderBlock, ServerInfo, DUMP_PROTO_VER, FILE_PREFIX_SIZE,
    };
    use std::io::Cursor;
    use uuid::Uuid;

    fn segment(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![DATA_BLOCK_MARKER];
        out.extend_from_slice(&sha1_digest(payload));
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn dump_bytes(header: &[u8], payloads: &[&[u8]]) -> Vec<u8> {
        let mut out = HEADER_TITLE.to_vec();
        out.extend_from_slice(&DUMP_PROTO_VER.to_be_bytes());
        out.push(HEADER_BLOCK_MARKER);
        out.extend_from_slice(&sha1_digest(header));
        out.extend_from_slice(&(header.len() as u64).to_be_bytes());
        out.extend_from_slice(header);
        for payload in payloads {
            out.extend(segment(payload));
        }
        out
    }

    fn encoded_header(chunks: &[&[u8]]) -> Vec<u8> {
        let id = Uuid::from_u128(1);
        let size = chunks.iter().map(|c| c.len() as u64).sum();
        DumpHeader {
            server: ServerInfo::new(1_700_000_000, "1.0", ""),
            blocks: vec![HeaderBlock {
                descriptor: BlockDescriptor::new(id, size, chunks.len() as u64),
                chunks: chunks
                    .iter()
                    .map(|c| ChunkInfo {
                        size: c.len() as u64,
                        digest: sha1_digest(c),
                    })
                    .collect(),
            }],
        }
        .encode()
        .unwrap()
    }

    #[test]
    fn test_reads_header_and_blocks() {
        let data = dump_bytes(b"hdr", &[b"abc", b"de"]);
        let reader = DumpReader::from_reader(Cursor::new(data)).unwrap();
        assert_eq!(reader.version(), DUMP_PROTO_VER);
        assert_eq!(reader.header_bytes(), b"hdr");
        assert_eq!(reader.header_digest(), &sha1_digest(b"hdr"));

        let mut blocks = reader.blocks();
        assert_eq!(blocks.state(), ReaderState::HeaderParsed);
        assert_eq!(blocks.next_block().unwrap(), BlockStep::Block(b"abc".to_vec()));
        assert_eq!(blocks.state(), ReaderState::Streaming);
        assert_eq!(blocks.next_block().unwrap(), BlockStep::Block(b"de".to_vec()));
        assert_eq!(blocks.next_block().unwrap(), BlockStep::EndOfSequence);
        assert_eq!(blocks.state(), ReaderState::Done);
        assert_eq!(blocks.next_block().unwrap(), BlockStep::EndOfSequence);
        assert_eq!(blocks.blocks_read(), 2);
        assert_eq!(blocks.bytes_read(), 5);
    }

    #[test]
    fn test_empty_dump_has_no_blocks() {
        let data = dump_bytes(b"", &[]);
        let (header, blocks) = DumpReader::from_reader(Cursor::new(data)).unwrap().into_parts();
        assert!(header.is_empty());
        assert_eq!(blocks.count(), 0);
    }

    #[test]
    fn test_not_a_dump() {
        let err = DumpReader::from_reader(Cursor::new(b"PGDMP".to_vec())).unwrap_err();
        assert!(matches!(err, DumpError::NotADump));

        let mut data = dump_bytes(b"hdr", &[]);
        data[5] = b'X';
        let err = DumpReader::from_reader(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, DumpError::NotADump));
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = dump_bytes(b"hdr", &[]);
        data[HEADER_TITLE.len()..FILE_PREFIX_SIZE].copy_from_slice(&2u64.to_be_bytes());
        let err = DumpReader::from_reader(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, DumpError::UnsupportedVersion { version: 2, max: 1 }));
    }

    #[test]
    fn test_missing_header_marker() {
        let mut data = dump_bytes(b"hdr", &[]);
        data[FILE_PREFIX_SIZE] = DATA_BLOCK_MARKER;
        let err = DumpReader::from_reader(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, DumpError::MissingHeaderBlock { found: b'D' }));
    }

    #[test]
    fn test_header_checksum_mismatch() {
        let mut data = dump_bytes(b"hdr", &[]);
        let last = data.len() - 1;
        data[last] ^= 0x01;
        let err = DumpReader::from_reader(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, DumpError::HeaderChecksumMismatch { .. }));
        assert!(err.is_integrity());
    }

    #[test]
    fn test_truncated_header() {
        let mut data = dump_bytes(b"header bytes", &[]);
        data.truncate(data.len() - 3);
        let err = DumpReader::from_reader(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, DumpError::Truncated { ref context, .. } if context == "header bytes"));
    }

    #[test]
    fn test_wrong_block_marker() {
        let mut data = dump_bytes(b"hdr", &[b"abc"]);
        data.push(b'X');
        let mut blocks = DumpReader::from_reader(Cursor::new(data)).unwrap().blocks();
        assert!(blocks.next_block().is_ok());
        let err = blocks.next_block().unwrap_err();
        assert!(matches!(err, DumpError::MissingDataBlock { index: 1, found: b'X' }));
        assert_eq!(blocks.state(), ReaderState::Failed);
        assert!(matches!(blocks.next_block(), Err(DumpError::SequenceAborted)));
        assert!(blocks.next().is_none());
    }

    #[test]
    fn test_block_checksum_mismatch() {
        let mut data = dump_bytes(b"hdr", &[b"abc"]);
        let last = data.len() - 1;
        data[last] = b'x';
        let mut blocks = DumpReader::from_reader(Cursor::new(data)).unwrap().blocks();
        let err = blocks.next().unwrap().unwrap_err();
        assert!(matches!(err, DumpError::BlockChecksumMismatch { index: 0, .. }));
    }

    #[test]
    fn test_mid_block_truncation() {
        let mut data = dump_bytes(b"hdr", &[b"abc", b"defgh"]);
        data.truncate(data.len() - 2);
        let results: Vec<_> = DumpReader::from_reader(Cursor::new(data)).unwrap().blocks().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap(), b"abc");
        assert!(matches!(
            results[1],
            Err(DumpError::Truncated { ref context, .. }) if context == "data block 1 payload"
        ));
    }

    #[test]
    fn test_header_table_verification() {
        let header = encoded_header(&[b"abc", b"de"]);
        let config = RestoreConfig::new().with_verify_header_table(true);

        let data = dump_bytes(&header, &[b"abc", b"de"]);
        let blocks = DumpReader::from_reader_with_config(Cursor::new(data), &config)
            .unwrap()
            .blocks();
        assert_eq!(blocks.map(Result::unwrap).count(), 2);

        // Boundary truncation is caught once the table is consulted
        let data = dump_bytes(&header, &[b"abc"]);
        let mut blocks = DumpReader::from_reader_with_config(Cursor::new(data), &config)
            .unwrap()
            .blocks();
        assert!(blocks.next_block().is_ok());
        assert!(matches!(
            blocks.next_block(),
            Err(DumpError::ChunkTableMismatch { index: 1, .. })
        ));

        // A segment the header does not record
        let data = dump_bytes(&header, &[b"abc", b"xy"]);
        let mut blocks = DumpReader::from_reader_with_config(Cursor::new(data), &config)
            .unwrap()
            .blocks();
        assert!(blocks.next_block().is_ok());
        assert!(matches!(
            blocks.next_block(),
            Err(DumpError::ChunkTableMismatch { index: 1, .. })
        ));
    }
}
