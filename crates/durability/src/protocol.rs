//! Dump and restore over the wire protocol.
//!
//! A server dumps as one `DumpHeader` followed by `DumpBlock`s and a
//! `CommandComplete`. [`ProtocolDumpSource`] turns those replies into dump
//! events. [`ProtocolRestoreSink`] rebuilds the same two message bodies from
//! a verified dump file and hands them back: the header body inside
//! `Restore`, each block body inside a `RestoreBlock`.
//!
//! `DumpHeader` does not announce chunk counts or sizes, so the source tallies
//! them while blocks arrive and emits every descriptor once the server
//! reports completion.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};

use dbdump_wire::{
    attr, CommandCompleteMessage, Direction, DumpBlockMessage, DumpHeaderMessage,
    DumpObjectDesc, DumpRequest, ErrorResponseMessage, FrameReader, FrameWriter, Message,
    MessageKind, RestoreBlockMessage, RestoreEofMessage, RestoreReadyMessage, RestoreRequest,
    TypedMessage, WireError,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DumpError, DumpResult};
use crate::format::{BlockDescriptor, DumpHeader, ServerInfo};
use crate::reader::{BlockStep, DumpBlocks};
use crate::sink::RestoreSink;
use crate::source::{DumpEvent, DumpSource};

/// `DumpHeader` message describing `header`.
///
/// The message carries no type table; type layouts travel in each
/// descriptor's `description`.
pub fn header_message(header: &DumpHeader) -> DumpHeaderMessage {
    let server = &header.server;
    let (major_ver, minor_ver) = parse_version(&server.server_version);
    DumpHeaderMessage {
        attributes: vec![
            (attr::BLOCK_TYPE, attr::BLOCK_TYPE_INFO.to_vec()),
            (attr::SERVER_TIME, server.server_timestamp.to_string().into_bytes()),
            (attr::SERVER_VERSION, server.server_version.clone().into_bytes()),
        ],
        major_ver,
        minor_ver,
        schema_ddl: server.schema_ddl_text.clone(),
        types: Vec::new(),
        descriptors: header
            .blocks
            .iter()
            .map(|block| DumpObjectDesc {
                object_id: block.descriptor.schema_object_id,
                description: block.descriptor.type_desc.clone(),
                dependencies: block.descriptor.schema_deps.clone(),
            })
            .collect(),
    }
}

/// Server identity announced by a `DumpHeader` message.
///
/// A missing `SERVER_TIME` reads as 0; a missing `SERVER_VERSION` is rebuilt
/// from the major and minor versions.
pub fn server_info(message: &DumpHeaderMessage) -> DumpResult<ServerInfo> {
    let timestamp = match message.attribute(attr::SERVER_TIME) {
        Some(raw) => parse_decimal(raw, "server time")?,
        None => 0,
    };
    let version = match message.attribute(attr::SERVER_VERSION) {
        Some(raw) => String::from_utf8(raw.to_vec())
            .map_err(|_| DumpError::protocol("server version is not UTF-8"))?,
        None => format!("{}.{}", message.major_ver, message.minor_ver),
    };
    Ok(ServerInfo::new(timestamp, version, message.schema_ddl.clone()))
}

fn parse_version(version: &str) -> (u16, u16) {
    let mut parts = version
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

fn parse_decimal(raw: &[u8], what: &str) -> DumpResult<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| DumpError::protocol(format!("{} is not a decimal number", what)))
}

fn check_block_type(found: Option<&[u8]>, expected: &[u8], kind: &str) -> DumpResult<()> {
    match found {
        Some(found) if found != expected => Err(DumpError::protocol(format!(
            "{} has block type {:?}, expected {:?}",
            kind,
            String::from_utf8_lossy(found),
            String::from_utf8_lossy(expected)
        ))),
        _ => Ok(()),
    }
}

/// Next reply that is not a log message. `ErrorResponse` becomes
/// [`DumpError::Server`] and end of stream a protocol violation.
fn next_reply<R: Read>(replies: &mut FrameReader<R>, waiting_for: &str) -> DumpResult<Message> {
    loop {
        let message = replies.read_message()?.ok_or_else(|| {
            DumpError::protocol(format!("connection closed while waiting for {}", waiting_for))
        })?;
        match message.kind() {
            MessageKind::LogMessage => {
                let text = message.field("text")?.expect_str("LogMessage.text")?;
                debug!(target: "dbdump::protocol", text, "Server log message");
            }
            MessageKind::ErrorResponse => {
                let error = ErrorResponseMessage::from_message(&message)?;
                return Err(DumpError::Server {
                    code: error.error_code,
                    message: error.message,
                });
            }
            _ => return Ok(message),
        }
    }
}

fn expect_reply<R: Read>(replies: &mut FrameReader<R>, kind: MessageKind) -> DumpResult<Message> {
    let message = next_reply(replies, kind.name())?;
    if message.kind() != kind {
        return Err(WireError::UnexpectedMessage {
            expected: kind.name(),
            found: message.kind().name(),
        }
        .into());
    }
    Ok(message)
}

// =============================================================================
// Dump
// =============================================================================

/// Dump source reading a server's dump replies.
///
/// [`DumpSource::server_info`] sends the `Dump` request and waits for the
/// header; each `DumpBlock` then becomes a chunk. After `CommandComplete`
/// and `ReadyForCommand` the source emits one descriptor per object in
/// header order and is exhausted.
#[derive(Debug)]
pub struct ProtocolDumpSource<R, W> {
    replies: FrameReader<R>,
    requests: FrameWriter<W>,
    request: DumpRequest,
    objects: Vec<BlockDescriptor>,
    index: HashMap<Uuid, usize>,
    pending: VecDeque<DumpEvent>,
    started: bool,
    finished: bool,
}

impl<R: Read, W: Write> ProtocolDumpSource<R, W> {
    /// Source reading server frames from `replies` and writing the request
    /// to `requests`.
    pub fn new(replies: R, requests: W) -> Self {
        ProtocolDumpSource {
            replies: FrameReader::new(replies, Direction::Server),
            requests: FrameWriter::new(requests),
            request: DumpRequest {
                annotations: Vec::new(),
                flags: 0,
            },
            objects: Vec::new(),
            index: HashMap::new(),
            pending: VecDeque::new(),
            started: false,
            finished: false,
        }
    }

    /// Send `request` instead of a plain dump request.
    pub fn with_request(mut self, request: DumpRequest) -> Self {
        self.request = request;
        self
    }

    /// Recover the reply reader and the request writer.
    pub fn into_parts(self) -> (R, W) {
        (self.replies.into_inner(), self.requests.into_inner())
    }

    fn declare(&mut self, desc: DumpObjectDesc) -> DumpResult<()> {
        if self.index.contains_key(&desc.object_id) {
            return Err(DumpError::DuplicateDescriptor {
                object_id: desc.object_id,
            });
        }
        self.index.insert(desc.object_id, self.objects.len());
        self.objects.push(
            BlockDescriptor::new(desc.object_id, 0, 0)
                .with_deps(desc.dependencies)
                .with_type_desc(desc.description),
        );
        Ok(())
    }

    fn receive_block(&mut self, message: &Message) -> DumpResult<DumpEvent> {
        let block = DumpBlockMessage::from_message(message)?;
        check_block_type(block.attribute(attr::BLOCK_TYPE), attr::BLOCK_TYPE_DATA, "DumpBlock")?;
        let object_id = block
            .block_id()
            .ok_or_else(|| DumpError::protocol("DumpBlock carries no valid block id"))?;
        let data = block
            .block_data()
            .ok_or_else(|| DumpError::protocol(format!("DumpBlock for {} carries no data", object_id)))?
            .to_vec();

        // Chunks of undeclared objects pass through; the writer rejects them.
        if let Some(&slot) = self.index.get(&object_id) {
            let descriptor = &mut self.objects[slot];
            if let Some(raw) = block.attribute(attr::BLOCK_NUM) {
                let block_num = parse_decimal(raw, "block number")?;
                if block_num != descriptor.data_blocks_count {
                    return Err(DumpError::protocol(format!(
                        "object {} sent block {} where {} was expected",
                        object_id, block_num, descriptor.data_blocks_count
                    )));
                }
            }
            descriptor.data_blocks_count += 1;
            descriptor.data_size += data.len() as u64;
        }
        Ok(DumpEvent::Chunk { object_id, data })
    }

    fn complete(&mut self, message: &Message) -> DumpResult<()> {
        let status = CommandCompleteMessage::from_message(message)?.status;
        expect_reply(&mut self.replies, MessageKind::ReadyForCommand)?;
        self.finished = true;
        info!(
            target: "dbdump::dump",
            status = %status,
            objects = self.objects.len(),
            "Server finished dump"
        );
        self.pending
            .extend(self.objects.drain(..).map(DumpEvent::Descriptor));
        Ok(())
    }
}

impl<R: Read, W: Write> DumpSource for ProtocolDumpSource<R, W> {
    fn server_info(&mut self) -> DumpResult<ServerInfo> {
        if self.started {
            return Err(DumpError::protocol("dump request was already sent"));
        }
        self.started = true;
        self.requests.write_message(&self.request.to_message()?)?;
        self.requests
            .write_message(&Message::new(MessageKind::Sync, Vec::new())?)?;
        self.requests.flush()?;

        let message = expect_reply(&mut self.replies, MessageKind::DumpHeader)?;
        let header = DumpHeaderMessage::from_message(&message)?;
        check_block_type(header.attribute(attr::BLOCK_TYPE), attr::BLOCK_TYPE_INFO, "DumpHeader")?;
        let server = server_info(&header)?;
        for desc in header.descriptors {
            self.declare(desc)?;
        }

        info!(
            target: "dbdump::dump",
            server_version = %server.server_version,
            objects = self.objects.len(),
            "Received dump header"
        );
        Ok(server)
    }

    fn next_event(&mut self) -> DumpResult<Option<DumpEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }
        if self.finished {
            return Ok(None);
        }
        if !self.started {
            return Err(DumpError::protocol("dump events requested before the header"));
        }

        let message = next_reply(&mut self.replies, "DumpBlock")?;
        match message.kind() {
            MessageKind::DumpBlock => self.receive_block(&message).map(Some),
            MessageKind::CommandComplete => {
                self.complete(&message)?;
                Ok(self.pending.pop_front())
            }
            other => Err(WireError::UnexpectedMessage {
                expected: MessageKind::DumpBlock.name(),
                found: other.name(),
            }
            .into()),
        }
    }
}

// =============================================================================
// Restore
// =============================================================================

/// Restore sink replaying a dump to a server.
///
/// Sends `Restore` carrying the rebuilt `DumpHeader` body and waits for
/// `RestoreReady`. Each data block then goes out as a `RestoreBlock` holding
/// a `DumpBlock` body for the object the chunk table assigns it to. After
/// `RestoreEof` the sink waits for `CommandComplete` and `ReadyForCommand`.
#[derive(Debug)]
pub struct ProtocolRestoreSink<R, W> {
    replies: FrameReader<R>,
    frames: FrameWriter<W>,
}

impl<R: Read, W: Write> ProtocolRestoreSink<R, W> {
    /// Sink reading server frames from `replies` and writing client frames
    /// to `requests`.
    pub fn new(replies: R, requests: W) -> Self {
        ProtocolRestoreSink {
            replies: FrameReader::new(replies, Direction::Server),
            frames: FrameWriter::new(requests),
        }
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.frames.position()
    }

    /// Recover the reply reader and the request writer.
    pub fn into_parts(self) -> (R, W) {
        (self.replies.into_inner(), self.frames.into_inner())
    }
}

impl<R: Read, W: Write> RestoreSink for ProtocolRestoreSink<R, W> {
    fn restore<B: Read>(&mut self, header: &[u8], blocks: &mut DumpBlocks<B>) -> DumpResult<()> {
        let decoded = DumpHeader::decode(header)?;
        let header_data = header_message(&decoded).encode_body()?;
        let header_len = header_data.len();
        self.frames
            .write_message(&RestoreRequest::new(header_data).to_message()?)?;
        self.frames.flush()?;
        debug!(target: "dbdump::restore", header_len, "Sent restore request");

        let ready = expect_reply(&mut self.replies, MessageKind::RestoreReady)?;
        let ready = RestoreReadyMessage::from_message(&ready)?;
        if ready.jobs != 1 {
            return Err(DumpError::protocol(format!(
                "server granted {} restore jobs, only 1 is supported",
                ready.jobs
            )));
        }

        // (owning object, number within that object) for each file block
        let owners: Vec<(Uuid, u64)> = decoded
            .blocks
            .iter()
            .flat_map(|block| {
                let object_id = block.descriptor.schema_object_id;
                (0..block.chunks.len() as u64).map(move |num| (object_id, num))
            })
            .collect();

        let mut index = 0u64;
        while let BlockStep::Block(data) = blocks.next_block()? {
            let (object_id, block_num) = owners.get(index as usize).copied().ok_or_else(|| {
                DumpError::ChunkTableMismatch {
                    index,
                    reason: "the header records no chunk for this block".to_string(),
                }
            })?;
            let block_data = DumpBlockMessage::data_block(object_id, block_num, data).encode_body()?;
            self.frames
                .write_message(&RestoreBlockMessage { block_data }.to_message()?)?;
            index += 1;
        }

        self.frames.write_message(&RestoreEofMessage.to_message()?)?;
        self.frames.flush()?;
        debug!(target: "dbdump::restore", blocks = index, "Sent restore data");

        let complete = expect_reply(&mut self.replies, MessageKind::CommandComplete)?;
        let status = CommandCompleteMessage::from_message(&complete)?.status;
        expect_reply(&mut self.replies, MessageKind::ReadyForCommand)?;
        info!(target: "dbdump::restore", status = %status, "Server accepted restore");
        Ok(())
    }
}
