//! Whole-frame I/O over byte streams

use crate::error::{WireError, WireResult};
use crate::message::{check_total_length, write_frame, Direction, Message, MessageKind, LENGTH_FIELD_SIZE};
use dbdump_core::ByteCursor;
use std::io::{Read, Write};
use tracing::trace;

/// Largest `total_length` accepted by default
pub const DEFAULT_MAX_FRAME_LENGTH: u32 = u32::MAX;

/// Reads framed messages sent by one peer
#[derive(Debug)]
pub struct FrameReader<R> {
    cursor: ByteCursor<R>,
    direction: Direction,
    max_frame_length: u32,
}

impl<R: Read> FrameReader<R> {
    /// Read messages sent in `direction` from `inner`.
    pub fn new(inner: R, direction: Direction) -> Self {
        FrameReader {
            cursor: ByteCursor::new(inner),
            direction,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Reject frames whose `total_length` exceeds `max`.
    pub fn with_max_frame_length(mut self, max: u32) -> Self {
        self.max_frame_length = max;
        self
    }

    /// Read the next raw frame as `(tag, body)`.
    ///
    /// Returns `Ok(None)` when the stream ends before a tag byte. A stream
    /// that ends anywhere inside a frame is an error.
    pub fn read_frame(&mut self) -> WireResult<Option<(u8, Vec<u8>)>> {
        let tag = match self.cursor.read_u8() {
            Ok(tag) => tag,
            Err(e) if e.is_clean_eof() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let length = self.cursor.read_u32()?;
        check_total_length(tag, u64::from(length))?;
        if length > self.max_frame_length {
            return Err(WireError::FrameLength {
                tag: char::from(tag),
                length: u64::from(length),
                reason: "frame exceeds the configured maximum",
            });
        }
        let body = self.cursor.read_bytes(length as usize - LENGTH_FIELD_SIZE)?;
        trace!(tag = %char::from(tag), length, "Read frame");
        Ok(Some((tag, body)))
    }

    /// Read and decode the next message.
    pub fn read_message(&mut self) -> WireResult<Option<Message>> {
        match self.read_frame()? {
            Some((tag, body)) => Message::decode(self.direction, tag, &body).map(Some),
            None => Ok(None),
        }
    }

    /// Read the next message and require it to be of `kind`.
    pub fn expect_message(&mut self, kind: MessageKind) -> WireResult<Message> {
        let message = self.read_message()?.ok_or(WireError::UnexpectedMessage {
            expected: kind.name(),
            found: "end of stream",
        })?;
        if message.kind() != kind {
            return Err(WireError::UnexpectedMessage {
                expected: kind.name(),
                found: message.kind().name(),
            });
        }
        Ok(message)
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.cursor.tell()
    }

    /// Unwrap the underlying reader
    pub fn into_inner(self) -> R {
        self.cursor.into_inner()
    }
}

/// Writes framed messages
#[derive(Debug)]
pub struct FrameWriter<W> {
    cursor: ByteCursor<W>,
}

impl<W: Write> FrameWriter<W> {
    /// Write frames to `inner`.
    pub fn new(inner: W) -> Self {
        FrameWriter {
            cursor: ByteCursor::new(inner),
        }
    }

    /// Encode and write one message.
    pub fn write_message(&mut self, message: &Message) -> WireResult<()> {
        message.encode_into(&mut self.cursor)?;
        trace!(kind = %message.kind(), "Wrote frame");
        Ok(())
    }

    /// Write a frame whose body is already encoded.
    pub fn write_raw(&mut self, tag: u8, body: &[u8]) -> WireResult<()> {
        write_frame(&mut self.cursor, tag, body)
    }

    /// Flush the underlying writer
    pub fn flush(&mut self) -> WireResult<()> {
        self.cursor.flush()?;
        Ok(())
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.cursor.tell()
    }

    /// Borrow the underlying writer
    pub fn get_ref(&self) -> &W {
        self.cursor.get_ref()
    }

    /// Unwrap the underlying writer
    pub fn into_inner(self) -> W {
        self.cursor.into_inner()
    }
}
