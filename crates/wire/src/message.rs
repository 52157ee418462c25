//! Tagged wire messages
//!
//! Every message is framed as
//!
//! ```text
//! [tag: u8][total_length: u32 BE][field_1]...[field_n]
//! ```
//!
//! `total_length` counts itself and the fields that follow, not the tag.
//! A decoder is handed the tag and exactly `total_length - 4` body bytes,
//! and fails if any of them remain after the last declared field.

use crate::catalog::{MessageSpec, MESSAGE_SPECS};
use crate::codec::{decode_struct, encode_struct, validate_struct};
use crate::error::{WireError, WireResult};
use crate::registry::MessageRegistry;
use crate::schema::StructSchema;
use crate::value::Value;
use dbdump_core::ByteCursor;
use std::fmt;
use std::io::Write;

/// Size of the `total_length` word, which counts itself
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Size of the tag byte plus the length word
pub const FRAME_PREFIX_SIZE: usize = 1 + LENGTH_FIELD_SIZE;

/// Which peer sends a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Server to client
    Server,
    /// Client to server
    Client,
}

impl Direction {
    /// Lower-case name used in diagnostics
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Server => "server",
            Direction::Client => "client",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every message kind of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    // Server
    /// `E`
    ErrorResponse,
    /// `L`
    LogMessage,
    /// `Z`
    ReadyForCommand,
    /// `+`
    RestoreReady,
    /// `C`
    CommandComplete,
    /// `T`
    CommandDataDescription,
    /// `s`
    StateDataDescription,
    /// `D`
    Data,
    /// `@`
    DumpHeader,
    /// `=` (server)
    DumpBlock,
    /// `K`
    ServerKeyData,
    /// `S` (server)
    ParameterStatus,
    /// `v`
    ServerHandshake,
    /// `R`, status 0x00
    AuthenticationOk,
    /// `R`, status 0x0A
    AuthenticationRequiredSasl,
    /// `R`, status 0x0B
    AuthenticationSaslContinue,
    /// `R`, status 0x0C
    AuthenticationSaslFinal,

    // Client
    /// `V`
    ClientHandshake,
    /// `p`
    AuthenticationSaslInitialResponse,
    /// `r`
    AuthenticationSaslResponse,
    /// `P`
    Parse,
    /// `O`
    Execute,
    /// `S` (client)
    Sync,
    /// `H`
    Flush,
    /// `X`
    Terminate,
    /// `>`
    Dump,
    /// `<`
    Restore,
    /// `=` (client)
    RestoreBlock,
    /// `.`
    RestoreEof,
}

impl MessageKind {
    /// Number of message kinds
    pub const COUNT: usize = 29;

    /// Every kind, in declaration order
    pub const ALL: [MessageKind; MessageKind::COUNT] = [
        MessageKind::ErrorResponse,
        MessageKind::LogMessage,
        MessageKind::ReadyForCommand,
        MessageKind::RestoreReady,
        MessageKind::CommandComplete,
        MessageKind::CommandDataDescription,
        MessageKind::StateDataDescription,
        MessageKind::Data,
        MessageKind::DumpHeader,
        MessageKind::DumpBlock,
        MessageKind::ServerKeyData,
        MessageKind::ParameterStatus,
        MessageKind::ServerHandshake,
        MessageKind::AuthenticationOk,
        MessageKind::AuthenticationRequiredSasl,
        MessageKind::AuthenticationSaslContinue,
        MessageKind::AuthenticationSaslFinal,
        MessageKind::ClientHandshake,
        MessageKind::AuthenticationSaslInitialResponse,
        MessageKind::AuthenticationSaslResponse,
        MessageKind::Parse,
        MessageKind::Execute,
        MessageKind::Sync,
        MessageKind::Flush,
        MessageKind::Terminate,
        MessageKind::Dump,
        MessageKind::Restore,
        MessageKind::RestoreBlock,
        MessageKind::RestoreEof,
    ];

    /// Catalog entry for this kind
    pub fn spec(self) -> &'static MessageSpec {
        &MESSAGE_SPECS[self as usize]
    }

    /// Tag byte
    pub fn tag(self) -> u8 {
        self.spec().tag
    }

    /// Protocol name, e.g. `DumpHeader`
    pub fn name(self) -> &'static str {
        self.spec().schema.name
    }

    /// Sending peer
    pub fn direction(self) -> Direction {
        self.spec().direction
    }

    /// Field layout
    pub fn schema(self) -> &'static StructSchema {
        self.spec().schema
    }

    /// Leading `u32` value for kinds that share a tag
    pub fn discriminator(self) -> Option<u32> {
        self.spec().discriminator
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated wire message
///
/// Field values are held in schema order. A `Message` can only be obtained
/// through a validating constructor or a successful decode, and exposes no
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    fields: Vec<Value>,
}

impl Message {
    /// Build a message from field values in schema order.
    pub fn new(kind: MessageKind, fields: Vec<Value>) -> WireResult<Self> {
        validate_struct(kind.schema(), &fields, kind.name())?;
        check_discriminator(kind, &fields)?;
        Ok(Message { kind, fields })
    }

    /// Start building a message by field name.
    pub fn builder(kind: MessageKind) -> MessageBuilder {
        MessageBuilder {
            kind,
            fields: vec![None; kind.schema().fields.len()],
        }
    }

    /// Message kind
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Field values in schema order
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Consume the message, returning its field values
    pub fn into_fields(self) -> Vec<Value> {
        self.fields
    }

    /// Value of the field named `name`
    pub fn field(&self, name: &str) -> WireResult<&Value> {
        let index = self
            .kind
            .schema()
            .field_index(name)
            .ok_or_else(|| WireError::UnknownField {
                kind: self.kind.name(),
                field: name.to_string(),
            })?;
        Ok(&self.fields[index])
    }

    /// Encode the fields only, without tag or length.
    pub fn encode_body(&self) -> WireResult<Vec<u8>> {
        let mut cursor = ByteCursor::new(Vec::new());
        encode_struct(self.kind.schema(), &self.fields, self.kind.name(), &mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Encode the complete frame.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        let body = self.encode_body()?;
        let mut cursor = ByteCursor::new(Vec::with_capacity(FRAME_PREFIX_SIZE + body.len()));
        write_frame(&mut cursor, self.kind.tag(), &body)?;
        Ok(cursor.into_inner())
    }

    /// Encode the complete frame into `cursor`.
    ///
    /// The body is encoded to a buffer first so that a validation failure
    /// leaves the cursor untouched.
    pub fn encode_into<W: Write>(&self, cursor: &mut ByteCursor<W>) -> WireResult<()> {
        let body = self.encode_body()?;
        write_frame(cursor, self.kind.tag(), &body)
    }

    /// Decode a message body received with `tag` from `direction`.
    pub fn decode(direction: Direction, tag: u8, body: &[u8]) -> WireResult<Self> {
        let kind = MessageRegistry::for_direction(direction).lookup(tag, body)?;
        Message::decode_body(kind, body)
    }

    /// Decode a body known to hold a message of `kind`.
    pub fn decode_body(kind: MessageKind, body: &[u8]) -> WireResult<Self> {
        let mut cursor = ByteCursor::new(body);
        let fields = decode_struct(kind.schema(), kind.name(), &mut cursor)?;
        let remaining = cursor.get_ref().len();
        if remaining != 0 {
            return Err(WireError::TrailingBytes {
                kind: kind.name(),
                remaining,
            });
        }
        check_discriminator(kind, &fields)?;
        Ok(Message { kind, fields })
    }

    /// Decode one complete frame, tag and length included.
    pub fn decode_frame(direction: Direction, frame: &[u8]) -> WireResult<Self> {
        let (tag, body) = split_frame(frame)?;
        Message::decode(direction, tag, body)
    }
}

/// Split a complete frame into its tag and body, checking the length word.
pub fn split_frame(frame: &[u8]) -> WireResult<(u8, &[u8])> {
    if frame.len() < FRAME_PREFIX_SIZE {
        return Err(WireError::FrameLength {
            tag: frame.first().map(|&t| char::from(t)).unwrap_or('\0'),
            length: frame.len() as u64,
            reason: "frame is shorter than its tag and length",
        });
    }
    let tag = frame[0];
    let mut cursor = ByteCursor::new(&frame[1..FRAME_PREFIX_SIZE]);
    let length = u64::from(cursor.read_u32()?);
    check_total_length(tag, length)?;
    let body = &frame[FRAME_PREFIX_SIZE..];
    if length != (body.len() + LENGTH_FIELD_SIZE) as u64 {
        return Err(WireError::FrameLength {
            tag: char::from(tag),
            length,
            reason: "length does not match the frame size",
        });
    }
    Ok((tag, body))
}

pub(crate) fn check_total_length(tag: u8, length: u64) -> WireResult<()> {
    if length < LENGTH_FIELD_SIZE as u64 {
        return Err(WireError::FrameLength {
            tag: char::from(tag),
            length,
            reason: "length must count at least its own 4 bytes",
        });
    }
    Ok(())
}

pub(crate) fn write_frame<W: Write>(
    cursor: &mut ByteCursor<W>,
    tag: u8,
    body: &[u8],
) -> WireResult<()> {
    let total = body.len() + LENGTH_FIELD_SIZE;
    let total = u32::try_from(total).map_err(|_| WireError::FrameLength {
        tag: char::from(tag),
        length: total as u64,
        reason: "message body does not fit a u32 length",
    })?;
    cursor.write_u8(tag)?;
    cursor.write_u32(total)?;
    cursor.write_bytes(body)?;
    Ok(())
}

fn check_discriminator(kind: MessageKind, fields: &[Value]) -> WireResult<()> {
    let Some(expected) = kind.discriminator() else {
        return Ok(());
    };
    let actual = fields.first().and_then(Value::as_u64);
    match actual {
        Some(actual) if actual == u64::from(expected) => Ok(()),
        other => Err(WireError::DiscriminatorMismatch {
            kind: kind.name(),
            expected,
            actual: other.unwrap_or(u64::MAX),
        }),
    }
}

/// Builds a [`Message`] from named fields
#[derive(Debug)]
pub struct MessageBuilder {
    kind: MessageKind,
    fields: Vec<Option<Value>>,
}

impl MessageBuilder {
    /// Set the field named `name`.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> WireResult<Self> {
        let index = self
            .kind
            .schema()
            .field_index(name)
            .ok_or_else(|| WireError::UnknownField {
                kind: self.kind.name(),
                field: name.to_string(),
            })?;
        self.fields[index] = Some(value.into());
        Ok(self)
    }

    /// Validate and build. Every declared field must have been set.
    pub fn build(self) -> WireResult<Message> {
        let schema = self.kind.schema();
        let mut values = Vec::with_capacity(self.fields.len());
        for (field, value) in schema.fields.iter().zip(self.fields) {
            match value {
                Some(value) => values.push(value),
                None => {
                    return Err(WireError::MissingField {
                        kind: self.kind.name(),
                        field: field.name.to_string(),
                    })
                }
            }
        }
        Message::new(self.kind, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn restore_block(data: &[u8]) -> Message {
        Message::builder(MessageKind::RestoreBlock)
            .set("block_data", data)
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let msg = restore_block(b"xyz");
        let bytes = msg.encode().unwrap();
        // tag, total_length = 4 + (4 + 3), then the length-prefixed payload
        assert_eq!(
            bytes,
            vec![b'=', 0, 0, 0, 11, 0, 0, 0, 3, b'x', b'y', b'z']
        );
    }

    #[test]
    fn test_empty_message_length() {
        let msg = Message::new(MessageKind::RestoreEof, vec![]).unwrap();
        assert_eq!(msg.encode().unwrap(), vec![b'.', 0, 0, 0, 4]);
    }

    #[test]
    fn test_decode_frame_roundtrip() {
        let msg = restore_block(b"payload");
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode_frame(Direction::Client, &bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_same_tag_resolves_by_direction() {
        let block = Message::builder(MessageKind::DumpBlock)
            .set("attributes", Value::Array(vec![]))
            .unwrap()
            .build()
            .unwrap();
        let bytes = block.encode().unwrap();
        let decoded = Message::decode_frame(Direction::Server, &bytes).unwrap();
        assert_eq!(decoded.kind(), MessageKind::DumpBlock);

        // Two bytes are too short for the u32 prefix of a RestoreBlock
        let err = Message::decode_frame(Direction::Client, &bytes).unwrap_err();
        assert_eq!(err.field(), Some("RestoreBlock.block_data"));
    }

    #[test]
    fn test_builder_missing_field() {
        let err = Message::builder(MessageKind::Restore)
            .set("jobs", 1u16)
            .unwrap()
            .build()
            .unwrap_err();
        match err {
            WireError::MissingField { kind, field } => {
                assert_eq!(kind, "Restore");
                assert_eq!(field, "attributes");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_builder_unknown_field() {
        let err = Message::builder(MessageKind::Dump)
            .set("compression", 1u8)
            .unwrap_err();
        assert!(matches!(err, WireError::UnknownField { .. }));
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        let err = Message::new(
            MessageKind::Restore,
            vec![Value::Array(vec![]), Value::UInt(70_000), Value::Bytes(vec![])],
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("Restore.jobs"));
    }

    #[test]
    fn test_new_rejects_wrong_discriminator() {
        let err = Message::new(MessageKind::AuthenticationOk, vec![Value::UInt(0x0A)]).unwrap_err();
        assert!(matches!(
            err,
            WireError::DiscriminatorMismatch {
                expected: 0,
                actual: 0x0A,
                ..
            }
        ));
    }

    #[test]
    fn test_discriminated_decode() {
        let msg = Message::new(
            MessageKind::AuthenticationSaslContinue,
            vec![Value::UInt(0x0B), Value::Bytes(b"r=abc".to_vec())],
        )
        .unwrap();
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode_frame(Direction::Server, &bytes).unwrap();
        assert_eq!(decoded.kind(), MessageKind::AuthenticationSaslContinue);
        assert_eq!(decoded.field("sasl_data").unwrap().as_bytes(), Some(&b"r=abc"[..]));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let msg = Message::new(
            MessageKind::StateDataDescription,
            vec![Value::Uuid(Uuid::nil()), Value::Bytes(vec![1])],
        )
        .unwrap();
        let mut body = msg.encode_body().unwrap();
        body.push(0);
        let err = Message::decode(Direction::Server, b's', &body).unwrap_err();
        assert!(matches!(err, WireError::TrailingBytes { remaining: 1, .. }));
    }

    #[test]
    fn test_split_frame_checks_length() {
        assert!(matches!(
            split_frame(&[b'.', 0, 0, 0, 3]),
            Err(WireError::FrameLength { .. })
        ));
        assert!(matches!(
            split_frame(&[b'.', 0, 0, 0, 5]),
            Err(WireError::FrameLength { .. })
        ));
        assert!(matches!(split_frame(&[b'.']), Err(WireError::FrameLength { .. })));
        let (tag, body) = split_frame(&[b'.', 0, 0, 0, 4]).unwrap();
        assert_eq!(tag, b'.');
        assert!(body.is_empty());
    }

    #[test]
    fn test_unknown_tag() {
        let err = Message::decode(Direction::Client, b'!', &[]).unwrap_err();
        assert!(matches!(err, WireError::UnknownTag { tag: '!', .. }));
    }
}
