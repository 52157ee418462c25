//! Typed views of the dump/restore messages
//!
//! Dump negotiation uses seven of the catalog's kinds, plus the generic
//! replies that end or fail a command. These structs convert to and from the
//! generic [`Message`] so callers never index fields by position.
//!
//! A restore replays the server's own dump messages: `Restore.header_data`
//! carries the body of the original `DumpHeader`, and each
//! `RestoreBlock.block_data` carries the body of an original `DumpBlock`.

use crate::error::{WireError, WireResult};
use crate::message::{Message, MessageKind};
use crate::value::Value;
use uuid::Uuid;

/// Well-known `DumpHeader`/`DumpBlock` attribute keys
pub mod attr {
    /// Block type, one of [`BLOCK_TYPE_INFO`] or [`BLOCK_TYPE_DATA`]
    pub const BLOCK_TYPE: u16 = 101;
    /// Server time at dump start
    pub const SERVER_TIME: u16 = 102;
    /// Server version string
    pub const SERVER_VERSION: u16 = 103;
    /// Schema object the block belongs to
    pub const BLOCK_ID: u16 = 110;
    /// Sequence number of the block within its object
    pub const BLOCK_NUM: u16 = 111;
    /// Raw block data
    pub const BLOCK_DATA: u16 = 112;

    /// `BLOCK_TYPE` value of a header block
    pub const BLOCK_TYPE_INFO: &[u8] = b"I";
    /// `BLOCK_TYPE` value of a data block
    pub const BLOCK_TYPE_DATA: &[u8] = b"D";
}

/// Ordered `(code, value)` attribute list
pub type Attributes = Vec<(u16, Vec<u8>)>;

/// Ordered `(name, json_value)` annotation list
pub type Annotations = Vec<(String, String)>;

/// Conversion between a typed view and a generic [`Message`]
pub trait TypedMessage: Sized {
    /// Message kind this view represents
    const KIND: MessageKind;

    /// Build the validated generic message.
    fn to_message(&self) -> WireResult<Message>;

    /// Read the view out of a message of kind [`Self::KIND`].
    fn from_message(message: &Message) -> WireResult<Self>;

    /// Encode the complete frame.
    fn encode(&self) -> WireResult<Vec<u8>> {
        self.to_message()?.encode()
    }

    /// Encode the body only.
    fn encode_body(&self) -> WireResult<Vec<u8>> {
        self.to_message()?.encode_body()
    }

    /// Decode a body known to hold this kind.
    fn decode_body(body: &[u8]) -> WireResult<Self> {
        Self::from_message(&Message::decode_body(Self::KIND, body)?)
    }
}

fn ensure_kind(message: &Message, kind: MessageKind) -> WireResult<()> {
    if message.kind() != kind {
        return Err(WireError::UnexpectedMessage {
            expected: kind.name(),
            found: message.kind().name(),
        });
    }
    Ok(())
}

/// Look up the first attribute with `code`.
pub fn find_attribute(attributes: &[(u16, Vec<u8>)], code: u16) -> Option<&[u8]> {
    attributes
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, v)| v.as_slice())
}

fn attributes_to_value(attributes: &[(u16, Vec<u8>)]) -> Value {
    Value::Array(
        attributes
            .iter()
            .map(|(code, value)| Value::Struct(vec![Value::from(*code), Value::from(value.clone())]))
            .collect(),
    )
}

fn attributes_from_value(value: &Value, field: &str) -> WireResult<Attributes> {
    value
        .expect_array(field)?
        .iter()
        .map(|item| {
            let kv = item.expect_struct(field)?;
            Ok((narrow_u16(kv[0].expect_u64(field)?, field)?, kv[1].expect_bytes(field)?.to_vec()))
        })
        .collect()
}

fn annotations_to_value(annotations: &[(String, String)]) -> Value {
    Value::Array(
        annotations
            .iter()
            .map(|(name, value)| Value::Struct(vec![Value::from(name.as_str()), Value::from(value.as_str())]))
            .collect(),
    )
}

fn annotations_from_value(value: &Value, field: &str) -> WireResult<Annotations> {
    value
        .expect_array(field)?
        .iter()
        .map(|item| {
            let pair = item.expect_struct(field)?;
            Ok((pair[0].expect_str(field)?.to_string(), pair[1].expect_str(field)?.to_string()))
        })
        .collect()
}

fn narrow_u16(value: u64, field: &str) -> WireResult<u16> {
    narrow(value, field, "uint16")
}

fn narrow<T: TryFrom<u64>>(value: u64, field: &str, type_name: &'static str) -> WireResult<T> {
    T::try_from(value).map_err(|_| WireError::OutOfRange {
        field: field.to_string(),
        type_name,
        value: value.to_string(),
    })
}

// =============================================================================
// Client requests
// =============================================================================

/// `Dump` request (`>`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpRequest {
    /// Request annotations
    pub annotations: Annotations,
    /// `DumpFlag` bit mask
    pub flags: u64,
}

impl DumpRequest {
    /// `DumpFlag::DUMP_SECRETS`
    pub const DUMP_SECRETS: u64 = 1;

    /// Whether secrets are requested
    pub fn dump_secrets(&self) -> bool {
        self.flags & Self::DUMP_SECRETS != 0
    }
}

impl TypedMessage for DumpRequest {
    const KIND: MessageKind = MessageKind::Dump;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(
            Self::KIND,
            vec![annotations_to_value(&self.annotations), Value::Enum(self.flags)],
        )
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(DumpRequest {
            annotations: annotations_from_value(message.field("annotations")?, "Dump.annotations")?,
            flags: message.field("flags")?.expect_u64("Dump.flags")?,
        })
    }
}

/// `Restore` request (`<`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Request attributes
    pub attributes: Attributes,
    /// Parallel jobs; only 1 is supported
    pub jobs: u16,
    /// Body of the original `DumpHeader`
    pub header_data: Vec<u8>,
}

impl RestoreRequest {
    /// Single-job restore of `header_data`
    pub fn new(header_data: Vec<u8>) -> Self {
        RestoreRequest {
            attributes: Vec::new(),
            jobs: 1,
            header_data,
        }
    }
}

impl TypedMessage for RestoreRequest {
    const KIND: MessageKind = MessageKind::Restore;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(
            Self::KIND,
            vec![
                attributes_to_value(&self.attributes),
                Value::from(self.jobs),
                Value::from(self.header_data.clone()),
            ],
        )
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(RestoreRequest {
            attributes: attributes_from_value(message.field("attributes")?, "Restore.attributes")?,
            jobs: narrow_u16(message.field("jobs")?.expect_u64("Restore.jobs")?, "Restore.jobs")?,
            header_data: message
                .field("header_data")?
                .expect_bytes("Restore.header_data")?
                .to_vec(),
        })
    }
}

/// `RestoreBlock` request (`=` from the client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreBlockMessage {
    /// Body of the original `DumpBlock`
    pub block_data: Vec<u8>,
}

impl TypedMessage for RestoreBlockMessage {
    const KIND: MessageKind = MessageKind::RestoreBlock;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(Self::KIND, vec![Value::from(self.block_data.clone())])
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(RestoreBlockMessage {
            block_data: message
                .field("block_data")?
                .expect_bytes("RestoreBlock.block_data")?
                .to_vec(),
        })
    }
}

/// `RestoreEof` request (`.`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreEofMessage;

impl TypedMessage for RestoreEofMessage {
    const KIND: MessageKind = MessageKind::RestoreEof;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(Self::KIND, Vec::new())
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(RestoreEofMessage)
    }
}

// =============================================================================
// Server responses
// =============================================================================

/// Type referenced by a dump header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTypeInfo {
    /// Qualified type name
    pub type_name: String,
    /// Type class
    pub type_class: String,
    /// Type id
    pub type_id: Uuid,
}

/// Schema object described by a dump header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpObjectDesc {
    /// Schema object id
    pub object_id: Uuid,
    /// Opaque type layout description
    pub description: Vec<u8>,
    /// Objects that must be restored first
    pub dependencies: Vec<Uuid>,
}

/// `DumpHeader` response (`@`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpHeaderMessage {
    /// Header attributes (server time, server version, ...)
    pub attributes: Attributes,
    /// Server major version
    pub major_ver: u16,
    /// Server minor version
    pub minor_ver: u16,
    /// Schema DDL text
    pub schema_ddl: String,
    /// Types referenced by the dump
    pub types: Vec<DumpTypeInfo>,
    /// One descriptor per dumped object
    pub descriptors: Vec<DumpObjectDesc>,
}

impl DumpHeaderMessage {
    /// Value of the attribute with `code`
    pub fn attribute(&self, code: u16) -> Option<&[u8]> {
        find_attribute(&self.attributes, code)
    }
}

impl TypedMessage for DumpHeaderMessage {
    const KIND: MessageKind = MessageKind::DumpHeader;

    fn to_message(&self) -> WireResult<Message> {
        let types = self
            .types
            .iter()
            .map(|t| {
                Value::Struct(vec![
                    Value::from(t.type_name.as_str()),
                    Value::from(t.type_class.as_str()),
                    Value::from(t.type_id),
                ])
            })
            .collect();
        let descriptors = self
            .descriptors
            .iter()
            .map(|d| {
                Value::Struct(vec![
                    Value::from(d.object_id),
                    Value::from(d.description.clone()),
                    Value::Array(d.dependencies.iter().copied().map(Value::from).collect()),
                ])
            })
            .collect();
        Message::new(
            Self::KIND,
            vec![
                attributes_to_value(&self.attributes),
                Value::from(self.major_ver),
                Value::from(self.minor_ver),
                Value::from(self.schema_ddl.as_str()),
                Value::Array(types),
                Value::Array(descriptors),
            ],
        )
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        let types = message
            .field("types")?
            .expect_array("DumpHeader.types")?
            .iter()
            .map(|item| {
                let f = item.expect_struct("DumpHeader.types")?;
                Ok(DumpTypeInfo {
                    type_name: f[0].expect_str("DumpHeader.types.type_name")?.to_string(),
                    type_class: f[1].expect_str("DumpHeader.types.type_class")?.to_string(),
                    type_id: f[2].expect_uuid("DumpHeader.types.type_id")?,
                })
            })
            .collect::<WireResult<Vec<_>>>()?;
        let descriptors = message
            .field("descriptors")?
            .expect_array("DumpHeader.descriptors")?
            .iter()
            .map(|item| {
                let f = item.expect_struct("DumpHeader.descriptors")?;
                Ok(DumpObjectDesc {
                    object_id: f[0].expect_uuid("DumpHeader.descriptors.object_id")?,
                    description: f[1]
                        .expect_bytes("DumpHeader.descriptors.description")?
                        .to_vec(),
                    dependencies: f[2]
                        .expect_array("DumpHeader.descriptors.dependencies")?
                        .iter()
                        .map(|d| d.expect_uuid("DumpHeader.descriptors.dependencies"))
                        .collect::<WireResult<Vec<_>>>()?,
                })
            })
            .collect::<WireResult<Vec<_>>>()?;

        Ok(DumpHeaderMessage {
            attributes: attributes_from_value(message.field("attributes")?, "DumpHeader.attributes")?,
            major_ver: narrow_u16(
                message.field("major_ver")?.expect_u64("DumpHeader.major_ver")?,
                "DumpHeader.major_ver",
            )?,
            minor_ver: narrow_u16(
                message.field("minor_ver")?.expect_u64("DumpHeader.minor_ver")?,
                "DumpHeader.minor_ver",
            )?,
            schema_ddl: message
                .field("schema_ddl")?
                .expect_str("DumpHeader.schema_ddl")?
                .to_string(),
            types,
            descriptors,
        })
    }
}

/// `DumpBlock` response (`=` from the server)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpBlockMessage {
    /// Block attributes (`BLOCK_ID`, `BLOCK_NUM`, `BLOCK_DATA`, ...)
    pub attributes: Attributes,
}

impl DumpBlockMessage {
    /// Data block for `object_id` carrying `data`
    pub fn data_block(object_id: Uuid, block_num: u64, data: Vec<u8>) -> Self {
        DumpBlockMessage {
            attributes: vec![
                (attr::BLOCK_TYPE, attr::BLOCK_TYPE_DATA.to_vec()),
                (attr::BLOCK_ID, object_id.as_bytes().to_vec()),
                (attr::BLOCK_NUM, block_num.to_string().into_bytes()),
                (attr::BLOCK_DATA, data),
            ],
        }
    }

    /// Value of the attribute with `code`
    pub fn attribute(&self, code: u16) -> Option<&[u8]> {
        find_attribute(&self.attributes, code)
    }

    /// Schema object the block belongs to
    pub fn block_id(&self) -> Option<Uuid> {
        self.attribute(attr::BLOCK_ID)
            .and_then(|raw| Uuid::from_slice(raw).ok())
    }

    /// Raw block data
    pub fn block_data(&self) -> Option<&[u8]> {
        self.attribute(attr::BLOCK_DATA)
    }
}

impl TypedMessage for DumpBlockMessage {
    const KIND: MessageKind = MessageKind::DumpBlock;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(Self::KIND, vec![attributes_to_value(&self.attributes)])
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(DumpBlockMessage {
            attributes: attributes_from_value(message.field("attributes")?, "DumpBlock.attributes")?,
        })
    }
}

/// `RestoreReady` response (`+`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreReadyMessage {
    /// Response annotations
    pub annotations: Annotations,
    /// Parallel jobs granted; always 1
    pub jobs: u16,
}

impl TypedMessage for RestoreReadyMessage {
    const KIND: MessageKind = MessageKind::RestoreReady;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(
            Self::KIND,
            vec![annotations_to_value(&self.annotations), Value::from(self.jobs)],
        )
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(RestoreReadyMessage {
            annotations: annotations_from_value(
                message.field("annotations")?,
                "RestoreReady.annotations",
            )?,
            jobs: narrow_u16(
                message.field("jobs")?.expect_u64("RestoreReady.jobs")?,
                "RestoreReady.jobs",
            )?,
        })
    }
}

/// `ErrorResponse` (`E`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponseMessage {
    /// `ErrorSeverity` member
    pub severity: u8,
    /// Server error code
    pub error_code: u32,
    /// Human readable message
    pub message: String,
    /// Extra error attributes
    pub attributes: Attributes,
}

impl ErrorResponseMessage {
    /// Plain `ERROR` severity
    pub const SEVERITY_ERROR: u8 = 120;

    /// Error with no attributes
    pub fn new(error_code: u32, message: impl Into<String>) -> Self {
        ErrorResponseMessage {
            severity: Self::SEVERITY_ERROR,
            error_code,
            message: message.into(),
            attributes: Vec::new(),
        }
    }
}

impl TypedMessage for ErrorResponseMessage {
    const KIND: MessageKind = MessageKind::ErrorResponse;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(
            Self::KIND,
            vec![
                Value::Enum(u64::from(self.severity)),
                Value::from(self.error_code),
                Value::from(self.message.as_str()),
                attributes_to_value(&self.attributes),
            ],
        )
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(ErrorResponseMessage {
            severity: narrow(
                message.field("severity")?.expect_u64("ErrorResponse.severity")?,
                "ErrorResponse.severity",
                "uint8",
            )?,
            error_code: narrow(
                message.field("error_code")?.expect_u64("ErrorResponse.error_code")?,
                "ErrorResponse.error_code",
                "uint32",
            )?,
            message: message
                .field("message")?
                .expect_str("ErrorResponse.message")?
                .to_string(),
            attributes: attributes_from_value(
                message.field("attributes")?,
                "ErrorResponse.attributes",
            )?,
        })
    }
}

/// `CommandComplete` (`C`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCompleteMessage {
    /// Response annotations
    pub annotations: Annotations,
    /// Capabilities used by the command
    pub capabilities: u64,
    /// Command status, e.g. `RESTORE`
    pub status: String,
    /// Descriptor id of `state_data`
    pub state_typedesc_id: Uuid,
    /// Encoded session state
    pub state_data: Vec<u8>,
}

impl CommandCompleteMessage {
    /// Completion with no capabilities and no state
    pub fn new(status: impl Into<String>) -> Self {
        CommandCompleteMessage {
            annotations: Vec::new(),
            capabilities: 0,
            status: status.into(),
            state_typedesc_id: Uuid::nil(),
            state_data: Vec::new(),
        }
    }
}

impl TypedMessage for CommandCompleteMessage {
    const KIND: MessageKind = MessageKind::CommandComplete;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(
            Self::KIND,
            vec![
                annotations_to_value(&self.annotations),
                Value::Enum(self.capabilities),
                Value::from(self.status.as_str()),
                Value::from(self.state_typedesc_id),
                Value::from(self.state_data.clone()),
            ],
        )
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(CommandCompleteMessage {
            annotations: annotations_from_value(
                message.field("annotations")?,
                "CommandComplete.annotations",
            )?,
            capabilities: message
                .field("capabilities")?
                .expect_u64("CommandComplete.capabilities")?,
            status: message
                .field("status")?
                .expect_str("CommandComplete.status")?
                .to_string(),
            state_typedesc_id: message
                .field("state_typedesc_id")?
                .expect_uuid("CommandComplete.state_typedesc_id")?,
            state_data: message
                .field("state_data")?
                .expect_bytes("CommandComplete.state_data")?
                .to_vec(),
        })
    }
}

/// `ReadyForCommand` (`Z`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyForCommandMessage {
    /// Response annotations
    pub annotations: Annotations,
    /// `TransactionState` member
    pub transaction_state: u8,
}

impl ReadyForCommandMessage {
    /// `NOT_IN_TRANSACTION`
    pub const IDLE: u8 = 0x49;

    /// Ready outside any transaction
    pub fn idle() -> Self {
        ReadyForCommandMessage {
            annotations: Vec::new(),
            transaction_state: Self::IDLE,
        }
    }
}

impl TypedMessage for ReadyForCommandMessage {
    const KIND: MessageKind = MessageKind::ReadyForCommand;

    fn to_message(&self) -> WireResult<Message> {
        Message::new(
            Self::KIND,
            vec![
                annotations_to_value(&self.annotations),
                Value::Enum(u64::from(self.transaction_state)),
            ],
        )
    }

    fn from_message(message: &Message) -> WireResult<Self> {
        ensure_kind(message, Self::KIND)?;
        Ok(ReadyForCommandMessage {
            annotations: annotations_from_value(
                message.field("annotations")?,
                "ReadyForCommand.annotations",
            )?,
            transaction_state: narrow(
                message
                    .field("transaction_state")?
                    .expect_u64("ReadyForCommand.transaction_state")?,
                "ReadyForCommand.transaction_state",
                "uint8",
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Direction;

    #[test]
    fn test_dump_request_roundtrip() {
        let req = DumpRequest {
            annotations: vec![("tag".into(), "\"nightly\"".into())],
            flags: DumpRequest::DUMP_SECRETS,
        };
        let bytes = req.encode().unwrap();
        assert_eq!(bytes[0], b'>');
        let msg = Message::decode_frame(Direction::Client, &bytes).unwrap();
        let back = DumpRequest::from_message(&msg).unwrap();
        assert_eq!(back, req);
        assert!(back.dump_secrets());
    }

    #[test]
    fn test_dump_flags_rejects_unknown_bits() {
        let req = DumpRequest {
            annotations: vec![],
            flags: 0b10,
        };
        assert!(matches!(
            req.to_message(),
            Err(WireError::InvalidEnumValue { .. })
        ));
    }

    #[test]
    fn test_dump_header_roundtrip() {
        let object_id = Uuid::from_u128(7);
        let header = DumpHeaderMessage {
            attributes: vec![
                (attr::BLOCK_TYPE, attr::BLOCK_TYPE_INFO.to_vec()),
                (attr::SERVER_TIME, b"1700000000".to_vec()),
                (attr::SERVER_VERSION, b"1.0".to_vec()),
            ],
            major_ver: 1,
            minor_ver: 0,
            schema_ddl: "module default {}".into(),
            types: vec![DumpTypeInfo {
                type_name: "default::User".into(),
                type_class: "ObjectType".into(),
                type_id: Uuid::from_u128(9),
            }],
            descriptors: vec![DumpObjectDesc {
                object_id,
                description: vec![1, 2, 3],
                dependencies: vec![Uuid::from_u128(8)],
            }],
        };
        let body = header.encode_body().unwrap();
        let back = DumpHeaderMessage::decode_body(&body).unwrap();
        assert_eq!(back, header);
        assert_eq!(back.attribute(attr::SERVER_VERSION), Some(&b"1.0"[..]));
        assert_eq!(back.attribute(attr::BLOCK_ID), None);
    }

    #[test]
    fn test_restore_replays_dump_bodies() {
        let object_id = Uuid::from_u128(0x01);
        let block = DumpBlockMessage::data_block(object_id, 0, b"abc".to_vec());
        let block_body = block.encode_body().unwrap();

        let restore_block = RestoreBlockMessage {
            block_data: block_body.clone(),
        };
        let frame = restore_block.encode().unwrap();
        let msg = Message::decode_frame(Direction::Client, &frame).unwrap();
        let forwarded = RestoreBlockMessage::from_message(&msg).unwrap();

        let replayed = DumpBlockMessage::decode_body(&forwarded.block_data).unwrap();
        assert_eq!(replayed.block_id(), Some(object_id));
        assert_eq!(replayed.block_data(), Some(&b"abc"[..]));
    }

    #[test]
    fn test_restore_request_defaults() {
        let req = RestoreRequest::new(vec![0xAA]);
        let msg = req.to_message().unwrap();
        assert_eq!(msg.field("jobs").unwrap(), &Value::UInt(1));
        assert_eq!(RestoreRequest::from_message(&msg).unwrap(), req);
    }

    #[test]
    fn test_restore_ready_and_eof() {
        let ready = RestoreReadyMessage {
            annotations: vec![],
            jobs: 1,
        };
        let msg = Message::decode_frame(Direction::Server, &ready.encode().unwrap()).unwrap();
        assert_eq!(RestoreReadyMessage::from_message(&msg).unwrap(), ready);

        assert_eq!(RestoreEofMessage.encode().unwrap(), vec![b'.', 0, 0, 0, 4]);
    }

    #[test]
    fn test_view_rejects_other_kind() {
        let msg = RestoreEofMessage.to_message().unwrap();
        let err = RestoreBlockMessage::from_message(&msg).unwrap_err();
        assert!(matches!(err, WireError::UnexpectedMessage { .. }));
    }

    #[test]
    fn test_server_reply_views() {
        let error = ErrorResponseMessage::new(0x0500_0001, "restore failed");
        let frame = error.encode().unwrap();
        assert_eq!(frame[0], b'E');
        let back = ErrorResponseMessage::from_message(
            &Message::decode_frame(Direction::Server, &frame).unwrap(),
        )
        .unwrap();
        assert_eq!(back, error);

        let complete = CommandCompleteMessage {
            capabilities: u64::MAX,
            ..CommandCompleteMessage::new("RESTORE")
        };
        let back = CommandCompleteMessage::decode_body(&complete.encode_body().unwrap()).unwrap();
        assert_eq!(back.status, "RESTORE");
        assert_eq!(back.capabilities, u64::MAX);

        let ready = ReadyForCommandMessage::idle();
        assert_eq!(ready.encode().unwrap()[0], b'Z');
        let invalid = ReadyForCommandMessage {
            transaction_state: 0x01,
            ..ReadyForCommandMessage::idle()
        };
        assert!(matches!(
            invalid.to_message(),
            Err(WireError::InvalidEnumValue { .. })
        ));
    }
}
