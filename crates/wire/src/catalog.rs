//! Static message catalog
//!
//! Field layouts for every message kind of the binary protocol, declared
//! once and never mutated. The `mtype` tag byte and the `message_length`
//! word are framing, not fields, and are omitted from every schema.

use crate::message::{Direction, MessageKind};
use crate::schema::IntWidth::{W16, W32, W64, W8};
use crate::schema::{EnumKind, EnumSpec, Field, FieldType, StructSchema};

const fn field(name: &'static str, ty: FieldType, doc: &'static str) -> Field {
    Field { name, ty, doc }
}

// =============================================================================
// Enumerations
// =============================================================================

/// Severity of an `ErrorResponse`
pub static ERROR_SEVERITY: EnumSpec = EnumSpec {
    name: "ErrorSeverity",
    kind: EnumKind::Exact,
    members: &[("ERROR", 120), ("FATAL", 200), ("PANIC", 255)],
};

/// Severity of a `LogMessage`
pub static MESSAGE_SEVERITY: EnumSpec = EnumSpec {
    name: "MessageSeverity",
    kind: EnumKind::Exact,
    members: &[("DEBUG", 20), ("INFO", 40), ("NOTICE", 60), ("WARNING", 80)],
};

/// Transaction state reported by `ReadyForCommand`
pub static TRANSACTION_STATE: EnumSpec = EnumSpec {
    name: "TransactionState",
    kind: EnumKind::Exact,
    members: &[
        ("NOT_IN_TRANSACTION", 0x49),
        ("IN_TRANSACTION", 0x54),
        ("IN_FAILED_TRANSACTION", 0x45),
    ],
};

/// Result cardinality
pub static CARDINALITY: EnumSpec = EnumSpec {
    name: "Cardinality",
    kind: EnumKind::Exact,
    members: &[
        ("NO_RESULT", 0x6e),
        ("AT_MOST_ONE", 0x6f),
        ("ONE", 0x41),
        ("MANY", 0x6d),
        ("AT_LEAST_ONE", 0x4d),
    ],
};

/// Command source language
pub static INPUT_LANGUAGE: EnumSpec = EnumSpec {
    name: "InputLanguage",
    kind: EnumKind::Exact,
    members: &[("EDGEQL", 0x45), ("SQL", 0x53)],
};

/// Data output format
pub static OUTPUT_FORMAT: EnumSpec = EnumSpec {
    name: "OutputFormat",
    kind: EnumKind::Exact,
    members: &[
        ("BINARY", 0x62),
        ("JSON", 0x6a),
        ("JSON_ELEMENTS", 0x4a),
        ("NONE", 0x6e),
    ],
};

/// Capability bit mask
///
/// `ALL` is every bit set, as servers send it for an unrestricted session.
/// A flags mask is the union of its members, so any `u64` is a valid
/// capability value; unknown bits from newer servers pass through.
pub static CAPABILITY: EnumSpec = EnumSpec {
    name: "Capability",
    kind: EnumKind::Flags,
    members: &[
        ("MODIFICATIONS", 1 << 0),
        ("SESSION_CONFIG", 1 << 1),
        ("TRANSACTION", 1 << 2),
        ("DDL", 1 << 3),
        ("PERSISTENT_CONFIG", 1 << 4),
        ("ALL", u64::MAX),
    ],
};

/// Compilation flag bit mask
pub static COMPILATION_FLAG: EnumSpec = EnumSpec {
    name: "CompilationFlag",
    kind: EnumKind::Flags,
    members: &[
        ("INJECT_OUTPUT_TYPE_IDS", 1 << 0),
        ("INJECT_OUTPUT_TYPE_NAMES", 1 << 1),
        ("INJECT_OUTPUT_OBJECT_IDS", 1 << 2),
    ],
};

/// Dump option bit mask
pub static DUMP_FLAG: EnumSpec = EnumSpec {
    name: "DumpFlag",
    kind: EnumKind::Flags,
    members: &[("DUMP_SECRETS", 1 << 0)],
};

// =============================================================================
// Shared structs
// =============================================================================

/// Key code plus opaque value
pub const KEY_VALUE: StructSchema = StructSchema {
    name: "KeyValue",
    fields: &[
        field("code", FieldType::UInt(W16), "Key code (specific to the type of the Message)."),
        field("value", FieldType::Bytes, "Value data."),
    ],
};

/// Named JSON annotation
pub const ANNOTATION: StructSchema = StructSchema {
    name: "Annotation",
    fields: &[
        field("name", FieldType::Str, "Name of the annotation"),
        field("value", FieldType::Str, "Value of the annotation (in JSON format)."),
    ],
};

/// One encoded output element
pub const DATA_ELEMENT: StructSchema = StructSchema {
    name: "DataElement",
    fields: &[field(
        "data",
        FieldType::ArrayOf(W32, &FieldType::UInt(W8)),
        "Encoded output data.",
    )],
};

/// Type referenced by a dump
pub const DUMP_TYPE_INFO: StructSchema = StructSchema {
    name: "DumpTypeInfo",
    fields: &[
        field("type_name", FieldType::Str, ""),
        field("type_class", FieldType::Str, ""),
        field("type_id", FieldType::Uuid, ""),
    ],
};

/// Schema object described by a dump
pub const DUMP_OBJECT_DESC: StructSchema = StructSchema {
    name: "DumpObjectDesc",
    fields: &[
        field("object_id", FieldType::Uuid, ""),
        field("description", FieldType::Bytes, ""),
        field("dependencies", FieldType::ArrayOf(W16, &FieldType::Uuid), ""),
    ],
};

/// Protocol extension with annotations
pub const PROTOCOL_EXTENSION: StructSchema = StructSchema {
    name: "ProtocolExtension",
    fields: &[
        field("name", FieldType::Str, "Extension name."),
        field(
            "annotations",
            FieldType::ArrayOf(W16, &FieldType::Struct(&ANNOTATION)),
            "A set of extension annotations.",
        ),
    ],
};

/// Connection parameter
pub const CONNECTION_PARAM: StructSchema = StructSchema {
    name: "ConnectionParam",
    fields: &[
        field("name", FieldType::Str, ""),
        field("value", FieldType::Str, ""),
    ],
};

const KEY_VALUES: FieldType = FieldType::ArrayOf(W16, &FieldType::Struct(&KEY_VALUE));
const ANNOTATIONS: FieldType = FieldType::ArrayOf(W16, &FieldType::Struct(&ANNOTATION));

// =============================================================================
// Server messages
// =============================================================================

static ERROR_RESPONSE: StructSchema = StructSchema {
    name: "ErrorResponse",
    fields: &[
        field("severity", FieldType::EnumOf(W8, &ERROR_SEVERITY), "Message severity."),
        field("error_code", FieldType::UInt(W32), "Message code."),
        field("message", FieldType::Str, "Error message."),
        field("attributes", KEY_VALUES, "Error attributes."),
    ],
};

static LOG_MESSAGE: StructSchema = StructSchema {
    name: "LogMessage",
    fields: &[
        field("severity", FieldType::EnumOf(W8, &MESSAGE_SEVERITY), "Message severity."),
        field("code", FieldType::UInt(W32), "Message code."),
        field("text", FieldType::Str, "Message text."),
        field("annotations", ANNOTATIONS, "Message annotations."),
    ],
};

static READY_FOR_COMMAND: StructSchema = StructSchema {
    name: "ReadyForCommand",
    fields: &[
        field("annotations", ANNOTATIONS, "A set of annotations."),
        field(
            "transaction_state",
            FieldType::EnumOf(W8, &TRANSACTION_STATE),
            "Transaction state.",
        ),
    ],
};

static RESTORE_READY: StructSchema = StructSchema {
    name: "RestoreReady",
    fields: &[
        field("annotations", ANNOTATIONS, "A set of annotations."),
        field(
            "jobs",
            FieldType::UInt(W16),
            "Number of parallel jobs for restore, currently always \"1\"",
        ),
    ],
};

static COMMAND_COMPLETE: StructSchema = StructSchema {
    name: "CommandComplete",
    fields: &[
        field("annotations", ANNOTATIONS, "A set of annotations."),
        field("capabilities", FieldType::EnumOf(W64, &CAPABILITY), "A bit mask of allowed capabilities."),
        field("status", FieldType::Str, "Command status."),
        field("state_typedesc_id", FieldType::Uuid, "State data descriptor ID."),
        field("state_data", FieldType::Bytes, "Encoded state data."),
    ],
};

static COMMAND_DATA_DESCRIPTION: StructSchema = StructSchema {
    name: "CommandDataDescription",
    fields: &[
        field("annotations", ANNOTATIONS, "A set of annotations."),
        field("capabilities", FieldType::EnumOf(W64, &CAPABILITY), "A bit mask of allowed capabilities."),
        field(
            "result_cardinality",
            FieldType::EnumOf(W8, &CARDINALITY),
            "Actual result cardinality.",
        ),
        field("input_typedesc_id", FieldType::Uuid, "Argument data descriptor ID."),
        field("input_typedesc", FieldType::Bytes, "Argument data descriptor."),
        field("output_typedesc_id", FieldType::Uuid, "Output data descriptor ID."),
        field("output_typedesc", FieldType::Bytes, "Output data descriptor."),
    ],
};

static STATE_DATA_DESCRIPTION: StructSchema = StructSchema {
    name: "StateDataDescription",
    fields: &[
        field("typedesc_id", FieldType::Uuid, "Updated state data descriptor ID."),
        field("typedesc", FieldType::Bytes, "State data descriptor."),
    ],
};

static DATA: StructSchema = StructSchema {
    name: "Data",
    fields: &[field(
        "data",
        FieldType::ArrayOf(W16, &FieldType::Struct(&DATA_ELEMENT)),
        "Encoded output data array. The array is currently always of size 1.",
    )],
};

static DUMP_HEADER: StructSchema = StructSchema {
    name: "DumpHeader",
    fields: &[
        field("attributes", KEY_VALUES, "A set of key-value pairs."),
        field("major_ver", FieldType::UInt(W16), "Major version of the server."),
        field("minor_ver", FieldType::UInt(W16), "Minor version of the server."),
        field("schema_ddl", FieldType::Str, "Schema."),
        field(
            "types",
            FieldType::ArrayOf(W32, &FieldType::Struct(&DUMP_TYPE_INFO)),
            "Type identifiers.",
        ),
        field(
            "descriptors",
            FieldType::ArrayOf(W32, &FieldType::Struct(&DUMP_OBJECT_DESC)),
            "Object descriptors.",
        ),
    ],
};

static DUMP_BLOCK: StructSchema = StructSchema {
    name: "DumpBlock",
    fields: &[field("attributes", KEY_VALUES, "A set of key-value pairs.")],
};

static SERVER_KEY_DATA: StructSchema = StructSchema {
    name: "ServerKeyData",
    fields: &[field(
        "data",
        FieldType::FixedArrayOf(32, &FieldType::UInt(W8)),
        "Key data.",
    )],
};

static PARAMETER_STATUS: StructSchema = StructSchema {
    name: "ParameterStatus",
    fields: &[
        field("name", FieldType::Bytes, "Parameter name."),
        field("value", FieldType::Bytes, "Parameter value."),
    ],
};

static SERVER_HANDSHAKE: StructSchema = StructSchema {
    name: "ServerHandshake",
    fields: &[
        field(
            "major_ver",
            FieldType::UInt(W16),
            "Maximum supported or client-requested protocol major version, whichever is greater.",
        ),
        field(
            "minor_ver",
            FieldType::UInt(W16),
            "Maximum supported or client-requested protocol minor version, whichever is greater.",
        ),
        field(
            "extensions",
            FieldType::ArrayOf(W16, &FieldType::Struct(&PROTOCOL_EXTENSION)),
            "Supported protocol extensions.",
        ),
    ],
};

static AUTHENTICATION_OK: StructSchema = StructSchema {
    name: "AuthenticationOK",
    fields: &[field(
        "auth_status",
        FieldType::UInt(W32),
        "Specifies that this message contains a successful authentication indicator.",
    )],
};

static AUTHENTICATION_REQUIRED_SASL: StructSchema = StructSchema {
    name: "AuthenticationRequiredSASLMessage",
    fields: &[
        field(
            "auth_status",
            FieldType::UInt(W32),
            "Specifies that this message contains a SASL authentication request.",
        ),
        field(
            "methods",
            FieldType::ArrayOf(W32, &FieldType::Str),
            "A list of supported SASL authentication methods.",
        ),
    ],
};

static AUTHENTICATION_SASL_CONTINUE: StructSchema = StructSchema {
    name: "AuthenticationSASLContinue",
    fields: &[
        field(
            "auth_status",
            FieldType::UInt(W32),
            "Specifies that this message contains a SASL challenge.",
        ),
        field("sasl_data", FieldType::Bytes, "Mechanism-specific SASL data."),
    ],
};

static AUTHENTICATION_SASL_FINAL: StructSchema = StructSchema {
    name: "AuthenticationSASLFinal",
    fields: &[
        field(
            "auth_status",
            FieldType::UInt(W32),
            "Specifies that SASL authentication has completed.",
        ),
        field("sasl_data", FieldType::Bytes, ""),
    ],
};

// =============================================================================
// Client messages
// =============================================================================

static CLIENT_HANDSHAKE: StructSchema = StructSchema {
    name: "ClientHandshake",
    fields: &[
        field("major_ver", FieldType::UInt(W16), "Requested protocol major version."),
        field("minor_ver", FieldType::UInt(W16), "Requested protocol minor version."),
        field(
            "params",
            FieldType::ArrayOf(W16, &FieldType::Struct(&CONNECTION_PARAM)),
            "Connection parameters.",
        ),
        field(
            "extensions",
            FieldType::ArrayOf(W16, &FieldType::Struct(&PROTOCOL_EXTENSION)),
            "Requested protocol extensions.",
        ),
    ],
};

static AUTHENTICATION_SASL_INITIAL_RESPONSE: StructSchema = StructSchema {
    name: "AuthenticationSASLInitialResponse",
    fields: &[
        field(
            "method",
            FieldType::Str,
            "Name of the SASL authentication mechanism that the client selected.",
        ),
        field("sasl_data", FieldType::Bytes, "Mechanism-specific \"Initial Response\" data."),
    ],
};

static AUTHENTICATION_SASL_RESPONSE: StructSchema = StructSchema {
    name: "AuthenticationSASLResponse",
    fields: &[field("sasl_data", FieldType::Bytes, "Mechanism-specific response data.")],
};

static PARSE: StructSchema = StructSchema {
    name: "Parse",
    fields: &[
        field("annotations", ANNOTATIONS, "A set of annotations."),
        field("allowed_capabilities", FieldType::EnumOf(W64, &CAPABILITY), "A bit mask of allowed capabilities."),
        field(
            "compilation_flags",
            FieldType::EnumOf(W64, &COMPILATION_FLAG),
            "A bit mask of query options.",
        ),
        field("implicit_limit", FieldType::UInt(W64), "Implicit LIMIT clause on returned sets."),
        field(
            "input_language",
            FieldType::EnumOf(W8, &INPUT_LANGUAGE),
            "Command source language.",
        ),
        field("output_format", FieldType::EnumOf(W8, &OUTPUT_FORMAT), "Data output format."),
        field(
            "expected_cardinality",
            FieldType::EnumOf(W8, &CARDINALITY),
            "Expected result cardinality.",
        ),
        field("command_text", FieldType::Str, "Command text."),
        field("state_typedesc_id", FieldType::Uuid, "State data descriptor ID."),
        field("state_data", FieldType::Bytes, "Encoded state data."),
    ],
};

static EXECUTE: StructSchema = StructSchema {
    name: "Execute",
    fields: &[
        field("annotations", ANNOTATIONS, "A set of annotations."),
        field("allowed_capabilities", FieldType::EnumOf(W64, &CAPABILITY), "A bit mask of allowed capabilities."),
        field(
            "compilation_flags",
            FieldType::EnumOf(W64, &COMPILATION_FLAG),
            "A bit mask of query options.",
        ),
        field("implicit_limit", FieldType::UInt(W64), "Implicit LIMIT clause on returned sets."),
        field(
            "input_language",
            FieldType::EnumOf(W8, &INPUT_LANGUAGE),
            "Command source language.",
        ),
        field("output_format", FieldType::EnumOf(W8, &OUTPUT_FORMAT), "Data output format."),
        field(
            "expected_cardinality",
            FieldType::EnumOf(W8, &CARDINALITY),
            "Expected result cardinality.",
        ),
        field("command_text", FieldType::Str, "Command text."),
        field("state_typedesc_id", FieldType::Uuid, "State data descriptor ID."),
        field("state_data", FieldType::Bytes, "Encoded state data."),
        field("input_typedesc_id", FieldType::Uuid, "Argument data descriptor ID."),
        field("output_typedesc_id", FieldType::Uuid, "Output data descriptor ID."),
        field("arguments", FieldType::Bytes, "Encoded argument data."),
    ],
};

static SYNC: StructSchema = StructSchema {
    name: "Sync",
    fields: &[],
};

static FLUSH: StructSchema = StructSchema {
    name: "Flush",
    fields: &[],
};

static TERMINATE: StructSchema = StructSchema {
    name: "Terminate",
    fields: &[],
};

static DUMP: StructSchema = StructSchema {
    name: "Dump",
    fields: &[
        field("annotations", ANNOTATIONS, "A set of annotations."),
        field("flags", FieldType::EnumOf(W64, &DUMP_FLAG), "A bit mask of dump options."),
    ],
};

static RESTORE: StructSchema = StructSchema {
    name: "Restore",
    fields: &[
        field("attributes", KEY_VALUES, "A set of key-value pairs."),
        field(
            "jobs",
            FieldType::UInt(W16),
            "Number of parallel jobs for restore (only \"1\" is supported)",
        ),
        field(
            "header_data",
            FieldType::Bytes,
            "Original DumpHeader packet data excluding mtype and message_length",
        ),
    ],
};

static RESTORE_BLOCK: StructSchema = StructSchema {
    name: "RestoreBlock",
    fields: &[field(
        "block_data",
        FieldType::Bytes,
        "Original DumpBlock packet data excluding mtype and message_length",
    )],
};

static RESTORE_EOF: StructSchema = StructSchema {
    name: "RestoreEof",
    fields: &[],
};

// =============================================================================
// Message table
// =============================================================================

/// Static description of one message kind
#[derive(Debug)]
pub struct MessageSpec {
    /// The kind described
    pub kind: MessageKind,
    /// Tag byte
    pub tag: u8,
    /// Which peer sends this message
    pub direction: Direction,
    /// Value of the leading `u32` field that tells apart kinds sharing a tag
    pub discriminator: Option<u32>,
    /// Field layout
    pub schema: &'static StructSchema,
}

const fn spec(
    kind: MessageKind,
    tag: u8,
    direction: Direction,
    discriminator: Option<u32>,
    schema: &'static StructSchema,
) -> MessageSpec {
    MessageSpec {
        kind,
        tag,
        direction,
        discriminator,
        schema,
    }
}

use Direction::{Client, Server};

/// Every message kind, in `MessageKind` declaration order
pub static MESSAGE_SPECS: [MessageSpec; MessageKind::COUNT] = [
    spec(MessageKind::ErrorResponse, b'E', Server, None, &ERROR_RESPONSE),
    spec(MessageKind::LogMessage, b'L', Server, None, &LOG_MESSAGE),
    spec(MessageKind::ReadyForCommand, b'Z', Server, None, &READY_FOR_COMMAND),
    spec(MessageKind::RestoreReady, b'+', Server, None, &RESTORE_READY),
    spec(MessageKind::CommandComplete, b'C', Server, None, &COMMAND_COMPLETE),
    spec(MessageKind::CommandDataDescription, b'T', Server, None, &COMMAND_DATA_DESCRIPTION),
    spec(MessageKind::StateDataDescription, b's', Server, None, &STATE_DATA_DESCRIPTION),
    spec(MessageKind::Data, b'D', Server, None, &DATA),
    spec(MessageKind::DumpHeader, b'@', Server, None, &DUMP_HEADER),
    spec(MessageKind::DumpBlock, b'=', Server, None, &DUMP_BLOCK),
    spec(MessageKind::ServerKeyData, b'K', Server, None, &SERVER_KEY_DATA),
    spec(MessageKind::ParameterStatus, b'S', Server, None, &PARAMETER_STATUS),
    spec(MessageKind::ServerHandshake, b'v', Server, None, &SERVER_HANDSHAKE),
    spec(MessageKind::AuthenticationOk, b'R', Server, Some(0x00), &AUTHENTICATION_OK),
    spec(
        MessageKind::AuthenticationRequiredSasl,
        b'R',
        Server,
        Some(0x0A),
        &AUTHENTICATION_REQUIRED_SASL,
    ),
    spec(
        MessageKind::AuthenticationSaslContinue,
        b'R',
        Server,
        Some(0x0B),
        &AUTHENTICATION_SASL_CONTINUE,
    ),
    spec(
        MessageKind::AuthenticationSaslFinal,
        b'R',
        Server,
        Some(0x0C),
        &AUTHENTICATION_SASL_FINAL,
    ),
    spec(MessageKind::ClientHandshake, b'V', Client, None, &CLIENT_HANDSHAKE),
    spec(
        MessageKind::AuthenticationSaslInitialResponse,
        b'p',
        Client,
        None,
        &AUTHENTICATION_SASL_INITIAL_RESPONSE,
    ),
    spec(
        MessageKind::AuthenticationSaslResponse,
        b'r',
        Client,
        None,
        &AUTHENTICATION_SASL_RESPONSE,
    ),
    spec(MessageKind::Parse, b'P', Client, None, &PARSE),
    spec(MessageKind::Execute, b'O', Client, None, &EXECUTE),
    spec(MessageKind::Sync, b'S', Client, None, &SYNC),
    spec(MessageKind::Flush, b'H', Client, None, &FLUSH),
    spec(MessageKind::Terminate, b'X', Client, None, &TERMINATE),
    spec(MessageKind::Dump, b'>', Client, None, &DUMP),
    spec(MessageKind::Restore, b'<', Client, None, &RESTORE),
    spec(MessageKind::RestoreBlock, b'=', Client, None, &RESTORE_BLOCK),
    spec(MessageKind::RestoreEof, b'.', Client, None, &RESTORE_EOF),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_kinds() {
        for (i, spec) in MESSAGE_SPECS.iter().enumerate() {
            assert_eq!(spec.kind as usize, i, "{:?} is out of order", spec.kind);
            assert_eq!(MessageKind::ALL[i], spec.kind);
        }
    }

    #[test]
    fn test_discriminated_kinds_lead_with_u32() {
        for spec in MESSAGE_SPECS.iter().filter(|s| s.discriminator.is_some()) {
            let first = spec.schema.fields.first().expect("discriminated schema has fields");
            assert!(
                matches!(first.ty, FieldType::UInt(W32)),
                "{} must lead with a uint32 discriminator",
                spec.schema.name
            );
        }
    }

    #[test]
    fn test_dump_subset_tags() {
        assert_eq!(MessageKind::Dump.tag(), b'>');
        assert_eq!(MessageKind::DumpHeader.tag(), b'@');
        assert_eq!(MessageKind::DumpBlock.tag(), b'=');
        assert_eq!(MessageKind::Restore.tag(), b'<');
        assert_eq!(MessageKind::RestoreBlock.tag(), b'=');
        assert_eq!(MessageKind::RestoreEof.tag(), b'.');
        assert_eq!(MessageKind::RestoreReady.tag(), b'+');
    }

    #[test]
    fn test_render_dump_header() {
        let rendered = DUMP_HEADER.render();
        assert!(rendered.contains("struct DumpHeader {"));
        assert!(rendered.contains("uint32          num_descriptors;"));
        assert!(rendered.contains("DumpObjectDesc  descriptors[num_descriptors];"));
    }

    #[test]
    fn test_capability_accepts_any_mask() {
        assert!(CAPABILITY.contains(0));
        assert!(CAPABILITY.contains(1 << 40));
        assert!(CAPABILITY.contains(u64::MAX));
        assert_eq!(CAPABILITY.member_name(u64::MAX), Some("ALL"));
        assert!(!COMPILATION_FLAG.contains(1 << 40));
    }
}
