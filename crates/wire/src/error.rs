//! Wire codec error types

use dbdump_core::CursorError;
use thiserror::Error;

/// Result type for wire codec operations
pub type WireResult<T> = Result<T, WireError>;

/// Errors raised while validating, encoding or decoding wire messages
#[derive(Debug, Error)]
pub enum WireError {
    /// Integer or length does not fit the declared width
    #[error("Value {value} out of range for {type_name} field '{field}'")]
    OutOfRange {
        /// Path of the offending field
        field: String,
        /// Declared type name
        type_name: &'static str,
        /// Rendered value
        value: String,
    },

    /// Value variant does not match the declared field type
    #[error("Type mismatch for field '{field}': expected {expected}, got {found}")]
    TypeMismatch {
        /// Path of the offending field
        field: String,
        /// Declared type name
        expected: &'static str,
        /// Variant name of the supplied value
        found: &'static str,
    },

    /// String field holds bytes that are not UTF-8
    #[error("Field '{field}' is not valid UTF-8")]
    InvalidUtf8 {
        /// Path of the offending field
        field: String,
    },

    /// Enum-valued field holds a value outside its enumeration
    #[error("Value {value:#x} is not a member of {enum_name} (field '{field}')")]
    InvalidEnumValue {
        /// Path of the offending field
        field: String,
        /// Enumeration name
        enum_name: &'static str,
        /// Offending value
        value: u64,
    },

    /// Fixed-size array has the wrong number of elements
    #[error("Field '{field}' must hold exactly {expected} elements, got {actual}")]
    ArrayLength {
        /// Path of the offending field
        field: String,
        /// Declared element count
        expected: usize,
        /// Supplied element count
        actual: usize,
    },

    /// Struct value has the wrong number of fields
    #[error("{schema} expects {expected} fields, got {actual} (field '{field}')")]
    FieldCount {
        /// Path of the offending struct
        field: String,
        /// Schema name
        schema: &'static str,
        /// Declared field count
        expected: usize,
        /// Supplied field count
        actual: usize,
    },

    /// A named field was not supplied when building a message
    #[error("Cannot construct {kind}: the '{field}' field is missing")]
    MissingField {
        /// Message kind name
        kind: &'static str,
        /// Missing field name
        field: String,
    },

    /// A name that the schema does not declare was supplied
    #[error("Cannot construct {kind}: unknown field '{field}'")]
    UnknownField {
        /// Message kind name
        kind: &'static str,
        /// Unknown field name
        field: String,
    },

    /// Discriminated message carries the wrong discriminator value
    #[error("{kind} requires discriminator {expected:#x}, got {actual:#x}")]
    DiscriminatorMismatch {
        /// Message kind name
        kind: &'static str,
        /// Discriminator declared by the catalog
        expected: u32,
        /// Discriminator supplied
        actual: u64,
    },

    /// Decoding a field ran out of bytes or hit an invalid length prefix
    #[error("Failed to decode field '{field}': {source}")]
    Cursor {
        /// Path of the field being decoded
        field: String,
        /// Underlying cursor error
        #[source]
        source: CursorError,
    },

    /// No message kind is registered for a tag
    #[error("Unspecced message type {tag:?} ({direction})")]
    UnknownTag {
        /// Tag byte, rendered as a char
        tag: char,
        /// Direction of the registry
        direction: &'static str,
    },

    /// More than one message kind claims the same tag
    #[error("Multiple specs for message type {tag:?}: {kinds}")]
    AmbiguousTag {
        /// Tag byte, rendered as a char
        tag: char,
        /// Names of the conflicting kinds
        kinds: String,
    },

    /// Bytes remain after decoding every declared field
    #[error("Buffer is not empty after parsing {kind} message: {remaining} bytes left")]
    TrailingBytes {
        /// Message kind name
        kind: &'static str,
        /// Number of unconsumed bytes
        remaining: usize,
    },

    /// Frame length field is inconsistent with the frame
    #[error("Invalid frame length {length} for message type {tag:?}: {reason}")]
    FrameLength {
        /// Tag byte, rendered as a char
        tag: char,
        /// Declared total length
        length: u64,
        /// Description of the problem
        reason: &'static str,
    },

    /// A typed view was requested for a message of another kind
    #[error("Unexpected message: expected {expected}, got {found}")]
    UnexpectedMessage {
        /// Expected kind name
        expected: &'static str,
        /// Actual kind name
        found: &'static str,
    },

    /// Low-level read or write failure outside any field
    #[error("Frame I/O error: {0}")]
    Io(#[from] CursorError),
}

impl WireError {
    /// Wrap a cursor error raised while decoding `field`.
    pub fn cursor(field: impl Into<String>, source: CursorError) -> Self {
        WireError::Cursor {
            field: field.into(),
            source,
        }
    }

    /// Path of the offending field, when the error concerns one.
    pub fn field(&self) -> Option<&str> {
        match self {
            WireError::OutOfRange { field, .. }
            | WireError::TypeMismatch { field, .. }
            | WireError::InvalidUtf8 { field }
            | WireError::InvalidEnumValue { field, .. }
            | WireError::ArrayLength { field, .. }
            | WireError::FieldCount { field, .. }
            | WireError::MissingField { field, .. }
            | WireError::UnknownField { field, .. }
            | WireError::Cursor { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_field() {
        let err = WireError::OutOfRange {
            field: "ServerHandshake.major_ver".to_string(),
            type_name: "uint16",
            value: "70000".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("major_ver"));
        assert!(msg.contains("70000"));
        assert!(msg.contains("uint16"));
        assert_eq!(err.field(), Some("ServerHandshake.major_ver"));
    }

    #[test]
    fn test_unknown_tag_display() {
        let err = WireError::UnknownTag {
            tag: '!',
            direction: "server",
        };
        assert!(err.to_string().contains("'!'"));
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_cursor_constructor() {
        let err = WireError::cursor(
            "Restore.header_data",
            CursorError::UnexpectedEof {
                position: 4,
                expected: 10,
                actual: 2,
            },
        );
        assert!(matches!(err, WireError::Cursor { .. }));
        assert_eq!(err.field(), Some("Restore.header_data"));
    }
}
