//! Dynamic field values
//!
//! A [`Value`] tree mirrors a [`FieldType`](crate::schema::FieldType) tree.
//! Integers are held widened (`u64`/`i64`) so that range checks against the
//! declared width happen in one place, at validation time.

use crate::error::{WireError, WireResult};
use uuid::Uuid;

/// A single decoded or to-be-encoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Unsigned integer of any width
    UInt(u64),
    /// Signed integer of any width
    Int(i64),
    /// Opaque bytes
    Bytes(Vec<u8>),
    /// UTF-8 text
    Str(String),
    /// UUID
    Uuid(Uuid),
    /// Enumeration member (or flag combination)
    Enum(u64),
    /// Homogeneous array
    Array(Vec<Value>),
    /// Nested struct, fields in schema order
    Struct(Vec<Value>),
}

impl Value {
    /// Variant name used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::UInt(_) => "unsigned integer",
            Value::Int(_) => "signed integer",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
            Value::Uuid(_) => "uuid",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }

    /// Unsigned or enum value
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) | Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    /// Signed value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Byte string
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    /// UUID
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Value::Uuid(v) => Some(*v),
            _ => None,
        }
    }

    /// Array elements
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Struct fields
    pub fn as_struct(&self) -> Option<&[Value]> {
        match self {
            Value::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Unsigned or enum value, or a `TypeMismatch` naming `field`
    pub fn expect_u64(&self, field: &str) -> WireResult<u64> {
        self.as_u64().ok_or_else(|| self.mismatch(field, "unsigned integer"))
    }

    /// Byte string, or a `TypeMismatch` naming `field`
    pub fn expect_bytes(&self, field: &str) -> WireResult<&[u8]> {
        self.as_bytes().ok_or_else(|| self.mismatch(field, "bytes"))
    }

    /// Text, or a `TypeMismatch` naming `field`
    pub fn expect_str(&self, field: &str) -> WireResult<&str> {
        self.as_str().ok_or_else(|| self.mismatch(field, "string"))
    }

    /// UUID, or a `TypeMismatch` naming `field`
    pub fn expect_uuid(&self, field: &str) -> WireResult<Uuid> {
        self.as_uuid().ok_or_else(|| self.mismatch(field, "uuid"))
    }

    /// Array elements, or a `TypeMismatch` naming `field`
    pub fn expect_array(&self, field: &str) -> WireResult<&[Value]> {
        self.as_array().ok_or_else(|| self.mismatch(field, "array"))
    }

    /// Struct fields, or a `TypeMismatch` naming `field`
    pub fn expect_struct(&self, field: &str) -> WireResult<&[Value]> {
        self.as_struct().ok_or_else(|| self.mismatch(field, "struct"))
    }

    fn mismatch(&self, field: &str, expected: &'static str) -> WireError {
        WireError::TypeMismatch {
            field: field.to_string(),
            expected,
            found: self.kind_name(),
        }
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt(u64::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt(u64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(u64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}
