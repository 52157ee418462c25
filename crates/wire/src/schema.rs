//! Field-type grammar for wire messages
//!
//! Every message kind declares its layout once, as a static
//! [`StructSchema`]: an ordered list of named fields, each with a
//! [`FieldType`]. The grammar is closed:
//!
//! ```text
//! FieldType = UInt(w) | Int(w) | Bytes | Str | Uuid
//!           | EnumOf(w, enum)
//!           | ArrayOf(count_w, FieldType)
//!           | FixedArrayOf(n, FieldType)
//!           | Struct(schema)
//! w         = 8 | 16 | 32 | 64
//! ```
//!
//! `Bytes` and `Str` are u32-length-prefixed. `Uuid` is 16 raw bytes.
//! Nested structs are embedded inline without tag or length framing.

use std::fmt::Write as _;

/// Width of a fixed-size integer on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    /// 1 byte
    W8,
    /// 2 bytes
    W16,
    /// 4 bytes
    W32,
    /// 8 bytes
    W64,
}

impl IntWidth {
    /// Encoded size in bytes
    pub const fn bytes(self) -> usize {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 2,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }

    /// Largest unsigned value representable in this width
    pub const fn unsigned_max(self) -> u64 {
        match self {
            IntWidth::W8 => u8::MAX as u64,
            IntWidth::W16 => u16::MAX as u64,
            IntWidth::W32 => u32::MAX as u64,
            IntWidth::W64 => u64::MAX,
        }
    }

    /// Signed range representable in this width
    pub const fn signed_range(self) -> (i64, i64) {
        match self {
            IntWidth::W8 => (i8::MIN as i64, i8::MAX as i64),
            IntWidth::W16 => (i16::MIN as i64, i16::MAX as i64),
            IntWidth::W32 => (i32::MIN as i64, i32::MAX as i64),
            IntWidth::W64 => (i64::MIN, i64::MAX),
        }
    }

    /// Unsigned type name (`uint8` … `uint64`)
    pub const fn unsigned_name(self) -> &'static str {
        match self {
            IntWidth::W8 => "uint8",
            IntWidth::W16 => "uint16",
            IntWidth::W32 => "uint32",
            IntWidth::W64 => "uint64",
        }
    }

    /// Signed type name (`int8` … `int64`)
    pub const fn signed_name(self) -> &'static str {
        match self {
            IntWidth::W8 => "int8",
            IntWidth::W16 => "int16",
            IntWidth::W32 => "int32",
            IntWidth::W64 => "int64",
        }
    }
}

/// How an enumeration validates values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumKind {
    /// Value must equal one of the members
    Exact,
    /// Value may be any combination of member bits
    Flags,
}

/// A fixed enumeration of allowed integer values
#[derive(Debug)]
pub struct EnumSpec {
    /// Enumeration name
    pub name: &'static str,
    /// Validation mode
    pub kind: EnumKind,
    /// Member names and values
    pub members: &'static [(&'static str, u64)],
}

impl EnumSpec {
    /// Whether `value` is allowed by this enumeration
    pub fn contains(&self, value: u64) -> bool {
        match self.kind {
            EnumKind::Exact => self.members.iter().any(|&(_, v)| v == value),
            EnumKind::Flags => {
                let mask = self.members.iter().fold(0u64, |acc, &(_, v)| acc | v);
                value & !mask == 0
            }
        }
    }

    /// Name of the member with exactly this value
    pub fn member_name(&self, value: u64) -> Option<&'static str> {
        self.members
            .iter()
            .find(|&&(_, v)| v == value)
            .map(|&(name, _)| name)
    }

    /// Value of the member named `name`
    pub fn value_of(&self, name: &str) -> Option<u64> {
        self.members
            .iter()
            .find(|&&(n, _)| n == name)
            .map(|&(_, v)| v)
    }
}

/// Wire type of a single field
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    /// Unsigned integer
    UInt(IntWidth),
    /// Signed integer
    Int(IntWidth),
    /// u32-length-prefixed opaque bytes
    Bytes,
    /// u32-length-prefixed UTF-8 text
    Str,
    /// 16 raw bytes
    Uuid,
    /// Unsigned integer restricted to an enumeration
    EnumOf(IntWidth, &'static EnumSpec),
    /// Count of the given width followed by that many elements
    ArrayOf(IntWidth, &'static FieldType),
    /// Exactly `n` elements, no count prefix
    FixedArrayOf(usize, &'static FieldType),
    /// Nested struct embedded inline
    Struct(&'static StructSchema),
}

impl FieldType {
    /// Short name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::UInt(w) => w.unsigned_name(),
            FieldType::Int(w) => w.signed_name(),
            FieldType::Bytes => "bytes",
            FieldType::Str => "string",
            FieldType::Uuid => "uuid",
            FieldType::EnumOf(_, spec) => spec.name,
            FieldType::ArrayOf(..) => "array",
            FieldType::FixedArrayOf(..) => "fixed array",
            FieldType::Struct(schema) => schema.name,
        }
    }

    fn render_field(&self, name: &str, out: &mut String, indent: usize) {
        let pad = "    ".repeat(indent);
        match self {
            FieldType::ArrayOf(width, element) => {
                let _ = writeln!(
                    out,
                    "{}{:<15} num_{};",
                    pad,
                    width.unsigned_name(),
                    name
                );
                element.render_field(&format!("{}[num_{}]", name, name), out, indent);
            }
            FieldType::FixedArrayOf(n, element) => {
                element.render_field(&format!("{}[{}]", name, n), out, indent);
            }
            FieldType::EnumOf(width, spec) => {
                let ty = format!("{}<{}>", width.unsigned_name(), spec.name);
                let _ = writeln!(out, "{}{:<15} {};", pad, ty, name);
            }
            other => {
                let _ = writeln!(out, "{}{:<15} {};", pad, other.type_name(), name);
            }
        }
    }
}

/// A named field within a struct schema
#[derive(Debug)]
pub struct Field {
    /// Field name
    pub name: &'static str,
    /// Wire type
    pub ty: FieldType,
    /// Human-readable description
    pub doc: &'static str,
}

/// Ordered field layout of a struct or message body
#[derive(Debug)]
pub struct StructSchema {
    /// Struct name
    pub name: &'static str,
    /// Fields in wire order
    pub fields: &'static [Field],
}

impl StructSchema {
    /// Position of the field named `name`
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Render the layout as a C-like struct declaration
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "struct {} {{", self.name);
        for field in self.fields {
            if !field.doc.is_empty() {
                let _ = writeln!(out, "    // {}", field.doc);
            }
            field.ty.render_field(field.name, &mut out, 1);
        }
        out.push_str("};");
        out
    }
}

/// Location of a field inside a (possibly nested) value, rendered only
/// when an error needs it.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FieldPath<'a> {
    Root(&'a str),
    Field(&'a FieldPath<'a>, &'a str),
    Index(&'a FieldPath<'a>, usize),
}

impl<'a> FieldPath<'a> {
    pub(crate) fn field(&'a self, name: &'a str) -> FieldPath<'a> {
        FieldPath::Field(self, name)
    }

    pub(crate) fn index(&'a self, index: usize) -> FieldPath<'a> {
        FieldPath::Index(self, index)
    }

    pub(crate) fn render(&self) -> String {
        match self {
            FieldPath::Root(name) => (*name).to_string(),
            FieldPath::Field(parent, name) => format!("{}.{}", parent.render(), name),
            FieldPath::Index(parent, index) => format!("{}[{}]", parent.render(), index),
        }
    }
}
