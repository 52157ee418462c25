//! Schema-driven validation, encoding and decoding of values
//!
//! Encoding is two-phase: the whole value tree is validated against its
//! schema first, then written. A value that fails validation therefore never
//! leaves a half-written field behind in the output buffer.

use crate::error::{WireError, WireResult};
use crate::schema::{FieldPath, FieldType, IntWidth, StructSchema};
use crate::value::Value;
use dbdump_core::{ByteCursor, CursorError, CursorResult};
use std::io::{Read, Write};

/// Initial capacity cap for decoded arrays; counts come from the wire.
const ARRAY_PREALLOC_LIMIT: usize = 1024;

/// Check `values` against `schema` without writing anything.
pub fn validate_struct(schema: &StructSchema, values: &[Value], name: &str) -> WireResult<()> {
    validate_fields(schema, values, &FieldPath::Root(name))
}

/// Validate then write `values` as the fields of `schema`.
pub fn encode_struct<W: Write>(
    schema: &StructSchema,
    values: &[Value],
    name: &str,
    cursor: &mut ByteCursor<W>,
) -> WireResult<()> {
    validate_struct(schema, values, name)?;
    write_fields(schema, values, cursor, &FieldPath::Root(name))
}

/// Decode the fields of `schema` from `cursor`.
pub fn decode_struct<R: Read>(
    schema: &StructSchema,
    name: &str,
    cursor: &mut ByteCursor<R>,
) -> WireResult<Vec<Value>> {
    read_fields(schema, cursor, &FieldPath::Root(name))
}

fn validate_fields(schema: &StructSchema, values: &[Value], path: &FieldPath<'_>) -> WireResult<()> {
    if values.len() != schema.fields.len() {
        return Err(WireError::FieldCount {
            field: path.render(),
            schema: schema.name,
            expected: schema.fields.len(),
            actual: values.len(),
        });
    }
    for (field, value) in schema.fields.iter().zip(values) {
        validate_value(&field.ty, value, &path.field(field.name))?;
    }
    Ok(())
}

fn validate_value(ty: &FieldType, value: &Value, path: &FieldPath<'_>) -> WireResult<()> {
    match (ty, value) {
        (FieldType::UInt(width), Value::UInt(v)) => {
            if *v > width.unsigned_max() {
                return Err(out_of_range(path, ty, v));
            }
        }
        (FieldType::Int(width), Value::Int(v)) => {
            let (min, max) = width.signed_range();
            if *v < min || *v > max {
                return Err(out_of_range(path, ty, v));
            }
        }
        (FieldType::Bytes, Value::Bytes(bytes)) => check_prefix_len(path, ty, bytes.len())?,
        (FieldType::Str, Value::Str(text)) => check_prefix_len(path, ty, text.len())?,
        (FieldType::Uuid, Value::Uuid(_)) => {}
        (FieldType::EnumOf(width, spec), Value::Enum(v)) => {
            if *v > width.unsigned_max() {
                return Err(out_of_range(path, ty, v));
            }
            if !spec.contains(*v) {
                return Err(WireError::InvalidEnumValue {
                    field: path.render(),
                    enum_name: spec.name,
                    value: *v,
                });
            }
        }
        (FieldType::ArrayOf(width, element), Value::Array(items)) => {
            if items.len() as u64 > width.unsigned_max() {
                return Err(out_of_range(path, ty, &items.len()));
            }
            for (i, item) in items.iter().enumerate() {
                validate_value(element, item, &path.index(i))?;
            }
        }
        (FieldType::FixedArrayOf(n, element), Value::Array(items)) => {
            if items.len() != *n {
                return Err(WireError::ArrayLength {
                    field: path.render(),
                    expected: *n,
                    actual: items.len(),
                });
            }
            for (i, item) in items.iter().enumerate() {
                validate_value(element, item, &path.index(i))?;
            }
        }
        (FieldType::Struct(schema), Value::Struct(fields)) => validate_fields(schema, fields, path)?,
        (ty, value) => {
            return Err(WireError::TypeMismatch {
                field: path.render(),
                expected: ty.type_name(),
                found: value.kind_name(),
            })
        }
    }
    Ok(())
}

fn out_of_range(path: &FieldPath<'_>, ty: &FieldType, value: &dyn std::fmt::Display) -> WireError {
    WireError::OutOfRange {
        field: path.render(),
        type_name: ty.type_name(),
        value: value.to_string(),
    }
}

fn check_prefix_len(path: &FieldPath<'_>, ty: &FieldType, len: usize) -> WireResult<()> {
    if len as u64 > u64::from(u32::MAX) {
        return Err(out_of_range(path, ty, &len));
    }
    Ok(())
}

// Writers assume the value tree has already been validated; a mismatch that
// slips through is reported, never skipped.

fn write_fields<W: Write>(
    schema: &StructSchema,
    values: &[Value],
    cursor: &mut ByteCursor<W>,
    path: &FieldPath<'_>,
) -> WireResult<()> {
    for (field, value) in schema.fields.iter().zip(values) {
        write_value(&field.ty, value, cursor, &path.field(field.name))?;
    }
    Ok(())
}

fn write_value<W: Write>(
    ty: &FieldType,
    value: &Value,
    cursor: &mut ByteCursor<W>,
    path: &FieldPath<'_>,
) -> WireResult<()> {
    match (ty, value) {
        (FieldType::UInt(width), Value::UInt(v)) | (FieldType::EnumOf(width, _), Value::Enum(v)) => {
            write_uint(cursor, *width, *v)?
        }
        (FieldType::Int(width), Value::Int(v)) => write_int(cursor, *width, *v)?,
        (FieldType::Bytes, Value::Bytes(bytes)) => cursor.write_length_prefixed_bytes(bytes)?,
        (FieldType::Str, Value::Str(text)) => cursor.write_length_prefixed_bytes(text.as_bytes())?,
        (FieldType::Uuid, Value::Uuid(id)) => cursor.write_uuid(id)?,
        (FieldType::ArrayOf(width, element), Value::Array(items)) => {
            write_uint(cursor, *width, items.len() as u64)?;
            for (i, item) in items.iter().enumerate() {
                write_value(element, item, cursor, &path.index(i))?;
            }
        }
        (FieldType::FixedArrayOf(_, element), Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                write_value(element, item, cursor, &path.index(i))?;
            }
        }
        (FieldType::Struct(schema), Value::Struct(fields)) => {
            write_fields(schema, fields, cursor, path)?
        }
        (ty, value) => {
            return Err(WireError::TypeMismatch {
                field: path.render(),
                expected: ty.type_name(),
                found: value.kind_name(),
            })
        }
    }
    Ok(())
}

fn write_uint<W: Write>(cursor: &mut ByteCursor<W>, width: IntWidth, v: u64) -> CursorResult<()> {
    match width {
        IntWidth::W8 => cursor.write_u8(v as u8),
        IntWidth::W16 => cursor.write_u16(v as u16),
        IntWidth::W32 => cursor.write_u32(v as u32),
        IntWidth::W64 => cursor.write_u64(v),
    }
}

fn write_int<W: Write>(cursor: &mut ByteCursor<W>, width: IntWidth, v: i64) -> CursorResult<()> {
    match width {
        IntWidth::W8 => cursor.write_i8(v as i8),
        IntWidth::W16 => cursor.write_i16(v as i16),
        IntWidth::W32 => cursor.write_i32(v as i32),
        IntWidth::W64 => cursor.write_i64(v),
    }
}

fn read_fields<R: Read>(
    schema: &StructSchema,
    cursor: &mut ByteCursor<R>,
    path: &FieldPath<'_>,
) -> WireResult<Vec<Value>> {
    let mut values = Vec::with_capacity(schema.fields.len());
    for field in schema.fields {
        values.push(read_value(&field.ty, cursor, &path.field(field.name))?);
    }
    Ok(values)
}

fn read_value<R: Read>(
    ty: &FieldType,
    cursor: &mut ByteCursor<R>,
    path: &FieldPath<'_>,
) -> WireResult<Value> {
    let at = |e: CursorError| WireError::cursor(path.render(), e);

    let value = match ty {
        FieldType::UInt(width) => Value::UInt(read_uint(cursor, *width).map_err(at)?),
        FieldType::Int(width) => Value::Int(read_int(cursor, *width).map_err(at)?),
        FieldType::Bytes => Value::Bytes(cursor.read_length_prefixed_bytes().map_err(at)?),
        FieldType::Str => {
            let bytes = cursor.read_length_prefixed_bytes().map_err(at)?;
            let text = String::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8 {
                field: path.render(),
            })?;
            Value::Str(text)
        }
        FieldType::Uuid => Value::Uuid(cursor.read_uuid().map_err(at)?),
        FieldType::EnumOf(width, spec) => {
            let v = read_uint(cursor, *width).map_err(at)?;
            if !spec.contains(v) {
                return Err(WireError::InvalidEnumValue {
                    field: path.render(),
                    enum_name: spec.name,
                    value: v,
                });
            }
            Value::Enum(v)
        }
        FieldType::ArrayOf(width, element) => {
            let count = read_uint(cursor, *width).map_err(at)? as usize;
            read_elements(element, count, cursor, path)?
        }
        FieldType::FixedArrayOf(n, element) => read_elements(element, *n, cursor, path)?,
        FieldType::Struct(schema) => Value::Struct(read_fields(schema, cursor, path)?),
    };
    Ok(value)
}

fn read_elements<R: Read>(
    element: &FieldType,
    count: usize,
    cursor: &mut ByteCursor<R>,
    path: &FieldPath<'_>,
) -> WireResult<Value> {
    let mut items = Vec::with_capacity(count.min(ARRAY_PREALLOC_LIMIT));
    for i in 0..count {
        items.push(read_value(element, cursor, &path.index(i))?);
    }
    Ok(Value::Array(items))
}

fn read_uint<R: Read>(cursor: &mut ByteCursor<R>, width: IntWidth) -> CursorResult<u64> {
    Ok(match width {
        IntWidth::W8 => u64::from(cursor.read_u8()?),
        IntWidth::W16 => u64::from(cursor.read_u16()?),
        IntWidth::W32 => u64::from(cursor.read_u32()?),
        IntWidth::W64 => cursor.read_u64()?,
    })
}

fn read_int<R: Read>(cursor: &mut ByteCursor<R>, width: IntWidth) -> CursorResult<i64> {
    Ok(match width {
        IntWidth::W8 => i64::from(cursor.read_i8()?),
        IntWidth::W16 => i64::from(cursor.read_i16()?),
        IntWidth::W32 => i64::from(cursor.read_i32()?),
        IntWidth::W64 => cursor.read_i64()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumKind, EnumSpec, Field};
    use uuid::Uuid;

    static LEVEL: EnumSpec = EnumSpec {
        name: "Level",
        kind: EnumKind::Exact,
        members: &[("LOW", 1), ("HIGH", 2)],
    };

    const ENTRY: StructSchema = StructSchema {
        name: "Entry",
        fields: &[
            Field {
                name: "id",
                ty: FieldType::Uuid,
                doc: "",
            },
            Field {
                name: "label",
                ty: FieldType::Str,
                doc: "",
            },
        ],
    };

    static RECORD: StructSchema = StructSchema {
        name: "Record",
        fields: &[
            Field {
                name: "small",
                ty: FieldType::UInt(IntWidth::W8),
                doc: "",
            },
            Field {
                name: "delta",
                ty: FieldType::Int(IntWidth::W16),
                doc: "",
            },
            Field {
                name: "level",
                ty: FieldType::EnumOf(IntWidth::W8, &LEVEL),
                doc: "",
            },
            Field {
                name: "entries",
                ty: FieldType::ArrayOf(IntWidth::W16, &FieldType::Struct(&ENTRY)),
                doc: "",
            },
            Field {
                name: "key",
                ty: FieldType::FixedArrayOf(4, &FieldType::UInt(IntWidth::W8)),
                doc: "",
            },
            Field {
                name: "payload",
                ty: FieldType::Bytes,
                doc: "",
            },
        ],
    };

    fn sample() -> Vec<Value> {
        vec![
            Value::UInt(200),
            Value::Int(-5),
            Value::Enum(2),
            Value::Array(vec![Value::Struct(vec![
                Value::Uuid(Uuid::from_u128(7)),
                Value::from("seven"),
            ])]),
            Value::Array(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3), Value::UInt(4)]),
            Value::from(b"data".to_vec()),
        ]
    }

    fn encode(values: &[Value]) -> WireResult<Vec<u8>> {
        let mut cursor = ByteCursor::new(Vec::new());
        encode_struct(&RECORD, values, "Record", &mut cursor)?;
        Ok(cursor.into_inner())
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&sample()).unwrap();
        let expected_len = 1 + 2 + 1 + (2 + 16 + 4 + 5) + 4 + (4 + 4);
        assert_eq!(bytes.len(), expected_len);
        assert_eq!(bytes[0], 200);
        assert_eq!(&bytes[1..3], &[0xFF, 0xFB]);
        assert_eq!(bytes[3], 2);
        assert_eq!(&bytes[4..6], &[0, 1]);
    }

    #[test]
    fn test_roundtrip() {
        let values = sample();
        let bytes = encode(&values).unwrap();
        let mut cursor = ByteCursor::new(&bytes[..]);
        let decoded = decode_struct(&RECORD, "Record", &mut cursor).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(cursor.tell() as usize, bytes.len());
    }

    #[test]
    fn test_out_of_range_rejected_before_writing() {
        let mut values = sample();
        values[0] = Value::UInt(256);
        let mut cursor = ByteCursor::new(Vec::new());
        let err = encode_struct(&RECORD, &values, "Record", &mut cursor).unwrap_err();
        assert!(matches!(err, WireError::OutOfRange { .. }));
        assert_eq!(err.field(), Some("Record.small"));
        assert!(cursor.get_ref().is_empty());
    }

    #[test]
    fn test_signed_range() {
        let mut values = sample();
        values[1] = Value::Int(40_000);
        assert!(matches!(encode(&values), Err(WireError::OutOfRange { .. })));
    }

    #[test]
    fn test_enum_membership_on_encode() {
        let mut values = sample();
        values[2] = Value::Enum(3);
        let err = encode(&values).unwrap_err();
        assert!(matches!(
            err,
            WireError::InvalidEnumValue {
                enum_name: "Level",
                value: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_enum_membership_on_decode() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[3] = 9;
        let mut cursor = ByteCursor::new(&bytes[..]);
        let err = decode_struct(&RECORD, "Record", &mut cursor).unwrap_err();
        assert!(matches!(err, WireError::InvalidEnumValue { value: 9, .. }));
    }

    #[test]
    fn test_nested_error_path() {
        let mut values = sample();
        values[3] = Value::Array(vec![Value::Struct(vec![
            Value::Uuid(Uuid::nil()),
            Value::UInt(1),
        ])]);
        let err = encode(&values).unwrap_err();
        assert_eq!(err.field(), Some("Record.entries[0].label"));
        assert!(matches!(err, WireError::TypeMismatch { .. }));
    }

    #[test]
    fn test_fixed_array_length() {
        let mut values = sample();
        values[4] = Value::Array(vec![Value::UInt(1)]);
        assert!(matches!(
            encode(&values),
            Err(WireError::ArrayLength {
                expected: 4,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_field_count() {
        let values = sample()[..3].to_vec();
        assert!(matches!(
            encode(&values),
            Err(WireError::FieldCount {
                expected: 6,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_utf8_on_decode() {
        let mut bytes = encode(&sample()).unwrap();
        // First byte of "seven": scalars(4) + count(2) + uuid(16) + len(4)
        let label_start = 4 + 2 + 16 + 4;
        bytes[label_start] = 0xFF;
        let mut cursor = ByteCursor::new(&bytes[..]);
        let err = decode_struct(&RECORD, "Record", &mut cursor).unwrap_err();
        assert!(matches!(err, WireError::InvalidUtf8 { .. }));
        assert_eq!(err.field(), Some("Record.entries[0].label"));
    }

    #[test]
    fn test_truncated_decode_names_field() {
        let bytes = encode(&sample()).unwrap();
        let mut cursor = ByteCursor::new(&bytes[..bytes.len() - 1]);
        let err = decode_struct(&RECORD, "Record", &mut cursor).unwrap_err();
        assert!(matches!(err, WireError::Cursor { .. }));
        assert_eq!(err.field(), Some("Record.payload"));
    }

    #[test]
    fn test_unvalidated_mismatch_is_reported_by_writer() {
        let mut values = sample();
        values[3] = Value::Array(vec![Value::Struct(vec![
            Value::from("not a uuid"),
            Value::from("seven"),
        ])]);
        let mut cursor = ByteCursor::new(Vec::new());
        let err = write_fields(&RECORD, &values, &mut cursor, &FieldPath::Root("Record")).unwrap_err();
        assert!(matches!(
            err,
            WireError::TypeMismatch {
                expected: "uuid",
                found: "string",
                ..
            }
        ));
        assert_eq!(err.field(), Some("Record.entries[0].id"));
    }
}
