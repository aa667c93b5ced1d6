//! Record codec: encodes a row's typed values into the byte string a
//! leaf cell carries, and decodes it back against a schema.
//!
//! Layout: one leading null-bitmap byte (bit `i` set means column `i`
//! is null and contributes no further bytes), then each non-null
//! column *other than the primary key* in schema order: `Integer` as 8
//! bytes little-endian `i64`, `Text` as a `u16` little-endian length
//! prefix followed by that many UTF-8 bytes. The primary key column's
//! value already lives in the cell's key bytes (it is what the B-tree
//! orders on), so it is never duplicated into the data body — decoding
//! reconstructs it from the key the caller already has. A schema wider
//! than 8 columns would need more than one bitmap byte; this scope's
//! tables don't approach that.

use super::schema::{ColumnType, TableSchema};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Null => write!(f, "NULL"),
        }
    }
}

const MAX_BITMAP_COLUMNS: usize = 8;

pub fn encode_row(schema: &TableSchema, values: &[Value]) -> Result<Vec<u8>> {
    if values.len() != schema.columns.len() {
        return Err(Error::SchemaMismatch(format!(
            "expected {} values, got {}",
            schema.columns.len(),
            values.len()
        )));
    }
    if schema.columns.len() > MAX_BITMAP_COLUMNS {
        return Err(Error::SchemaMismatch(format!(
            "table has {} columns, more than the {} a single null-bitmap byte covers",
            schema.columns.len(),
            MAX_BITMAP_COLUMNS
        )));
    }

    let pkey_idx = schema.pkey_index();
    let mut bitmap = 0u8;
    let mut body = Vec::new();
    for (i, (col, value)) in schema.columns.iter().zip(values).enumerate() {
        if i == pkey_idx {
            if !matches!(value, Value::Integer(v) if *v >= 0) {
                return Err(Error::SchemaMismatch(format!(
                    "primary key column {:?} must be a non-negative integer",
                    col.name
                )));
            }
            continue;
        }
        match value {
            Value::Null => {
                if !col.nullable {
                    return Err(Error::SchemaMismatch(format!(
                        "column {:?} is not nullable",
                        col.name
                    )));
                }
                bitmap |= 1 << i;
            }
            Value::Integer(v) => {
                if col.col_type != ColumnType::Integer {
                    return Err(Error::SchemaMismatch(format!(
                        "column {:?} expects {:?}, got an integer",
                        col.name, col.col_type
                    )));
                }
                body.extend_from_slice(&v.to_le_bytes());
            }
            Value::Text(s) => {
                if col.col_type != ColumnType::Text {
                    return Err(Error::SchemaMismatch(format!(
                        "column {:?} expects {:?}, got text",
                        col.name, col.col_type
                    )));
                }
                let bytes = s.as_bytes();
                if bytes.len() > u16::MAX as usize {
                    return Err(Error::Overflow { len: bytes.len() });
                }
                body.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                body.extend_from_slice(bytes);
            }
        }
    }

    let mut out = Vec::with_capacity(1 + body.len());
    out.push(bitmap);
    out.extend(body);
    Ok(out)
}

/// Decodes a row's non-key columns from `bytes` and splices in the
/// primary key column from `key` (the cell's key, not repeated in the
/// data body — see the module-level note above).
pub fn decode_row(schema: &TableSchema, key: u64, bytes: &[u8]) -> Result<Vec<Value>> {
    if bytes.is_empty() {
        return Err(Error::Truncated("missing null-bitmap byte".into()));
    }
    let pkey_idx = schema.pkey_index();
    let bitmap = bytes[0];
    let mut cursor = 1usize;
    let mut values = Vec::with_capacity(schema.columns.len());

    for (i, col) in schema.columns.iter().enumerate() {
        if i == pkey_idx {
            values.push(Value::Integer(key as i64));
            continue;
        }
        if bitmap & (1 << i) != 0 {
            values.push(Value::Null);
            continue;
        }
        match col.col_type {
            ColumnType::Integer => {
                let end = cursor + 8;
                let slice = bytes.get(cursor..end).ok_or_else(|| {
                    Error::Truncated(format!("integer column {:?} cut short", col.name))
                })?;
                let v = i64::from_le_bytes(slice.try_into().unwrap());
                values.push(Value::Integer(v));
                cursor = end;
            }
            ColumnType::Text => {
                let len_end = cursor + 2;
                let len_bytes = bytes.get(cursor..len_end).ok_or_else(|| {
                    Error::Truncated(format!("text column {:?} length prefix cut short", col.name))
                })?;
                let len = u16::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
                cursor = len_end;
                let data_end = cursor + len;
                let data = bytes.get(cursor..data_end).ok_or_else(|| {
                    Error::Truncated(format!("text column {:?} body cut short", col.name))
                })?;
                let s = std::str::from_utf8(data)
                    .map_err(|_| Error::Truncated(format!("column {:?} is not valid UTF-8", col.name)))?
                    .to_owned();
                values.push(Value::Text(s));
                cursor = data_end;
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::ColumnSchema;

    fn schema() -> TableSchema {
        TableSchema::new(vec![
            ColumnSchema::new("id", ColumnType::Integer).primary(),
            ColumnSchema::new("name", ColumnType::Text).nullable(),
        ])
        .unwrap()
    }

    #[test]
    fn round_trips_non_null_values() {
        let schema = schema();
        let values = vec![Value::Integer(42), Value::Text("hello".into())];
        let bytes = encode_row(&schema, &values).unwrap();
        let decoded = decode_row(&schema, 42, &bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn primary_key_is_not_duplicated_into_the_data_body() {
        let schema = schema();
        let short = encode_row(&schema, &vec![Value::Integer(1), Value::Null]).unwrap();
        let long = encode_row(&schema, &vec![Value::Integer(i64::MAX), Value::Null]).unwrap();
        assert_eq!(short.len(), long.len());
    }

    #[test]
    fn null_bitmap_round_trips() {
        let schema = schema();
        let values = vec![Value::Integer(1), Value::Null];
        let bytes = encode_row(&schema, &values).unwrap();
        assert_eq!(bytes[0], 0b0000_0010);
        let decoded = decode_row(&schema, 1, &bytes).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn rejects_null_in_non_nullable_column() {
        let schema = schema();
        let values = vec![Value::Null, Value::Text("x".into())];
        assert!(matches!(
            encode_row(&schema, &values),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn rejects_type_mismatch() {
        let schema = schema();
        let values = vec![Value::Text("not an int".into()), Value::Null];
        assert!(matches!(
            encode_row(&schema, &values),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn truncated_bytes_surface_as_truncated_error() {
        let schema = schema();
        let bytes = vec![0u8; 1];
        assert!(matches!(
            decode_row(&schema, 1, &bytes),
            Err(Error::Truncated(_))
        ));
    }

    #[test]
    fn text_over_u16_limit_overflows() {
        let schema = TableSchema::new(vec![
            ColumnSchema::new("id", ColumnType::Integer).primary(),
            ColumnSchema::new("t", ColumnType::Text),
        ])
        .unwrap();
        let huge = "a".repeat(u16::MAX as usize + 1);
        let values = vec![Value::Integer(1), Value::Text(huge)];
        assert!(matches!(
            encode_row(&schema, &values),
            Err(Error::Overflow { .. })
        ));
    }
}
