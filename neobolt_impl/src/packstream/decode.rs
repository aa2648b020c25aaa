use super::marker;
use super::registry::Registry;
use super::value::{Dict, Structure, Value};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

/// Failures the codec can raise while decoding, per spec.md §4.1.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PackStreamError {
    #[error("buffer is empty")]
    EmptyBuffer,
    #[error("unknown marker byte 0x{0:02X}")]
    UnknownMarker(u8),
    #[error("declared length {declared} exceeds {remaining} remaining bytes")]
    Truncated { declared: usize, remaining: usize },
    #[error("dictionary key is not a string")]
    NonStringKey,
    #[error("no factory registered for structure tag 0x{0:02X}")]
    UnregisteredTag(u8),
    #[error("structure tag 0x{tag:02X} expects {expected:?} fields, got {actual}")]
    FieldCountMismatch {
        tag: u8,
        expected: Vec<usize>,
        actual: usize,
    },
}

/// Decodes exactly one [`Value`] from the front of `bytes`, returning the value and the number
/// of bytes consumed. Surplus bytes are left untouched, per spec.md §4.1.
pub fn decode(bytes: &[u8], registry: &Registry) -> Result<(Value, usize), PackStreamError> {
    if bytes.is_empty() {
        return Err(PackStreamError::EmptyBuffer);
    }
    let mut cursor = Cursor::new(bytes);
    let value = decode_one(&mut cursor, registry)?;
    Ok((value, cursor.position() as usize))
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    cursor.get_ref().len() - cursor.position() as usize
}

fn need(cursor: &Cursor<&[u8]>, n: usize) -> Result<(), PackStreamError> {
    let rem = remaining(cursor);
    if rem < n {
        Err(PackStreamError::Truncated {
            declared: n,
            remaining: rem,
        })
    } else {
        Ok(())
    }
}

fn decode_one(cursor: &mut Cursor<&[u8]>, registry: &Registry) -> Result<Value, PackStreamError> {
    need(cursor, 1)?;
    let marker = cursor.read_u8().map_err(|_| PackStreamError::EmptyBuffer)?;
    match marker {
        marker::NULL => Ok(Value::Null),
        marker::FALSE => Ok(Value::Bool(false)),
        marker::TRUE => Ok(Value::Bool(true)),
        marker::FLOAT_64 => {
            need(cursor, 8)?;
            Ok(Value::Float(cursor.read_f64::<BigEndian>().unwrap()))
        }
        marker::INT_8 => {
            need(cursor, 1)?;
            Ok(Value::Int(i64::from(cursor.read_i8().unwrap())))
        }
        marker::INT_16 => {
            need(cursor, 2)?;
            Ok(Value::Int(i64::from(cursor.read_i16::<BigEndian>().unwrap())))
        }
        marker::INT_32 => {
            need(cursor, 4)?;
            Ok(Value::Int(i64::from(cursor.read_i32::<BigEndian>().unwrap())))
        }
        marker::INT_64 => {
            need(cursor, 8)?;
            Ok(Value::Int(cursor.read_i64::<BigEndian>().unwrap()))
        }
        m if (0x00..=0x7F).contains(&m) => Ok(Value::Int(i64::from(m))),
        m if (0xF0..=0xFF).contains(&m) => Ok(Value::Int(i64::from(m) - 256)),
        marker::BYTES_8 => {
            let len = read_len_u8(cursor)?;
            read_bytes(cursor, len)
        }
        marker::BYTES_16 => {
            let len = read_len_u16(cursor)?;
            read_bytes(cursor, len)
        }
        marker::BYTES_32 => {
            let len = read_len_u32(cursor)?;
            read_bytes(cursor, len)
        }
        m if (marker::TINY_STRING..=0x8F).contains(&m) => {
            read_string(cursor, (m & 0x0F) as usize)
        }
        marker::STRING_8 => {
            let len = read_len_u8(cursor)?;
            read_string(cursor, len)
        }
        marker::STRING_16 => {
            let len = read_len_u16(cursor)?;
            read_string(cursor, len)
        }
        marker::STRING_32 => {
            let len = read_len_u32(cursor)?;
            read_string(cursor, len)
        }
        m if (marker::TINY_LIST..=0x9F).contains(&m) => {
            read_list(cursor, registry, (m & 0x0F) as usize)
        }
        marker::LIST_8 => {
            let len = read_len_u8(cursor)?;
            read_list(cursor, registry, len)
        }
        marker::LIST_16 => {
            let len = read_len_u16(cursor)?;
            read_list(cursor, registry, len)
        }
        marker::LIST_32 => {
            let len = read_len_u32(cursor)?;
            read_list(cursor, registry, len)
        }
        m if (marker::TINY_DICT..=0xAF).contains(&m) => {
            read_dict(cursor, registry, (m & 0x0F) as usize)
        }
        marker::DICT_8 => {
            let len = read_len_u8(cursor)?;
            read_dict(cursor, registry, len)
        }
        marker::DICT_16 => {
            let len = read_len_u16(cursor)?;
            read_dict(cursor, registry, len)
        }
        marker::DICT_32 => {
            let len = read_len_u32(cursor)?;
            read_dict(cursor, registry, len)
        }
        m if (marker::TINY_STRUCT..=0xBF).contains(&m) => {
            read_structure(cursor, registry, (m & 0x0F) as usize)
        }
        other => Err(PackStreamError::UnknownMarker(other)),
    }
}

fn read_len_u8(cursor: &mut Cursor<&[u8]>) -> Result<usize, PackStreamError> {
    need(cursor, 1)?;
    Ok(cursor.read_u8().unwrap() as usize)
}
fn read_len_u16(cursor: &mut Cursor<&[u8]>) -> Result<usize, PackStreamError> {
    need(cursor, 2)?;
    Ok(cursor.read_u16::<BigEndian>().unwrap() as usize)
}
fn read_len_u32(cursor: &mut Cursor<&[u8]>) -> Result<usize, PackStreamError> {
    need(cursor, 4)?;
    Ok(cursor.read_u32::<BigEndian>().unwrap() as usize)
}

fn read_bytes(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Value, PackStreamError> {
    need(cursor, len)?;
    let start = cursor.position() as usize;
    let slice = &cursor.get_ref()[start..start + len];
    cursor.set_position((start + len) as u64);
    Ok(Value::Bytes(slice.to_vec()))
}

fn read_string(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Value, PackStreamError> {
    need(cursor, len)?;
    let start = cursor.position() as usize;
    let slice = &cursor.get_ref()[start..start + len];
    cursor.set_position((start + len) as u64);
    let s = std::str::from_utf8(slice)
        .map_err(|_| PackStreamError::Truncated {
            declared: len,
            remaining: remaining(cursor),
        })?
        .to_owned();
    Ok(Value::String(s))
}

fn read_list(
    cursor: &mut Cursor<&[u8]>,
    registry: &Registry,
    len: usize,
) -> Result<Value, PackStreamError> {
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        items.push(decode_one(cursor, registry)?);
    }
    Ok(Value::List(items))
}

fn read_dict(
    cursor: &mut Cursor<&[u8]>,
    registry: &Registry,
    len: usize,
) -> Result<Value, PackStreamError> {
    let mut dict = Dict::new();
    for _ in 0..len {
        let key = match decode_one(cursor, registry)? {
            Value::String(s) => s,
            _ => return Err(PackStreamError::NonStringKey),
        };
        let value = decode_one(cursor, registry)?;
        dict.insert(key, value);
    }
    Ok(Value::Dict(dict))
}

fn read_structure(
    cursor: &mut Cursor<&[u8]>,
    registry: &Registry,
    field_count: usize,
) -> Result<Value, PackStreamError> {
    need(cursor, 1)?;
    let tag = cursor.read_u8().unwrap();
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        fields.push(decode_one(cursor, registry)?);
    }
    let structure = registry.construct(tag, fields)?;
    Ok(Value::Structure(structure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packstream::encode::encode;

    fn registry() -> Registry {
        let r = Registry::new();
        crate::graph::register_builtin(&r);
        crate::message::register_builtin(&r);
        r
    }

    #[test]
    fn tiny_int_round_trip() {
        let r = registry();
        let (v, n) = decode(&[0x2A], &r).unwrap();
        assert_eq!(v, Value::Int(42));
        assert_eq!(n, 1);
    }

    #[test]
    fn round_trip_every_shape() {
        let r = registry();
        let samples = vec![
            Value::Null,
            Value::Bool(true),
            Value::Bool(false),
            Value::Int(-17),
            Value::Int(i64::MIN),
            Value::Int(i64::MAX),
            Value::Float(3.5),
            Value::Bytes(vec![1, 2, 3]),
            Value::String("hello, world".into()),
            Value::String(String::new()),
            Value::List(vec![Value::Int(1), Value::String("x".into())]),
        ];
        for v in samples {
            let bytes = encode(&v);
            let (decoded, consumed) = decode(&bytes, &r).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, bytes.len());
        }
    }

    #[test]
    fn empty_buffer_errors() {
        let r = registry();
        assert_eq!(decode(&[], &r).unwrap_err(), PackStreamError::EmptyBuffer);
    }

    #[test]
    fn unknown_marker_errors() {
        let r = registry();
        assert!(matches!(
            decode(&[0xC7], &r).unwrap_err(),
            PackStreamError::UnknownMarker(0xC7)
        ));
    }

    #[test]
    fn truncated_length_errors() {
        let r = registry();
        // STRING_8 header claims 5 bytes but none follow
        assert!(matches!(
            decode(&[marker::STRING_8, 5], &r).unwrap_err(),
            PackStreamError::Truncated { .. }
        ));
    }

    #[test]
    fn non_string_dict_key_errors() {
        let r = registry();
        // tiny dict with one entry whose key is tiny int 1, value null
        let bytes = vec![0xA1, 0x01, marker::NULL];
        assert_eq!(
            decode(&bytes, &r).unwrap_err(),
            PackStreamError::NonStringKey
        );
    }

    #[test]
    fn unregistered_structure_tag_errors() {
        let r = Registry::new();
        let s = Structure::new(0x01, vec![]);
        let bytes = encode(&Value::Structure(s));
        assert!(matches!(
            decode(&bytes, &r).unwrap_err(),
            PackStreamError::UnregisteredTag(0x01)
        ));
    }

    #[test]
    fn surplus_bytes_are_left_untouched() {
        let r = registry();
        let mut bytes = encode(&Value::Int(1));
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        let (v, consumed) = decode(&bytes, &r).unwrap();
        assert_eq!(v, Value::Int(1));
        assert_eq!(consumed, 1);
    }
}
