use super::marker::{self, IntWidth};
use super::value::{Structure, Value};
use byteorder::{BigEndian, WriteBytesExt};

/// Encodes a single [`Value`] to its canonical, minimal-width `PackStream` byte form.
///
/// Integer width and string/tiny-collection forms are always the smallest the marker table
/// allows for the given content, per spec.md §4.1 invariant (iv).
#[must_use]
pub fn encode(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_into(value, &mut buf);
    buf
}

fn encode_into(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(marker::NULL),
        Value::Bool(false) => buf.push(marker::FALSE),
        Value::Bool(true) => buf.push(marker::TRUE),
        Value::Int(v) => encode_int(*v, buf),
        Value::Float(v) => {
            buf.push(marker::FLOAT_64);
            buf.write_f64::<BigEndian>(*v).expect("Vec write");
        }
        Value::Bytes(bytes) => encode_bytes(bytes, buf),
        Value::String(s) => encode_string(s, buf),
        Value::List(items) => encode_list(items, buf),
        Value::Dict(dict) => encode_dict(dict, buf),
        Value::Structure(s) => encode_structure(s, buf),
    }
}

fn encode_int(v: i64, buf: &mut Vec<u8>) {
    match marker::int_width(v) {
        IntWidth::Tiny => {
            // two's-complement byte of v, valid for both the 0x00..0x7F and 0xF0..0xFF ranges
            buf.push((v as i8) as u8);
        }
        IntWidth::I8 => {
            buf.push(marker::INT_8);
            buf.write_i8(v as i8).expect("Vec write");
        }
        IntWidth::I16 => {
            buf.push(marker::INT_16);
            buf.write_i16::<BigEndian>(v as i16).expect("Vec write");
        }
        IntWidth::I32 => {
            buf.push(marker::INT_32);
            buf.write_i32::<BigEndian>(v as i32).expect("Vec write");
        }
        IntWidth::I64 => {
            buf.push(marker::INT_64);
            buf.write_i64::<BigEndian>(v).expect("Vec write");
        }
    }
}

fn encode_bytes(bytes: &[u8], buf: &mut Vec<u8>) {
    let len = bytes.len();
    if len <= 0xFF {
        buf.push(marker::BYTES_8);
        buf.push(len as u8);
    } else if len <= 0xFFFF {
        buf.push(marker::BYTES_16);
        buf.write_u16::<BigEndian>(len as u16).expect("Vec write");
    } else {
        buf.push(marker::BYTES_32);
        buf.write_u32::<BigEndian>(len as u32).expect("Vec write");
    }
    buf.extend_from_slice(bytes);
}

fn encode_string(s: &str, buf: &mut Vec<u8>) {
    let bytes = s.as_bytes();
    let len = bytes.len();
    if len < 16 {
        buf.push(marker::TINY_STRING | (len as u8));
    } else if len <= 0xFF {
        buf.push(marker::STRING_8);
        buf.push(len as u8);
    } else if len <= 0xFFFF {
        buf.push(marker::STRING_16);
        buf.write_u16::<BigEndian>(len as u16).expect("Vec write");
    } else {
        buf.push(marker::STRING_32);
        buf.write_u32::<BigEndian>(len as u32).expect("Vec write");
    }
    buf.extend_from_slice(bytes);
}

fn encode_list(items: &[Value], buf: &mut Vec<u8>) {
    let len = items.len();
    if len < 16 {
        buf.push(marker::TINY_LIST | (len as u8));
    } else if len <= 0xFF {
        buf.push(marker::LIST_8);
        buf.push(len as u8);
    } else if len <= 0xFFFF {
        buf.push(marker::LIST_16);
        buf.write_u16::<BigEndian>(len as u16).expect("Vec write");
    } else {
        buf.push(marker::LIST_32);
        buf.write_u32::<BigEndian>(len as u32).expect("Vec write");
    }
    for item in items {
        encode_into(item, buf);
    }
}

fn encode_dict(dict: &super::value::Dict, buf: &mut Vec<u8>) {
    let len = dict.len();
    if len < 16 {
        buf.push(marker::TINY_DICT | (len as u8));
    } else if len <= 0xFF {
        buf.push(marker::DICT_8);
        buf.push(len as u8);
    } else if len <= 0xFFFF {
        buf.push(marker::DICT_16);
        buf.write_u16::<BigEndian>(len as u16).expect("Vec write");
    } else {
        buf.push(marker::DICT_32);
        buf.write_u32::<BigEndian>(len as u32).expect("Vec write");
    }
    for (k, v) in dict.iter() {
        encode_string(k, buf);
        encode_into(v, buf);
    }
}

fn encode_structure(s: &Structure, buf: &mut Vec<u8>) {
    let len = s.fields.len();
    debug_assert!(len <= 15, "structure field count must fit in a nibble");
    buf.push(marker::TINY_STRUCT | (len as u8));
    buf.push(s.tag);
    for field in &s.fields {
        encode_into(field, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packstream::value::Dict;

    #[test]
    fn tiny_int_positive() {
        assert_eq!(encode(&Value::Int(42)), vec![0x2A]);
    }

    #[test]
    fn tiny_int_negative_boundaries() {
        assert_eq!(encode(&Value::Int(-1)), vec![0xFF]);
        assert_eq!(encode(&Value::Int(-16)), vec![0xF0]);
        assert_eq!(encode(&Value::Int(-17)), vec![0xC8, 0xEF]);
    }

    #[test]
    fn string_length_counts_utf8_bytes() {
        assert_eq!(encode(&Value::String("ä".into())), vec![0x82, 0xC3, 0xA4]);
    }

    #[test]
    fn empty_collections_use_tiny_zero_form() {
        assert_eq!(encode(&Value::List(vec![])), vec![0x90]);
        assert_eq!(encode(&Value::Dict(Dict::new())), vec![0xA0]);
        assert_eq!(encode(&Value::String(String::new())), vec![0x80]);
    }

    #[test]
    fn bytes_never_use_tiny_form() {
        assert_eq!(encode(&Value::Bytes(vec![])), vec![0xCC, 0x00]);
    }

    #[test]
    fn node_structure_matches_spec_s3() {
        let s = Structure::new(
            0x4E,
            vec![
                Value::Int(42),
                Value::List(vec![Value::String("Person".into())]),
                Value::Dict(Dict::new().with("name", Value::String("Alice".into()))),
                Value::String("node42".into()),
            ],
        );
        let bytes = encode(&Value::Structure(s));
        let expected = vec![
            0xB4, 0x4E, 0x2A, 0x91, 0x86, 0x50, 0x65, 0x72, 0x73, 0x6F, 0x6E, 0xA1, 0x84, 0x6E,
            0x61, 0x6D, 0x65, 0x85, 0x41, 0x6C, 0x69, 0x63, 0x65, 0x86, 0x6E, 0x6F, 0x64, 0x65,
            0x34, 0x32,
        ];
        assert_eq!(bytes, expected);
    }
}
