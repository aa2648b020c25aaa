//! Bit-exact `PackStream` marker bytes, per spec.md §3.

pub const NULL: u8 = 0xC0;
pub const FALSE: u8 = 0xC2;
pub const TRUE: u8 = 0xC3;
pub const FLOAT_64: u8 = 0xC1;

pub const TINY_INT_MAX: i64 = 127;
pub const TINY_INT_MIN: i64 = -16;

pub const INT_8: u8 = 0xC8;
pub const INT_16: u8 = 0xC9;
pub const INT_32: u8 = 0xCA;
pub const INT_64: u8 = 0xCB;

pub const BYTES_8: u8 = 0xCC;
pub const BYTES_16: u8 = 0xCD;
pub const BYTES_32: u8 = 0xCE;

pub const TINY_STRING: u8 = 0x80;
pub const STRING_8: u8 = 0xD0;
pub const STRING_16: u8 = 0xD1;
pub const STRING_32: u8 = 0xD2;

pub const TINY_LIST: u8 = 0x90;
pub const LIST_8: u8 = 0xD4;
pub const LIST_16: u8 = 0xD5;
pub const LIST_32: u8 = 0xD6;

pub const TINY_DICT: u8 = 0xA0;
pub const DICT_8: u8 = 0xD8;
pub const DICT_16: u8 = 0xD9;
pub const DICT_32: u8 = 0xDA;

pub const TINY_STRUCT: u8 = 0xB0;

/// Inclusive threshold selecting the minimal integer width for `v`, per spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    Tiny,
    I8,
    I16,
    I32,
    I64,
}

#[must_use]
pub fn int_width(v: i64) -> IntWidth {
    if (TINY_INT_MIN..=TINY_INT_MAX).contains(&v) {
        IntWidth::Tiny
    } else if (-128..=-17).contains(&v) {
        IntWidth::I8
    } else if (-32_768..=32_767).contains(&v) {
        IntWidth::I16
    } else if (-2_147_483_648..=2_147_483_647).contains(&v) {
        IntWidth::I32
    } else {
        IntWidth::I64
    }
}
