//! The encode sink, mirroring every [`crate::Reader`] primitive.

use keel_ops::{
    BlockType,
    ImmWriter,
};
use keel_types::{
    RefType,
    ValueType,
};

use crate::reader::type_byte;

/// A growable byte sink producing minimal-length LEB128.
#[derive(Debug, Default)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    /// A fresh, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bytes written so far.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append one byte.
    pub fn byte(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    /// Append raw bytes.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    /// Append a fixed-width little-endian `u32`.
    pub fn u32_le(&mut self, value: u32) {
        self.raw(&value.to_le_bytes());
    }

    /// Append an unsigned LEB128 integer, minimal length.
    pub fn var_uint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.byte(byte);
                return;
            }
            self.byte(byte | 0x80);
        }
    }

    /// Append a signed LEB128 integer, minimal length.
    pub fn var_sint(&mut self, mut value: i64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            let sign_clear = value == 0 && byte & 0x40 == 0;
            let sign_set = value == -1 && byte & 0x40 != 0;
            if sign_clear || sign_set {
                self.byte(byte);
                return;
            }
            self.byte(byte | 0x80);
        }
    }

    /// Append an unsigned LEB128 `u32`.
    pub fn var_u32(&mut self, value: u32) {
        self.var_uint(value as u64);
    }

    /// Append a length-prefixed UTF-8 name.
    pub fn name(&mut self, name: &str) {
        self.var_u32(name.len() as u32);
        self.raw(name.as_bytes());
    }

    /// Append an encoded value type.
    pub fn value_type(&mut self, ty: ValueType) {
        self.byte(match ty {
            ValueType::I32 => type_byte::I32,
            ValueType::I64 => type_byte::I64,
            ValueType::F32 => type_byte::F32,
            ValueType::F64 => type_byte::F64,
            ValueType::V128 => type_byte::V128,
            ValueType::FuncRef => type_byte::FUNCREF,
            ValueType::ExternRef => type_byte::EXTERNREF,
        });
    }

    /// Append an encoded reference type.
    pub fn ref_type(&mut self, ty: RefType) {
        self.value_type(ty.into());
    }

    /// Append an encoded block type.
    pub fn block_type(&mut self, ty: BlockType) {
        match ty {
            BlockType::Empty => self.byte(type_byte::EMPTY_BLOCK),
            BlockType::Value(ty) => self.value_type(ty),
            BlockType::Func(index) => self.var_sint(index as i64),
        }
    }

    /// Append a framed section: id, byte length, body.
    pub fn section(&mut self, id: u8, body: impl FnOnce(&mut Writer)) {
        let mut inner = Writer::new();
        body(&mut inner);
        self.byte(id);
        self.var_u32(inner.len() as u32);
        self.raw(&inner.bytes);
    }
}

impl ImmWriter for Writer {
    fn write_u8(&mut self, byte: u8) {
        self.byte(byte);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.raw(bytes);
    }

    fn write_var_u32(&mut self, value: u32) {
        self.var_u32(value);
    }

    fn write_var_s32(&mut self, value: i32) {
        self.var_sint(value as i64);
    }

    fn write_var_s64(&mut self, value: i64) {
        self.var_sint(value);
    }

    fn write_value_type(&mut self, ty: ValueType) {
        self.value_type(ty);
    }

    fn write_ref_type(&mut self, ty: RefType) {
        self.ref_type(ty);
    }

    fn write_block_type(&mut self, ty: BlockType) {
        self.block_type(ty);
    }
}

#[cfg(test)]
mod tests {
    use keel_ops::FeatureSet;
    use rstest::rstest;

    use super::*;
    use crate::Reader;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(127)]
    #[case(128)]
    #[case(624485)]
    #[case(u32::MAX as u64)]
    fn unsigned_round_trip(#[case] value: u64) {
        let mut writer = Writer::new();
        writer.var_uint(value);
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes, FeatureSet::standard());
        assert_eq!(reader.var_uint(32).unwrap(), value);
        assert!(reader.is_empty());
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(63)]
    #[case(-64)]
    #[case(64)]
    #[case(-65)]
    #[case(i32::MAX as i64)]
    #[case(i32::MIN as i64)]
    fn signed_round_trip(#[case] value: i64) {
        let mut writer = Writer::new();
        writer.var_sint(value);
        let bytes = writer.into_bytes();
        let mut reader = Reader::new(&bytes, FeatureSet::standard());
        assert_eq!(reader.var_sint(32).unwrap(), value);
        assert!(reader.is_empty());
    }

    #[test]
    fn section_framing_prefixes_the_length() {
        let mut writer = Writer::new();
        writer.section(1, |body| body.raw(&[0xaa, 0xbb]));
        assert_eq!(writer.into_bytes(), [0x01, 0x02, 0xaa, 0xbb]);
    }
}
