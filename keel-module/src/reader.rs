//! The decode cursor: bounded byte access plus strict LEB128.

use keel_ops::{
    BlockType,
    FeatureSet,
    ImmReader,
};
use keel_types::{
    RefType,
    ValueType,
};

use crate::BinaryError;

/// Encoding byte of each value type.
pub(crate) mod type_byte {
    pub(crate) const I32: u8 = 0x7f;
    pub(crate) const I64: u8 = 0x7e;
    pub(crate) const F32: u8 = 0x7d;
    pub(crate) const F64: u8 = 0x7c;
    pub(crate) const V128: u8 = 0x7b;
    pub(crate) const FUNCREF: u8 = 0x70;
    pub(crate) const EXTERNREF: u8 = 0x6f;
    pub(crate) const EMPTY_BLOCK: u8 = 0x40;
    pub(crate) const FUNC_FORM: u8 = 0x60;
}

/// A seekable cursor over an input buffer.
///
/// Every read fails with [`BinaryError::UnexpectedEnd`] on truncation; the
/// LEB128 readers reject overlong forms and out-of-range payloads. Offsets
/// reported in errors are relative to the buffer handed to [`Reader::new`],
/// offset by `base` so that sub-readers over section bodies still report
/// absolute input positions.
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
    features: FeatureSet,
}

impl<'a> Reader<'a> {
    /// Wrap a buffer.
    pub fn new(bytes: &'a [u8], features: FeatureSet) -> Self {
        Self {
            bytes,
            pos: 0,
            base: 0,
            features,
        }
    }

    /// A sub-reader over the next `len` bytes, which are consumed here.
    pub fn subreader(&mut self, len: usize) -> Result<Reader<'a>, BinaryError> {
        let base = self.offset();
        let bytes = self.read_bytes(len)?;
        Ok(Reader {
            bytes,
            pos: 0,
            base,
            features: self.features,
        })
    }

    /// Absolute offset in the original input.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left in this reader's window.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Whether the window is exhausted.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The feature set decoding is running under.
    pub fn features(&self) -> FeatureSet {
        self.features
    }

    fn truncated(&self) -> BinaryError {
        BinaryError::UnexpectedEnd {
            offset: self.base + self.bytes.len(),
        }
    }

    /// Consume `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], BinaryError> {
        if self.remaining() < len {
            return Err(self.truncated());
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Consume one byte.
    pub fn byte(&mut self) -> Result<u8, BinaryError> {
        if self.remaining() < 1 {
            return Err(self.truncated());
        }
        let byte = self.bytes[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Consume a fixed-width little-endian `u32`.
    pub fn u32_le(&mut self) -> Result<u32, BinaryError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.read_bytes(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    /// Unsigned LEB128, up to `bits` significant bits. Overlong forms and
    /// nonzero unused bits are rejected.
    pub fn var_uint(&mut self, bits: u32) -> Result<u64, BinaryError> {
        let start = self.offset();
        let max_bytes = (bits as usize + 6) / 7;
        let mut result: u64 = 0;
        for index in 0..max_bytes {
            let byte = self.byte()?;
            let content = (byte & 0x7f) as u64;
            let shift = 7 * index as u32;
            let unused = bits.saturating_sub(shift);
            if unused < 7 && content >= 1 << unused {
                return Err(BinaryError::BadLeb128 { offset: start });
            }
            result |= content << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(BinaryError::BadLeb128 { offset: start })
    }

    /// Signed LEB128, up to `bits` significant bits. The final byte's
    /// unused bits must agree with the sign.
    pub fn var_sint(&mut self, bits: u32) -> Result<i64, BinaryError> {
        let start = self.offset();
        let max_bytes = (bits as usize + 6) / 7;
        let mut result: i64 = 0;
        for index in 0..max_bytes {
            let byte = self.byte()?;
            let content = (byte & 0x7f) as i64;
            let shift = 7 * index as u32;
            let unused = bits.saturating_sub(shift);
            if unused < 7 {
                // Unused high bits must replicate the sign bit.
                let sign_bits = (0x7f_u8 << (unused.saturating_sub(1))) & 0x7f;
                let masked = (byte & 0x7f) & sign_bits;
                if masked != 0 && masked != sign_bits {
                    return Err(BinaryError::BadLeb128 { offset: start });
                }
            }
            result |= content << shift;
            if byte & 0x80 == 0 {
                // Sign-extend from the last content bit.
                let used = shift + 7;
                if used < 64 && byte & 0x40 != 0 {
                    result |= !0_i64 << used;
                }
                return Ok(result);
            }
        }
        Err(BinaryError::BadLeb128 { offset: start })
    }

    /// Unsigned LEB128 `u32`.
    pub fn var_u32(&mut self) -> Result<u32, BinaryError> {
        Ok(self.var_uint(32)? as u32)
    }

    /// A length-prefixed UTF-8 name.
    pub fn name(&mut self) -> Result<String, BinaryError> {
        let offset = self.offset();
        let len = self.var_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BinaryError::BadUtf8 { offset })
    }

    /// An encoded value type byte.
    pub fn value_type(&mut self) -> Result<ValueType, BinaryError> {
        let offset = self.offset();
        let byte = self.byte()?;
        self.value_type_from_byte(byte, offset)
    }

    fn value_type_from_byte(
        &self,
        byte: u8,
        offset: usize,
    ) -> Result<ValueType, BinaryError> {
        let ty = match byte {
            type_byte::I32 => ValueType::I32,
            type_byte::I64 => ValueType::I64,
            type_byte::F32 => ValueType::F32,
            type_byte::F64 => ValueType::F64,
            type_byte::V128 if self.features.contains(FeatureSet::SIMD) => ValueType::V128,
            type_byte::FUNCREF => ValueType::FuncRef,
            type_byte::EXTERNREF if self.features.contains(FeatureSet::REFERENCE_TYPES) => {
                ValueType::ExternRef
            }
            _ => return Err(BinaryError::BadValueType { byte, offset }),
        };
        Ok(ty)
    }

    /// An encoded reference type byte.
    pub fn ref_type(&mut self) -> Result<RefType, BinaryError> {
        let offset = self.offset();
        let byte = self.byte()?;
        match byte {
            type_byte::FUNCREF => Ok(RefType::FuncRef),
            type_byte::EXTERNREF if self.features.contains(FeatureSet::REFERENCE_TYPES) => {
                Ok(RefType::ExternRef)
            }
            _ => Err(BinaryError::BadRefType { byte, offset }),
        }
    }

    /// An encoded block type: `0x40`, a value type, or a signed-33-bit
    /// type index.
    pub fn block_type(&mut self) -> Result<BlockType, BinaryError> {
        let offset = self.offset();
        // Peek: the single-byte forms share their encodings with the
        // negative space of the s33.
        let byte = self.bytes.get(self.pos).copied().ok_or_else(|| self.truncated())?;
        if byte == type_byte::EMPTY_BLOCK {
            self.pos += 1;
            return Ok(BlockType::Empty);
        }
        if byte & 0x80 == 0 && byte >= 0x40 {
            self.pos += 1;
            let ty = self.value_type_from_byte(byte, offset)?;
            return Ok(BlockType::Value(ty));
        }
        let index = self.var_sint(33)?;
        if index < 0 || index > u32::MAX as i64 {
            return Err(BinaryError::BadBlockType { offset });
        }
        Ok(BlockType::Func(index as u32))
    }
}

impl ImmReader for Reader<'_> {
    type Error = BinaryError;

    fn read_u8(&mut self) -> Result<u8, BinaryError> {
        self.byte()
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BinaryError> {
        let mut raw = [0u8; N];
        raw.copy_from_slice(self.read_bytes(N)?);
        Ok(raw)
    }

    fn read_var_u32(&mut self) -> Result<u32, BinaryError> {
        self.var_u32()
    }

    fn read_var_s32(&mut self) -> Result<i32, BinaryError> {
        Ok(self.var_sint(32)? as i32)
    }

    fn read_var_s64(&mut self) -> Result<i64, BinaryError> {
        self.var_sint(64)
    }

    fn read_value_type(&mut self) -> Result<ValueType, BinaryError> {
        self.value_type()
    }

    fn read_ref_type(&mut self) -> Result<RefType, BinaryError> {
        self.ref_type()
    }

    fn read_block_type(&mut self) -> Result<BlockType, BinaryError> {
        self.block_type()
    }

    fn unknown_opcode(&mut self, raw: u32) -> BinaryError {
        BinaryError::UnknownOpcode {
            raw,
            offset: self.offset(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn reader(bytes: &[u8]) -> Reader<'_> {
        Reader::new(bytes, FeatureSet::standard())
    }

    #[rstest]
    #[case(&[0x00], 0)]
    #[case(&[0x7f], 127)]
    #[case(&[0x80, 0x01], 128)]
    #[case(&[0xff, 0xff, 0xff, 0xff, 0x0f], u32::MAX as u64)]
    fn var_u32_accepts_minimal_and_padded_forms(#[case] bytes: &[u8], #[case] expected: u64) {
        assert_eq!(reader(bytes).var_uint(32).unwrap(), expected);
    }

    #[test]
    fn var_u32_accepts_nonminimal_but_in_range_padding() {
        // 0 encoded in two bytes: legal LEB128, unused bits all zero.
        assert_eq!(reader(&[0x80, 0x00]).var_uint(32).unwrap(), 0);
    }

    #[rstest]
    #[case(&[0xff, 0xff, 0xff, 0xff, 0x1f])] // bit 32 set
    #[case(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x00])] // six bytes
    fn var_u32_rejects_overflow_and_overlong(#[case] bytes: &[u8]) {
        assert!(matches!(
            reader(bytes).var_uint(32),
            Err(BinaryError::BadLeb128 { .. })
        ));
    }

    #[rstest]
    #[case(&[0x3f], 63)]
    #[case(&[0x40], -64)]
    #[case(&[0x7f], -1)]
    #[case(&[0xc0, 0x00], 64)]
    #[case(&[0x80, 0x7f], -128)]
    fn var_s32_sign_extends(#[case] bytes: &[u8], #[case] expected: i64) {
        assert_eq!(reader(bytes).var_sint(32).unwrap(), expected);
    }

    #[test]
    fn var_s32_rejects_bad_sign_padding() {
        // -1 must pad with ones; a zero bit among the unused bits is bad.
        assert!(matches!(
            reader(&[0xff, 0xff, 0xff, 0xff, 0x0f]).var_sint(32),
            Err(BinaryError::BadLeb128 { .. })
        ));
    }

    #[test]
    fn truncation_reports_the_buffer_end() {
        assert_eq!(
            reader(&[0x80]).var_uint(32),
            Err(BinaryError::UnexpectedEnd { offset: 1 })
        );
    }

    #[test]
    fn block_types_cover_all_three_forms() {
        assert_eq!(reader(&[0x40]).block_type().unwrap(), BlockType::Empty);
        assert_eq!(
            reader(&[0x7f]).block_type().unwrap(),
            BlockType::Value(ValueType::I32)
        );
        assert_eq!(reader(&[0x05]).block_type().unwrap(), BlockType::Func(5));
    }

    #[test]
    fn v128_type_requires_the_simd_feature(){
        let mut bare = Reader::new(&[type_byte::V128], FeatureSet::MVP);
        assert!(matches!(
            bare.value_type(),
            Err(BinaryError::BadValueType { .. })
        ));
    }

    #[test]
    fn subreaders_report_absolute_offsets() {
        let bytes = [0x01, 0x02, 0x80];
        let mut outer = reader(&bytes);
        outer.byte().unwrap();
        let mut inner = outer.subreader(2).unwrap();
        inner.byte().unwrap();
        assert_eq!(inner.var_uint(32), Err(BinaryError::UnexpectedEnd { offset: 3 }));
    }
}
