//! Tagged and untagged runtime values.

use core::fmt;

use crate::{
    floats,
    ValueType,
};

/// A 128-bit packed vector, stored as 16 little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct V128(pub [u8; 16]);

static_assertions::assert_eq_size!(V128, [u8; 16]);

macro_rules! lane_accessors {
    ($get:ident, $set:ident, $from:ident, $ty:ty, $lanes:expr) => {
        /// Read one lane, little-endian.
        pub fn $get(&self, lane: usize) -> $ty {
            const W: usize = core::mem::size_of::<$ty>();
            debug_assert!(lane < $lanes);
            let mut raw = [0u8; W];
            raw.copy_from_slice(&self.0[lane * W..(lane + 1) * W]);
            <$ty>::from_le_bytes(raw)
        }

        /// Write one lane, little-endian.
        pub fn $set(&mut self, lane: usize, value: $ty) {
            const W: usize = core::mem::size_of::<$ty>();
            debug_assert!(lane < $lanes);
            self.0[lane * W..(lane + 1) * W].copy_from_slice(&value.to_le_bytes());
        }

        /// Build a vector from all lanes.
        pub fn $from(lanes: [$ty; $lanes]) -> Self {
            let mut out = Self::default();
            for (index, lane) in lanes.into_iter().enumerate() {
                out.$set(index, lane);
            }
            out
        }
    };
}

impl V128 {
    lane_accessors!(i8x16, set_i8x16, from_i8x16, i8, 16);
    lane_accessors!(u8x16, set_u8x16, from_u8x16, u8, 16);
    lane_accessors!(i16x8, set_i16x8, from_i16x8, i16, 8);
    lane_accessors!(u16x8, set_u16x8, from_u16x8, u16, 8);
    lane_accessors!(i32x4, set_i32x4, from_i32x4, i32, 4);
    lane_accessors!(u32x4, set_u32x4, from_u32x4, u32, 4);
    lane_accessors!(i64x2, set_i64x2, from_i64x2, i64, 2);
    lane_accessors!(u64x2, set_u64x2, from_u64x2, u64, 2);
    lane_accessors!(f32x4, set_f32x4, from_f32x4, f32, 4);
    lane_accessors!(f64x2, set_f64x2, from_f64x2, f64, 2);

    /// The all-zero vector.
    pub const ZERO: Self = Self([0; 16]);
}

impl fmt::Display for V128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:016x}{:016x}",
            self.u64x2(1),
            self.u64x2(0)
        )
    }
}

/// The raw 16-byte payload of a value, without its kind.
///
/// Scalars occupy the low bytes in little-endian order; the remaining bytes
/// are zero. References store a 64-bit handle token where zero means null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UntaggedValue([u8; 16]);

static_assertions::assert_eq_size!(UntaggedValue, [u8; 16]);

impl UntaggedValue {
    /// The all-zero payload: `0`, `+0.0`, the zero vector, or a null
    /// reference, depending on the kind it is paired with.
    pub const ZERO: Self = Self([0; 16]);

    /// Wrap a raw little-endian payload.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// The raw little-endian payload.
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    fn from_u64(bits: u64) -> Self {
        let mut raw = [0u8; 16];
        raw[..8].copy_from_slice(&bits.to_le_bytes());
        Self(raw)
    }

    fn low_u64(self) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(raw)
    }

    /// Interpret the payload as an `i32`.
    pub fn as_i32(self) -> i32 {
        self.low_u64() as u32 as i32
    }

    /// Interpret the payload as an `i64`.
    pub fn as_i64(self) -> i64 {
        self.low_u64() as i64
    }

    /// Interpret the payload as an `f32`, preserving the bit pattern.
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.low_u64() as u32)
    }

    /// Interpret the payload as an `f64`, preserving the bit pattern.
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.low_u64())
    }

    /// Interpret the payload as a packed vector.
    pub fn as_v128(self) -> V128 {
        V128(self.0)
    }

    /// Interpret the payload as a reference handle token; zero is null.
    pub fn as_ref_token(self) -> u64 {
        self.low_u64()
    }
}

impl From<i32> for UntaggedValue {
    fn from(value: i32) -> Self {
        Self::from_u64(value as u32 as u64)
    }
}

impl From<i64> for UntaggedValue {
    fn from(value: i64) -> Self {
        Self::from_u64(value as u64)
    }
}

impl From<u32> for UntaggedValue {
    fn from(value: u32) -> Self {
        Self::from_u64(value as u64)
    }
}

impl From<u64> for UntaggedValue {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<f32> for UntaggedValue {
    fn from(value: f32) -> Self {
        Self::from_u64(value.to_bits() as u64)
    }
}

impl From<f64> for UntaggedValue {
    fn from(value: f64) -> Self {
        Self::from_u64(value.to_bits())
    }
}

impl From<V128> for UntaggedValue {
    fn from(value: V128) -> Self {
        Self(value.0)
    }
}

/// A runtime value paired with its kind.
///
/// Equality is bitwise per kind, not IEEE: two NaNs with the same payload
/// compare equal, and `+0.0` and `-0.0` compare unequal.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Value {
    ty: ValueType,
    bits: UntaggedValue,
}

impl Value {
    /// Pair a raw payload with its kind.
    pub const fn from_parts(ty: ValueType, bits: UntaggedValue) -> Self {
        Self { ty, bits }
    }

    /// A null reference of the given kind.
    pub fn null_ref(ty: crate::RefType) -> Self {
        Self::from_parts(ty.into(), UntaggedValue::ZERO)
    }

    /// A reference of the given kind holding a handle token.
    pub fn ref_from_token(ty: crate::RefType, token: u64) -> Self {
        Self::from_parts(ty.into(), UntaggedValue::from_u64(token))
    }

    /// The zero/null value of an arbitrary kind.
    pub fn zero(ty: ValueType) -> Self {
        Self::from_parts(ty, UntaggedValue::ZERO)
    }

    /// The value's kind.
    pub const fn ty(&self) -> ValueType {
        self.ty
    }

    /// The value's raw payload.
    pub const fn bits(&self) -> UntaggedValue {
        self.bits
    }

    /// The payload as `i32`, if the kind matches.
    pub fn i32(&self) -> Option<i32> {
        (self.ty == ValueType::I32).then(|| self.bits.as_i32())
    }

    /// The payload as `i64`, if the kind matches.
    pub fn i64(&self) -> Option<i64> {
        (self.ty == ValueType::I64).then(|| self.bits.as_i64())
    }

    /// The payload as `f32`, if the kind matches.
    pub fn f32(&self) -> Option<f32> {
        (self.ty == ValueType::F32).then(|| self.bits.as_f32())
    }

    /// The payload as `f64`, if the kind matches.
    pub fn f64(&self) -> Option<f64> {
        (self.ty == ValueType::F64).then(|| self.bits.as_f64())
    }

    /// The payload as a vector, if the kind matches.
    pub fn v128(&self) -> Option<V128> {
        (self.ty == ValueType::V128).then(|| self.bits.as_v128())
    }

    /// The reference handle token, if this is a reference kind.
    pub fn ref_token(&self) -> Option<u64> {
        self.ty.is_ref().then(|| self.bits.as_ref_token())
    }

    /// Whether this is a null reference.
    pub fn is_null_ref(&self) -> bool {
        self.ref_token() == Some(0)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::from_parts(ValueType::I32, value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::from_parts(ValueType::I64, value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::from_parts(ValueType::I32, value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::from_parts(ValueType::I64, value.into())
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::from_parts(ValueType::F32, value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::from_parts(ValueType::F64, value.into())
    }
}

impl From<V128> for Value {
    fn from(value: V128) -> Self {
        Self::from_parts(ValueType::V128, value.into())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            ValueType::I32 => write!(f, "i32:{}", self.bits.as_i32()),
            ValueType::I64 => write!(f, "i64:{}", self.bits.as_i64()),
            ValueType::F32 => {
                write!(f, "f32:{}", floats::display_f32(self.bits.as_f32()))
            }
            ValueType::F64 => {
                write!(f, "f64:{}", floats::display_f64(self.bits.as_f64()))
            }
            ValueType::V128 => write!(f, "v128:{}", self.bits.as_v128()),
            ValueType::FuncRef | ValueType::ExternRef => {
                let token = self.bits.as_ref_token();
                if token == 0 {
                    write!(f, "{}:null", self.ty)
                } else {
                    write!(f, "{}:{token:#x}", self.ty)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_payloads_survive_the_round_trip() {
        let weird = f32::from_bits(0x7fc0_1234);
        let value = Value::from(weird);
        assert_eq!(value.f32().unwrap().to_bits(), 0x7fc0_1234);
    }

    #[test]
    fn equality_is_bitwise() {
        let a = Value::from(f64::NAN);
        let b = Value::from(f64::NAN);
        assert_eq!(a, b);

        let pos = Value::from(0.0f64);
        let neg = Value::from(-0.0f64);
        assert_ne!(pos, neg);
    }

    #[test]
    fn scalar_payloads_zero_extend() {
        let value = Value::from(-1i32);
        assert_eq!(value.bits().to_bytes()[4..], [0u8; 12]);
    }

    #[test]
    fn v128_lanes() {
        let mut v = V128::default();
        v.set_i32x4(3, -7);
        assert_eq!(v.i32x4(3), -7);
        assert_eq!(v.i32x4(0), 0);
        assert_eq!(V128::from_u64x2([1, 2]).u64x2(1), 2);
    }
}
