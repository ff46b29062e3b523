//! Value type enumeration.

use core::fmt;

/// The type of a single stack slot, local, global, or table element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum ValueType {
    /// 32-bit integer, sign-agnostic.
    I32,
    /// 64-bit integer, sign-agnostic.
    I64,
    /// 32-bit IEEE-754 float.
    F32,
    /// 64-bit IEEE-754 float.
    F64,
    /// 128-bit packed vector.
    V128,
    /// Nullable reference to a function.
    FuncRef,
    /// Nullable reference to a host-opaque value.
    ExternRef,
}

impl ValueType {
    /// Byte width of the value's flat representation.
    pub const fn byte_width(&self) -> usize {
        match self {
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
            Self::V128 | Self::FuncRef | Self::ExternRef => 16,
        }
    }

    /// Whether this is one of the reference kinds.
    pub const fn is_ref(&self) -> bool {
        matches!(self, Self::FuncRef | Self::ExternRef)
    }

    /// Whether this is a scalar numeric kind.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64)
    }

    /// Canonical lowercase name, as used in diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::V128 => "v128",
            Self::FuncRef => "funcref",
            Self::ExternRef => "externref",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The two reference kinds. Disjoint; neither is a subtype of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RefType {
    /// Reference to a function.
    FuncRef,
    /// Reference to a host-opaque value.
    ExternRef,
}

impl From<RefType> for ValueType {
    fn from(ty: RefType) -> Self {
        match ty {
            RefType::FuncRef => ValueType::FuncRef,
            RefType::ExternRef => ValueType::ExternRef,
        }
    }
}

impl TryFrom<ValueType> for RefType {
    type Error = ValueType;

    fn try_from(ty: ValueType) -> Result<Self, ValueType> {
        match ty {
            ValueType::FuncRef => Ok(RefType::FuncRef),
            ValueType::ExternRef => Ok(RefType::ExternRef),
            other => Err(other),
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ValueType::from(*self).name())
    }
}
