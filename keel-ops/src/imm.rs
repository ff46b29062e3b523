//! Immediate shapes and the byte-source traits the table decodes through.
//!
//! The operator table never touches raw buffers: it reads and writes
//! immediates through [`ImmReader`] and [`ImmWriter`], which the module
//! codec implements on its cursor types. One [`Imm`] impl per shape keeps
//! decode and encode symmetric by construction.

use keel_types::{
    RefType,
    ValueType,
};

/// The declared type of a structured control operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockType {
    /// `[] -> []`.
    Empty,
    /// `[] -> [ty]`.
    Value(ValueType),
    /// The function type at the given type index.
    Func(u32),
}

/// Byte source for immediate decoding.
pub trait ImmReader {
    /// Error produced on truncation or malformed content.
    type Error;

    /// Read one byte.
    fn read_u8(&mut self) -> Result<u8, Self::Error>;
    /// Read `N` raw little-endian bytes.
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], Self::Error>;
    /// Read an unsigned LEB128 32-bit integer.
    fn read_var_u32(&mut self) -> Result<u32, Self::Error>;
    /// Read a signed LEB128 32-bit integer.
    fn read_var_s32(&mut self) -> Result<i32, Self::Error>;
    /// Read a signed LEB128 64-bit integer.
    fn read_var_s64(&mut self) -> Result<i64, Self::Error>;
    /// Read an encoded value type.
    fn read_value_type(&mut self) -> Result<ValueType, Self::Error>;
    /// Read an encoded reference type.
    fn read_ref_type(&mut self) -> Result<RefType, Self::Error>;
    /// Read an encoded block type (the signed-33-bit form).
    fn read_block_type(&mut self) -> Result<BlockType, Self::Error>;

    /// The error for an opcode outside the table.
    fn unknown_opcode(&mut self, raw: u32) -> Self::Error;
}

/// Byte sink for immediate encoding.
pub trait ImmWriter {
    /// Write one byte.
    fn write_u8(&mut self, byte: u8);
    /// Write raw bytes.
    fn write_bytes(&mut self, bytes: &[u8]);
    /// Write an unsigned LEB128 32-bit integer.
    fn write_var_u32(&mut self, value: u32);
    /// Write a signed LEB128 32-bit integer.
    fn write_var_s32(&mut self, value: i32);
    /// Write a signed LEB128 64-bit integer.
    fn write_var_s64(&mut self, value: i64);
    /// Write an encoded value type.
    fn write_value_type(&mut self, ty: ValueType);
    /// Write an encoded reference type.
    fn write_ref_type(&mut self, ty: RefType);
    /// Write an encoded block type.
    fn write_block_type(&mut self, ty: BlockType);
}

/// A decodable, encodable immediate shape.
pub trait Imm: Sized {
    /// Decode the shape's wire form.
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error>;
    /// Encode the shape's wire form.
    fn encode<W: ImmWriter>(&self, writer: &mut W);
}

/// No immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NoImm;

impl Imm for NoImm {
    fn decode<R: ImmReader>(_: &mut R) -> Result<Self, R::Error> {
        Ok(Self)
    }

    fn encode<W: ImmWriter>(&self, _: &mut W) {}
}

macro_rules! leb_imm {
    ($(#[$meta:meta])* $Shape:ident { $($field:ident: $ty:ty => $read:ident / $write:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $Shape {
            $(
                #[allow(missing_docs)]
                pub $field: $ty,
            )+
        }

        impl Imm for $Shape {
            fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
                Ok(Self {
                    $($field: reader.$read()?,)+
                })
            }

            fn encode<W: ImmWriter>(&self, writer: &mut W) {
                $(writer.$write(self.$field);)+
            }
        }
    };
}

leb_imm! {
    /// A relative branch depth.
    BranchImm { depth: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// A function index.
    FuncImm { func: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// A local index.
    LocalImm { local: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// A global index.
    GlobalImm { global: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// A table index.
    TableImm { table: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// Destination and source table indices, in wire order.
    TablePairImm {
        dst: u32 => read_var_u32 / write_var_u32,
        src: u32 => read_var_u32 / write_var_u32,
    }
}

leb_imm! {
    /// An element segment index.
    ElemImm { elem: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// Element segment then destination table, in wire order.
    ElemTableImm {
        elem: u32 => read_var_u32 / write_var_u32,
        table: u32 => read_var_u32 / write_var_u32,
    }
}

leb_imm! {
    /// A memory index.
    MemoryImm { memory: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// Destination and source memory indices, in wire order.
    MemoryPairImm {
        dst: u32 => read_var_u32 / write_var_u32,
        src: u32 => read_var_u32 / write_var_u32,
    }
}

leb_imm! {
    /// A data segment index.
    DataImm { data: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// Data segment then destination memory, in wire order.
    DataMemoryImm {
        data: u32 => read_var_u32 / write_var_u32,
        memory: u32 => read_var_u32 / write_var_u32,
    }
}

leb_imm! {
    /// An exception tag index.
    TagImm { tag: u32 => read_var_u32 / write_var_u32 }
}

leb_imm! {
    /// Type index then table index of an indirect call, in wire order.
    CallIndirectImm {
        ty: u32 => read_var_u32 / write_var_u32,
        table: u32 => read_var_u32 / write_var_u32,
    }
}

/// The declared type of a `block`/`loop`/`if`/`try`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockTypeImm {
    /// Declared block type.
    pub ty: BlockType,
}

impl Imm for BlockTypeImm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            ty: reader.read_block_type()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_block_type(self.ty);
    }
}

/// Branch table: target depths plus the default depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchTableImm {
    /// Indexed targets.
    pub targets: Box<[u32]>,
    /// Fallthrough target.
    pub default: u32,
}

impl Imm for BranchTableImm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        let count = reader.read_var_u32()?;
        let mut targets = Vec::with_capacity(usize::min(count as usize, 1024));
        for _ in 0..count {
            targets.push(reader.read_var_u32()?);
        }
        Ok(Self {
            targets: targets.into(),
            default: reader.read_var_u32()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_var_u32(self.targets.len() as u32);
        for target in self.targets.iter() {
            writer.write_var_u32(*target);
        }
        writer.write_var_u32(self.default);
    }
}

/// The reference kind of a `ref.null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefTypeImm {
    /// Kind of the produced null.
    pub ty: RefType,
}

impl Imm for RefTypeImm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            ty: reader.read_ref_type()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_ref_type(self.ty);
    }
}

/// The explicit type list of the typed `select`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectTypeImm {
    /// Declared operand types; exactly one in this core.
    pub types: Box<[ValueType]>,
}

impl Imm for SelectTypeImm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        let count = reader.read_var_u32()?;
        let mut types = Vec::with_capacity(usize::min(count as usize, 16));
        for _ in 0..count {
            types.push(reader.read_value_type()?);
        }
        Ok(Self {
            types: types.into(),
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_var_u32(self.types.len() as u32);
        for ty in self.types.iter() {
            writer.write_value_type(*ty);
        }
    }
}

/// Alignment hint and constant offset of a memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemArg {
    /// Log2 of the access's declared alignment.
    pub align_log2: u32,
    /// Constant byte offset added to the dynamic address.
    pub offset: u32,
}

impl Imm for MemArg {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            align_log2: reader.read_var_u32()?,
            offset: reader.read_var_u32()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_var_u32(self.align_log2);
        writer.write_var_u32(self.offset);
    }
}

/// The ordering byte of `atomic.fence`; only sequential consistency (zero)
/// is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceImm {
    /// Encoded ordering; must be zero.
    pub order: u8,
}

impl Imm for FenceImm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            order: reader.read_u8()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_u8(self.order);
    }
}

/// An `i32.const` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct I32Imm {
    /// Constant value.
    pub value: i32,
}

impl Imm for I32Imm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            value: reader.read_var_s32()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_var_s32(self.value);
    }
}

/// An `i64.const` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct I64Imm {
    /// Constant value.
    pub value: i64,
}

impl Imm for I64Imm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            value: reader.read_var_s64()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_var_s64(self.value);
    }
}

/// An `f32.const` payload, kept as bits so NaN payloads survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct F32Imm {
    /// IEEE-754 bit pattern.
    pub bits: u32,
}

impl F32Imm {
    /// The constant as a float.
    pub fn value(&self) -> f32 {
        f32::from_bits(self.bits)
    }
}

impl Imm for F32Imm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            bits: u32::from_le_bytes(reader.read_array()?),
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_bytes(&self.bits.to_le_bytes());
    }
}

/// An `f64.const` payload, kept as bits so NaN payloads survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct F64Imm {
    /// IEEE-754 bit pattern.
    pub bits: u64,
}

impl F64Imm {
    /// The constant as a float.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits)
    }
}

impl Imm for F64Imm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            bits: u64::from_le_bytes(reader.read_array()?),
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_bytes(&self.bits.to_le_bytes());
    }
}

/// A `v128.const` payload: 16 little-endian bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct V128Imm {
    /// Constant bytes.
    pub bytes: [u8; 16],
}

impl Imm for V128Imm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            bytes: reader.read_array()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_bytes(&self.bytes);
    }
}

/// A lane index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LaneImm {
    /// Lane number; bounds depend on the operator's lane width.
    pub lane: u8,
}

impl Imm for LaneImm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            lane: reader.read_u8()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_u8(self.lane);
    }
}

/// A memory access targeting a single lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemArgLaneImm {
    /// Alignment and offset of the access.
    pub memarg: MemArg,
    /// Lane number.
    pub lane: u8,
}

impl Imm for MemArgLaneImm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            memarg: MemArg::decode(reader)?,
            lane: reader.read_u8()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        self.memarg.encode(writer);
        writer.write_u8(self.lane);
    }
}

/// The 16 lane selectors of `i8x16.shuffle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShuffleImm {
    /// Lane selectors; each must be below 32.
    pub lanes: [u8; 16],
}

impl Imm for ShuffleImm {
    fn decode<R: ImmReader>(reader: &mut R) -> Result<Self, R::Error> {
        Ok(Self {
            lanes: reader.read_array()?,
        })
    }

    fn encode<W: ImmWriter>(&self, writer: &mut W) {
        writer.write_bytes(&self.lanes);
    }
}
