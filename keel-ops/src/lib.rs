//! The operator table of the Keel engine.
//!
//! A single declarative table (see [`macros`]) is the source of truth for
//! every operator: its wire encoding, display name, immediate shape, and the
//! feature gate it sits behind. The [`Opcode`] and [`Operator`] enums, the
//! immediate decoder and encoder, and the per-operator metadata accessors are
//! all generated from that one table, so the codec cannot drift out of sync
//! with the inventory the validator accepts.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod align;
mod features;
mod imm;
#[macro_use]
mod macros;
mod operators;

pub use features::FeatureSet;
pub use imm::{
    BlockType,
    BlockTypeImm,
    BranchImm,
    BranchTableImm,
    CallIndirectImm,
    DataImm,
    DataMemoryImm,
    ElemImm,
    ElemTableImm,
    F32Imm,
    F64Imm,
    FenceImm,
    FuncImm,
    GlobalImm,
    I32Imm,
    I64Imm,
    Imm,
    ImmReader,
    ImmWriter,
    LaneImm,
    LocalImm,
    MemArg,
    MemArgLaneImm,
    MemoryImm,
    MemoryPairImm,
    NoImm,
    RefTypeImm,
    SelectTypeImm,
    ShuffleImm,
    TableImm,
    TablePairImm,
    TagImm,
    V128Imm,
};
pub use operators::{
    Opcode,
    Operator,
};

/// Opcode prefix byte introducing the miscellaneous (saturating truncation
/// and bulk memory/table) operator space.
pub const PREFIX_MISC: u8 = 0xfc;

/// Opcode prefix byte introducing the packed-vector operator space.
pub const PREFIX_SIMD: u8 = 0xfd;

/// Opcode prefix byte introducing the atomic operator space.
pub const PREFIX_ATOMIC: u8 = 0xfe;
