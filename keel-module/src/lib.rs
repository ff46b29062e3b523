//! Module container, binary codec, and validator of the Keel engine.
//!
//! The pipeline is `bytes -> decode -> Module -> validate -> ModuleInfo`.
//! Decoding rejects anything it cannot parse as [`BinaryError`]
//! ("malformed"); validation rejects well-parsed but ill-typed modules as
//! [`ValidationError`] ("invalid"). The split is strict: the codec never
//! reports a typing verdict, the validator never a parse failure.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod decode;
mod encode;
mod error;
mod module;
mod reader;
mod validate;
mod writer;

pub use decode::decode_module;
pub use encode::encode_module;
pub use error::{
    BinaryError,
    BodyError,
    ValidationError,
};
pub use module::{
    ConstExpr,
    CustomSection,
    DataKind,
    DataSegment,
    ElemItems,
    ElemKind,
    ElemSegment,
    Export,
    FunctionBody,
    GlobalDef,
    Import,
    ImportDesc,
    Module,
};
pub use reader::Reader;
pub use validate::{
    validate_module,
    ModuleInfo,
};
pub use writer::Writer;
