//! Module decoding: wire bytes to [`Module`].

use keel_ops::{
    FeatureSet,
    Opcode,
    Operator,
};
use keel_types::{
    consts::MAX_LOCALS,
    InternedFuncType,
    Limits,
    MemoryType,
    TableType,
    ValueType,
};
use tracing::trace;

use crate::{
    module::*,
    reader::type_byte,
    BinaryError,
    Reader,
};

pub(crate) mod section_id {
    pub(crate) const CUSTOM: u8 = 0;
    pub(crate) const TYPE: u8 = 1;
    pub(crate) const IMPORT: u8 = 2;
    pub(crate) const FUNCTION: u8 = 3;
    pub(crate) const TABLE: u8 = 4;
    pub(crate) const MEMORY: u8 = 5;
    pub(crate) const GLOBAL: u8 = 6;
    pub(crate) const EXPORT: u8 = 7;
    pub(crate) const START: u8 = 8;
    pub(crate) const ELEM: u8 = 9;
    pub(crate) const CODE: u8 = 10;
    pub(crate) const DATA: u8 = 11;
    pub(crate) const DATA_COUNT: u8 = 12;
    pub(crate) const TAG: u8 = 13;
}

/// Canonical position of each non-custom section. The tag section sits
/// between memory and global; data-count precedes code.
fn section_rank(id: u8, features: FeatureSet) -> Option<u8> {
    use section_id::*;
    let rank = match id {
        TYPE => 1,
        IMPORT => 2,
        FUNCTION => 3,
        TABLE => 4,
        MEMORY => 5,
        TAG if features.contains(FeatureSet::EXCEPTION_HANDLING) => 6,
        GLOBAL => 7,
        EXPORT => 8,
        START => 9,
        ELEM => 10,
        DATA_COUNT if features.contains(FeatureSet::BULK_MEMORY) => 11,
        CODE => 12,
        DATA => 13,
        _ => return None,
    };
    Some(rank)
}

/// Decode a binary module.
///
/// Fails with [`BinaryError`] ("malformed") only; no typing judgement is
/// made here.
pub fn decode_module(bytes: &[u8], features: FeatureSet) -> Result<Module, BinaryError> {
    let mut reader = Reader::new(bytes, features);
    if reader.read_bytes(4)? != b"\0asm" {
        return Err(BinaryError::BadMagic);
    }
    let version = reader.u32_le()?;
    if version != 1 {
        return Err(BinaryError::BadVersion(version));
    }

    let mut module = Module::default();
    let mut last_rank = 0u8;
    let mut noncustom = 0usize;
    while !reader.is_empty() {
        let id = reader.byte()?;
        let declared = reader.var_u32()? as usize;
        let mut body = reader.subreader(declared)?;

        if id == section_id::CUSTOM {
            let name = body.name()?;
            let payload = body.read_bytes(body.remaining())?.to_vec();
            trace!(name = %name, len = payload.len(), "custom section");
            module.custom_sections.push(CustomSection {
                name,
                bytes: payload,
                position: noncustom,
            });
            continue;
        }

        let rank = section_rank(id, features).ok_or(BinaryError::UnknownSection(id))?;
        if rank == last_rank {
            return Err(BinaryError::DuplicateSection(id));
        }
        if rank < last_rank {
            return Err(BinaryError::SectionOutOfOrder(id));
        }
        last_rank = rank;
        noncustom += 1;

        match id {
            section_id::TYPE => decode_types(&mut body, &mut module)?,
            section_id::IMPORT => decode_imports(&mut body, &mut module)?,
            section_id::FUNCTION => decode_functions(&mut body, &mut module)?,
            section_id::TABLE => decode_tables(&mut body, &mut module)?,
            section_id::MEMORY => decode_memories(&mut body, &mut module)?,
            section_id::TAG => decode_tags(&mut body, &mut module)?,
            section_id::GLOBAL => decode_globals(&mut body, &mut module)?,
            section_id::EXPORT => decode_exports(&mut body, &mut module)?,
            section_id::START => module.start = Some(body.var_u32()?),
            section_id::ELEM => decode_elems(&mut body, &mut module)?,
            section_id::DATA_COUNT => module.data_count = Some(body.var_u32()?),
            section_id::CODE => decode_code(&mut body, &mut module)?,
            section_id::DATA => decode_data(&mut body, &mut module)?,
            _ => unreachable!("section_rank admitted id {id}"),
        }

        if !body.is_empty() {
            return Err(BinaryError::SectionLengthMismatch {
                id,
                declared,
                consumed: declared - body.remaining(),
            });
        }
        trace!(id, len = declared, "section decoded");
    }

    if module.functions.len() != module.code.len() {
        return Err(BinaryError::FunctionCodeCountMismatch {
            functions: module.functions.len(),
            bodies: module.code.len(),
        });
    }
    Ok(module)
}

fn decode_types(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        let offset = reader.offset();
        let form = reader.byte()?;
        if form != type_byte::FUNC_FORM {
            return Err(BinaryError::BadFuncTypeForm { byte: form, offset });
        }
        let params = decode_value_types(reader)?;
        let results = decode_value_types(reader)?;
        module.types.push(InternedFuncType::intern(
            keel_types::FuncType::new(params, results),
        ));
    }
    Ok(())
}

fn decode_value_types(reader: &mut Reader<'_>) -> Result<Vec<ValueType>, BinaryError> {
    let count = reader.var_u32()?;
    let mut types = Vec::with_capacity(usize::min(count as usize, 64));
    for _ in 0..count {
        types.push(reader.value_type()?);
    }
    Ok(types)
}

fn decode_limits(reader: &mut Reader<'_>, allow_shared: bool) -> Result<(Limits, bool), BinaryError> {
    let offset = reader.offset();
    let flags = reader.var_u32()?;
    let (has_max, shared) = match flags {
        0b00 => (false, false),
        0b01 => (true, false),
        0b10 | 0b11 if allow_shared => (flags & 1 != 0, true),
        _ => return Err(BinaryError::BadFlags { value: flags, offset }),
    };
    let min = reader.var_u32()? as u64;
    let max = has_max.then(|| reader.var_u32()).transpose()?.map(u64::from);
    Ok((Limits { min, max }, shared))
}

fn decode_table_type(reader: &mut Reader<'_>) -> Result<TableType, BinaryError> {
    let elem = reader.ref_type()?;
    let (limits, _) = decode_limits(reader, false)?;
    Ok(TableType { elem, limits })
}

fn decode_memory_type(reader: &mut Reader<'_>) -> Result<MemoryType, BinaryError> {
    let allow_shared = reader.features().contains(FeatureSet::SHARED_MEMORIES);
    let (limits, shared) = decode_limits(reader, allow_shared)?;
    Ok(MemoryType { limits, shared })
}

fn decode_global_type(reader: &mut Reader<'_>) -> Result<keel_types::GlobalType, BinaryError> {
    let ty = reader.value_type()?;
    let offset = reader.offset();
    let mutable = match reader.byte()? {
        0 => false,
        1 => true,
        value => {
            return Err(BinaryError::BadFlags {
                value: value as u32,
                offset,
            })
        }
    };
    Ok(keel_types::GlobalType { ty, mutable })
}

fn decode_imports(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        let module_name = reader.name()?;
        let name = reader.name()?;
        let offset = reader.offset();
        let kind = reader.byte()?;
        let desc = match kind {
            0x00 => ImportDesc::Func {
                type_index: reader.var_u32()?,
            },
            0x01 => ImportDesc::Table(decode_table_type(reader)?),
            0x02 => ImportDesc::Memory(decode_memory_type(reader)?),
            0x03 => ImportDesc::Global(decode_global_type(reader)?),
            0x04 if reader.features().contains(FeatureSet::EXCEPTION_HANDLING) => {
                decode_tag_attribute(reader)?;
                ImportDesc::Tag {
                    type_index: reader.var_u32()?,
                }
            }
            byte => return Err(BinaryError::BadExternKind { byte, offset }),
        };
        module.imports.push(Import {
            module: module_name,
            name,
            desc,
        });
    }
    Ok(())
}

fn decode_tag_attribute(reader: &mut Reader<'_>) -> Result<(), BinaryError> {
    let offset = reader.offset();
    match reader.byte()? {
        0 => Ok(()),
        value => Err(BinaryError::BadFlags {
            value: value as u32,
            offset,
        }),
    }
}

fn decode_functions(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        module.functions.push(reader.var_u32()?);
    }
    Ok(())
}

fn decode_tables(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        module.tables.push(decode_table_type(reader)?);
    }
    Ok(())
}

fn decode_memories(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        module.memories.push(decode_memory_type(reader)?);
    }
    Ok(())
}

fn decode_tags(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        decode_tag_attribute(reader)?;
        module.tags.push(reader.var_u32()?);
    }
    Ok(())
}

fn decode_globals(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        let ty = decode_global_type(reader)?;
        let init = decode_const_expr(reader)?;
        module.globals.push(GlobalDef { ty, init });
    }
    Ok(())
}

/// Decode an expression in a constant position. Parsing is general (any
/// operator stream up to the matching `end`); the validator enforces the
/// constant shape afterwards.
fn decode_const_expr(reader: &mut Reader<'_>) -> Result<ConstExpr, BinaryError> {
    let mut ops = Vec::with_capacity(2);
    let mut depth = 1usize;
    loop {
        let op = decode_operator(reader)?;
        match &op {
            Operator::Block(_)
            | Operator::Loop(_)
            | Operator::If(_)
            | Operator::Try(_) => depth += 1,
            Operator::End(_) | Operator::Delegate(_) => depth -= 1,
            _ => {}
        }
        ops.push(op);
        if depth == 0 {
            return Ok(ConstExpr { ops });
        }
    }
}

fn decode_operator(reader: &mut Reader<'_>) -> Result<Operator, BinaryError> {
    let opcode = Opcode::read(reader)?;
    if !reader.features().contains(opcode.feature()) {
        return Err(BinaryError::FeatureDisabled {
            name: opcode.name(),
        });
    }
    Operator::decode_with(opcode, reader)
}

fn decode_exports(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        let name = reader.name()?;
        let offset = reader.offset();
        let byte = reader.byte()?;
        let kind = match byte {
            0x00 => keel_types::ExternKind::Func,
            0x01 => keel_types::ExternKind::Table,
            0x02 => keel_types::ExternKind::Memory,
            0x03 => keel_types::ExternKind::Global,
            0x04 if reader.features().contains(FeatureSet::EXCEPTION_HANDLING) => {
                keel_types::ExternKind::Tag
            }
            byte => return Err(BinaryError::BadExternKind { byte, offset }),
        };
        let index = reader.var_u32()?;
        module.exports.push(Export { name, kind, index });
    }
    Ok(())
}

fn decode_elems(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    use keel_types::RefType;

    let count = reader.var_u32()?;
    for _ in 0..count {
        let offset = reader.offset();
        let flags = reader.var_u32()?;
        if flags > 7 {
            return Err(BinaryError::BadFlags {
                value: flags,
                offset,
            });
        }
        let passive_or_declared = flags & 0b001 != 0;
        let explicit_table_or_declared = flags & 0b010 != 0;
        let exprs = flags & 0b100 != 0;

        let kind = if passive_or_declared {
            if explicit_table_or_declared {
                ElemKind::Declared
            } else {
                ElemKind::Passive
            }
        } else {
            let table = if explicit_table_or_declared {
                reader.var_u32()?
            } else {
                0
            };
            let expr_offset = decode_const_expr(reader)?;
            ElemKind::Active {
                table,
                offset: expr_offset,
            }
        };

        // The compact form spells the element type as an elemkind byte;
        // the expression form spells a full reference type. Both are only
        // present when the flags call for an explicit type.
        let explicit_type = passive_or_declared || explicit_table_or_declared;
        let ty = if exprs {
            if explicit_type {
                reader.ref_type()?
            } else {
                RefType::FuncRef
            }
        } else {
            if explicit_type {
                let offset = reader.offset();
                match reader.byte()? {
                    0x00 => RefType::FuncRef,
                    byte => return Err(BinaryError::BadExternKind { byte, offset }),
                }
            } else {
                RefType::FuncRef
            }
        };

        let item_count = reader.var_u32()?;
        let items = if exprs {
            let mut list = Vec::with_capacity(usize::min(item_count as usize, 1024));
            for _ in 0..item_count {
                list.push(decode_const_expr(reader)?);
            }
            ElemItems::Exprs(list)
        } else {
            let mut list = Vec::with_capacity(usize::min(item_count as usize, 1024));
            for _ in 0..item_count {
                list.push(reader.var_u32()?);
            }
            ElemItems::Funcs(list)
        };

        module.elems.push(ElemSegment { kind, ty, items });
    }
    Ok(())
}

fn decode_code(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for func in 0..count {
        let size = reader.var_u32()? as usize;
        let mut body = reader.subreader(size)?;
        let body_start = body.offset();

        let mut locals = Vec::new();
        let run_count = body.var_u32()?;
        let mut total: u64 = 0;
        for _ in 0..run_count {
            let repeat = body.var_u32()?;
            let ty = body.value_type()?;
            total += repeat as u64;
            if total > MAX_LOCALS as u64 {
                return Err(BinaryError::TooManyLocals { func });
            }
            locals.push((repeat, ty));
        }

        let mut ops = Vec::new();
        let mut offsets = Vec::new();
        let mut depth = 1usize;
        loop {
            if body.is_empty() {
                return Err(BinaryError::UnterminatedExpression {
                    offset: body.offset(),
                });
            }
            offsets.push((body.offset() - body_start) as u32);
            let op = decode_operator(&mut body)?;
            match &op {
                Operator::Block(_)
                | Operator::Loop(_)
                | Operator::If(_)
                | Operator::Try(_) => depth += 1,
                Operator::End(_) | Operator::Delegate(_) => depth -= 1,
                _ => {}
            }
            ops.push(op);
            if depth == 0 {
                break;
            }
        }
        if !body.is_empty() {
            return Err(BinaryError::BodyLengthMismatch { func });
        }

        module.code.push(FunctionBody {
            locals,
            ops,
            offsets,
        });
    }
    Ok(())
}

fn decode_data(reader: &mut Reader<'_>, module: &mut Module) -> Result<(), BinaryError> {
    let count = reader.var_u32()?;
    for _ in 0..count {
        let offset = reader.offset();
        let flags = reader.var_u32()?;
        let kind = match flags {
            0 => DataKind::Active {
                memory: 0,
                offset: decode_const_expr(reader)?,
            },
            1 => DataKind::Passive,
            2 => DataKind::Active {
                memory: reader.var_u32()?,
                offset: decode_const_expr(reader)?,
            },
            _ => {
                return Err(BinaryError::BadFlags {
                    value: flags,
                    offset,
                })
            }
        };
        let len = reader.var_u32()? as usize;
        let bytes = reader.read_bytes(len)?.to_vec();
        module.data.push(DataSegment { kind, bytes });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &[u8] = &[0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

    #[test]
    fn the_empty_module_decodes_to_nothing() {
        let module = decode_module(EMPTY, FeatureSet::standard()).unwrap();
        assert_eq!(module, Module::default());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let err = decode_module(b"\x01asm\x01\0\0\0", FeatureSet::standard());
        assert_eq!(err, Err(BinaryError::BadMagic));
    }

    #[test]
    fn bad_version_is_rejected() {
        let err = decode_module(b"\0asm\x02\0\0\0", FeatureSet::standard());
        assert_eq!(err, Err(BinaryError::BadVersion(2)));
    }

    #[test]
    fn truncation_is_rejected_everywhere() {
        // Every proper prefix of the empty module must fail.
        for len in 0..EMPTY.len() {
            assert!(decode_module(&EMPTY[..len], FeatureSet::standard()).is_err());
        }
    }

    #[test]
    fn out_of_order_sections_are_rejected() {
        // Memory section (5) followed by table section (4).
        let mut bytes = EMPTY.to_vec();
        bytes.extend_from_slice(&[0x05, 0x01, 0x00]);
        bytes.extend_from_slice(&[0x04, 0x01, 0x00]);
        assert_eq!(
            decode_module(&bytes, FeatureSet::standard()),
            Err(BinaryError::SectionOutOfOrder(0x04))
        );
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let mut bytes = EMPTY.to_vec();
        bytes.extend_from_slice(&[0x05, 0x01, 0x00]);
        bytes.extend_from_slice(&[0x05, 0x01, 0x00]);
        assert_eq!(
            decode_module(&bytes, FeatureSet::standard()),
            Err(BinaryError::DuplicateSection(0x05))
        );
    }

    #[test]
    fn section_bodies_must_consume_their_frame() {
        // A type section declaring zero types but carrying a stray byte.
        let mut bytes = EMPTY.to_vec();
        bytes.extend_from_slice(&[0x01, 0x02, 0x00, 0xaa]);
        assert!(matches!(
            decode_module(&bytes, FeatureSet::standard()),
            Err(BinaryError::SectionLengthMismatch { id: 1, .. })
        ));
    }

    #[test]
    fn custom_sections_interleave_anywhere() {
        let mut bytes = EMPTY.to_vec();
        // custom "a", then memory, then custom "b".
        bytes.extend_from_slice(&[0x00, 0x02, 0x01, b'a']);
        bytes.extend_from_slice(&[0x05, 0x01, 0x00]);
        bytes.extend_from_slice(&[0x00, 0x02, 0x01, b'b']);
        let module = decode_module(&bytes, FeatureSet::standard()).unwrap();
        assert_eq!(module.custom_sections.len(), 2);
        assert_eq!(module.custom_sections[0].position, 0);
        assert_eq!(module.custom_sections[1].position, 1);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let mut bytes = EMPTY.to_vec();
        bytes.extend_from_slice(&[0x0e, 0x00]);
        assert_eq!(
            decode_module(&bytes, FeatureSet::standard()),
            Err(BinaryError::UnknownSection(0x0e))
        );
    }
}
