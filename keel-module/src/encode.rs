//! Module encoding: [`Module`] back to wire bytes.
//!
//! Encoding is the mirror of decoding, driven by the same operator table.
//! Output is canonical: minimal LEB128, the lowest segment flags that can
//! represent each segment, empty sections omitted, custom sections
//! re-emitted at their recorded positions. Canonically encoded input
//! round-trips byte-for-byte.

use keel_types::{
    Limits,
    MemoryType,
    TableType,
};

use crate::{
    decode::section_id,
    module::*,
    reader::type_byte,
    Writer,
};

/// Encode a module to bytes.
pub fn encode_module(module: &Module) -> Vec<u8> {
    let mut writer = Writer::new();
    writer.raw(b"\0asm");
    writer.u32_le(1);

    let mut emitted = 0usize;
    let mut flush_customs = |writer: &mut Writer, upto: usize| {
        for section in &module.custom_sections {
            if section.position == upto {
                writer.section(section_id::CUSTOM, |body| {
                    body.name(&section.name);
                    body.raw(&section.bytes);
                });
            }
        }
    };

    macro_rules! emit {
        ($nonempty:expr, $id:expr, $body:expr) => {
            if $nonempty {
                flush_customs(&mut writer, emitted);
                writer.section($id, $body);
                emitted += 1;
            }
        };
    }

    emit!(!module.types.is_empty(), section_id::TYPE, |body| {
        body.var_u32(module.types.len() as u32);
        for ty in &module.types {
            body.byte(type_byte::FUNC_FORM);
            encode_value_types(body, ty.params());
            encode_value_types(body, ty.results());
        }
    });

    emit!(!module.imports.is_empty(), section_id::IMPORT, |body| {
        body.var_u32(module.imports.len() as u32);
        for import in &module.imports {
            body.name(&import.module);
            body.name(&import.name);
            match &import.desc {
                ImportDesc::Func { type_index } => {
                    body.byte(0x00);
                    body.var_u32(*type_index);
                }
                ImportDesc::Table(ty) => {
                    body.byte(0x01);
                    encode_table_type(body, ty);
                }
                ImportDesc::Memory(ty) => {
                    body.byte(0x02);
                    encode_memory_type(body, ty);
                }
                ImportDesc::Global(ty) => {
                    body.byte(0x03);
                    encode_global_type(body, ty);
                }
                ImportDesc::Tag { type_index } => {
                    body.byte(0x04);
                    body.byte(0x00);
                    body.var_u32(*type_index);
                }
            }
        }
    });

    emit!(!module.functions.is_empty(), section_id::FUNCTION, |body| {
        body.var_u32(module.functions.len() as u32);
        for type_index in &module.functions {
            body.var_u32(*type_index);
        }
    });

    emit!(!module.tables.is_empty(), section_id::TABLE, |body| {
        body.var_u32(module.tables.len() as u32);
        for ty in &module.tables {
            encode_table_type(body, ty);
        }
    });

    emit!(!module.memories.is_empty(), section_id::MEMORY, |body| {
        body.var_u32(module.memories.len() as u32);
        for ty in &module.memories {
            encode_memory_type(body, ty);
        }
    });

    emit!(!module.tags.is_empty(), section_id::TAG, |body| {
        body.var_u32(module.tags.len() as u32);
        for type_index in &module.tags {
            body.byte(0x00);
            body.var_u32(*type_index);
        }
    });

    emit!(!module.globals.is_empty(), section_id::GLOBAL, |body| {
        body.var_u32(module.globals.len() as u32);
        for global in &module.globals {
            encode_global_type(body, &global.ty);
            encode_const_expr(body, &global.init);
        }
    });

    emit!(!module.exports.is_empty(), section_id::EXPORT, |body| {
        body.var_u32(module.exports.len() as u32);
        for export in &module.exports {
            body.name(&export.name);
            body.byte(match export.kind {
                keel_types::ExternKind::Func => 0x00,
                keel_types::ExternKind::Table => 0x01,
                keel_types::ExternKind::Memory => 0x02,
                keel_types::ExternKind::Global => 0x03,
                keel_types::ExternKind::Tag => 0x04,
            });
            body.var_u32(export.index);
        }
    });

    emit!(module.start.is_some(), section_id::START, |body| {
        body.var_u32(module.start.unwrap_or_default());
    });

    emit!(!module.elems.is_empty(), section_id::ELEM, |body| {
        body.var_u32(module.elems.len() as u32);
        for segment in &module.elems {
            encode_elem_segment(body, segment);
        }
    });

    emit!(module.data_count.is_some(), section_id::DATA_COUNT, |body| {
        body.var_u32(module.data_count.unwrap_or_default());
    });

    emit!(!module.code.is_empty(), section_id::CODE, |body| {
        body.var_u32(module.code.len() as u32);
        for function in &module.code {
            let mut inner = Writer::new();
            inner.var_u32(function.locals.len() as u32);
            for (count, ty) in &function.locals {
                inner.var_u32(*count);
                inner.value_type(*ty);
            }
            for op in &function.ops {
                op.encode(&mut inner);
            }
            let inner = inner.into_bytes();
            body.var_u32(inner.len() as u32);
            body.raw(&inner);
        }
    });

    emit!(!module.data.is_empty(), section_id::DATA, |body| {
        body.var_u32(module.data.len() as u32);
        for segment in &module.data {
            match &segment.kind {
                DataKind::Active { memory: 0, offset } => {
                    body.var_u32(0);
                    encode_const_expr(body, offset);
                }
                DataKind::Active { memory, offset } => {
                    body.var_u32(2);
                    body.var_u32(*memory);
                    encode_const_expr(body, offset);
                }
                DataKind::Passive => body.var_u32(1),
            }
            body.var_u32(segment.bytes.len() as u32);
            body.raw(&segment.bytes);
        }
    });

    flush_customs(&mut writer, emitted);
    // Customs recorded past the final emitted section still belong at the
    // tail.
    for section in &module.custom_sections {
        if section.position > emitted {
            writer.section(section_id::CUSTOM, |body| {
                body.name(&section.name);
                body.raw(&section.bytes);
            });
        }
    }

    writer.into_bytes()
}

fn encode_value_types(writer: &mut Writer, types: &[keel_types::ValueType]) {
    writer.var_u32(types.len() as u32);
    for ty in types {
        writer.value_type(*ty);
    }
}

fn encode_limits(writer: &mut Writer, limits: &Limits, shared: bool) {
    let mut flags = 0u32;
    if limits.max.is_some() {
        flags |= 0b01;
    }
    if shared {
        flags |= 0b10;
    }
    writer.var_u32(flags);
    writer.var_u32(limits.min as u32);
    if let Some(max) = limits.max {
        writer.var_u32(max as u32);
    }
}

fn encode_table_type(writer: &mut Writer, ty: &TableType) {
    writer.ref_type(ty.elem);
    encode_limits(writer, &ty.limits, false);
}

fn encode_memory_type(writer: &mut Writer, ty: &MemoryType) {
    encode_limits(writer, &ty.limits, ty.shared);
}

fn encode_global_type(writer: &mut Writer, ty: &keel_types::GlobalType) {
    writer.value_type(ty.ty);
    writer.byte(ty.mutable as u8);
}

fn encode_const_expr(writer: &mut Writer, expr: &ConstExpr) {
    for op in &expr.ops {
        op.encode(writer);
    }
}

fn encode_elem_segment(writer: &mut Writer, segment: &ElemSegment) {
    use keel_types::RefType;

    let exprs = matches!(segment.items, ElemItems::Exprs(_));
    // Pick the lowest flags value that can represent the segment.
    let (flags, table_offset) = match &segment.kind {
        ElemKind::Active { table, offset } => {
            let needs_table = *table != 0 || segment.ty != RefType::FuncRef;
            let flags = if needs_table { 0b010 } else { 0b000 };
            (flags, Some((*table, offset)))
        }
        ElemKind::Passive => (0b001, None),
        ElemKind::Declared => (0b011, None),
    };
    let flags = flags | if exprs { 0b100 } else { 0 };
    writer.var_u32(flags);

    if let Some((table, offset)) = table_offset {
        if flags & 0b010 != 0 {
            writer.var_u32(table);
        }
        encode_const_expr(writer, offset);
    }

    let explicit_type = flags & 0b011 != 0;
    if explicit_type {
        if exprs {
            writer.ref_type(segment.ty);
        } else {
            writer.byte(0x00);
        }
    }

    match &segment.items {
        ElemItems::Funcs(items) => {
            writer.var_u32(items.len() as u32);
            for func in items {
                writer.var_u32(*func);
            }
        }
        ElemItems::Exprs(items) => {
            writer.var_u32(items.len() as u32);
            for expr in items {
                encode_const_expr(writer, expr);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use keel_ops::FeatureSet;

    use super::*;
    use crate::decode_module;

    #[test]
    fn the_empty_module_encodes_to_its_eight_bytes() {
        assert_eq!(
            encode_module(&Module::default()),
            [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn encode_then_decode_is_identity_on_the_container() {
        let mut module = Module::default();
        module.types = vec![keel_types::InternedFuncType::from_parts(
            &[keel_types::ValueType::I32],
            &[keel_types::ValueType::I32],
        )];
        module.functions.push(0);
        module.code.push(FunctionBody {
            locals: vec![],
            ops: vec![
                keel_ops::Operator::LocalGet(keel_ops::LocalImm { local: 0 }),
                keel_ops::Operator::End(keel_ops::NoImm),
            ],
            offsets: vec![1, 3],
        });
        module.exports.push(Export {
            name: "id".into(),
            kind: keel_types::ExternKind::Func,
            index: 0,
        });

        let bytes = encode_module(&module);
        let decoded = decode_module(&bytes, FeatureSet::standard()).unwrap();
        assert_eq!(decoded, module);
        // And a second encode is byte-identical.
        assert_eq!(encode_module(&decoded), bytes);
    }
}
