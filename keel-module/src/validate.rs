//! Module validation: the per-section checks and the per-function
//! streaming type-checker (in [`func`]).

mod func;

use std::collections::{
    BTreeSet,
    HashSet,
};

use keel_ops::{
    FeatureSet,
    Operator,
};
use keel_types::{
    consts::{
        MAX_MEMORY_PAGES,
        MAX_PARAMS,
        MAX_RESULTS,
        MAX_TABLE_ELEMS,
    },
    ExternKind,
    GlobalType,
    Limits,
    RefType,
    ValueType,
};
use tracing::trace;

use crate::{
    module::*,
    Module,
    ValidationError,
};

/// Facts the validator proves about a module, needed downstream by the
/// linker and the execution engine.
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    /// Functions that appear in the module's declarative reference set and
    /// may therefore be named by `ref.func`.
    pub declared_funcs: BTreeSet<u32>,
}

/// Validate a decoded module against the full rule set.
///
/// The section preconditions run first, in a fixed order; function bodies
/// are checked last. The first violation is returned.
pub fn validate_module(
    module: &Module,
    features: FeatureSet,
) -> Result<ModuleInfo, ValidationError> {
    check_types(module, features)?;
    check_imports(module, features)?;
    check_function_decls(module)?;
    check_definitions(module, features)?;
    let declared_funcs = collect_declared_funcs(module)?;
    check_global_initializers(module)?;
    check_exports(module)?;
    check_start(module)?;
    check_elem_segments(module)?;
    check_data_segments(module)?;
    check_data_count(module)?;

    for (defined_index, body) in module.code.iter().enumerate() {
        let func = (module.imported_funcs() + defined_index) as u32;
        func::validate_body(module, features, &declared_funcs, func, body)?;
    }
    trace!(
        functions = module.code.len(),
        "module validated"
    );
    Ok(ModuleInfo { declared_funcs })
}

fn type_index_in_range(module: &Module, index: u32) -> Result<(), ValidationError> {
    if (index as usize) < module.types.len() {
        Ok(())
    } else {
        Err(ValidationError::TypeIndexOutOfRange {
            index,
            count: module.types.len(),
        })
    }
}

fn check_types(module: &Module, features: FeatureSet) -> Result<(), ValidationError> {
    for ty in &module.types {
        if ty.params().len() > MAX_PARAMS || ty.results().len() > MAX_RESULTS {
            return Err(ValidationError::ArityTooLarge);
        }
        if ty.results().len() > 1 && !features.contains(FeatureSet::MULTI_VALUE) {
            return Err(ValidationError::MultiValueDisabled);
        }
    }
    Ok(())
}

fn check_limits(
    kind: ExternKind,
    limits: &Limits,
    cap: u64,
) -> Result<(), ValidationError> {
    if let Some(max) = limits.max {
        if limits.min > max {
            return Err(ValidationError::LimitsMinExceedsMax {
                kind,
                min: limits.min,
                max,
            });
        }
        if max > cap {
            return Err(ValidationError::LimitsExceedCap { kind, cap });
        }
    }
    if limits.min > cap {
        return Err(ValidationError::LimitsExceedCap { kind, cap });
    }
    Ok(())
}

fn check_table_type(ty: &keel_types::TableType) -> Result<(), ValidationError> {
    check_limits(ExternKind::Table, &ty.limits, MAX_TABLE_ELEMS)
}

fn check_memory_type(
    ty: &keel_types::MemoryType,
    features: FeatureSet,
) -> Result<(), ValidationError> {
    check_limits(ExternKind::Memory, &ty.limits, MAX_MEMORY_PAGES)?;
    if ty.shared {
        if !features.contains(FeatureSet::SHARED_MEMORIES) {
            return Err(ValidationError::SharedMemoriesDisabled);
        }
        if ty.limits.max.is_none() {
            return Err(ValidationError::SharedMemoryWithoutMax);
        }
    }
    Ok(())
}

fn check_tag_type(module: &Module, type_index: u32) -> Result<(), ValidationError> {
    type_index_in_range(module, type_index)?;
    let ty = &module.types[type_index as usize];
    if !ty.results().is_empty() {
        return Err(ValidationError::TagTypeHasResults {
            found: ty.to_string(),
        });
    }
    Ok(())
}

fn check_imports(module: &Module, features: FeatureSet) -> Result<(), ValidationError> {
    for import in &module.imports {
        match &import.desc {
            ImportDesc::Func { type_index } => type_index_in_range(module, *type_index)?,
            ImportDesc::Table(ty) => check_table_type(ty)?,
            ImportDesc::Memory(ty) => check_memory_type(ty, features)?,
            ImportDesc::Global(_) => {}
            ImportDesc::Tag { type_index } => check_tag_type(module, *type_index)?,
        }
    }
    Ok(())
}

fn check_function_decls(module: &Module) -> Result<(), ValidationError> {
    for type_index in &module.functions {
        type_index_in_range(module, *type_index)?;
    }
    Ok(())
}

fn check_definitions(module: &Module, features: FeatureSet) -> Result<(), ValidationError> {
    for ty in &module.tables {
        check_table_type(ty)?;
    }
    for ty in &module.memories {
        check_memory_type(ty, features)?;
    }
    for type_index in &module.tags {
        check_tag_type(module, *type_index)?;
    }
    Ok(())
}

/// The type a validated constant expression produces.
fn const_expr_type(
    module: &Module,
    expr: &ConstExpr,
) -> Result<ValueType, ValidationError> {
    let payload = match expr.ops.as_slice() {
        [payload, Operator::End(_)] => payload,
        [.., last] => {
            return Err(ValidationError::NonConstantInitializer {
                name: last.name(),
            })
        }
        [] => {
            return Err(ValidationError::NonConstantInitializer { name: "end" });
        }
    };
    let ty = match payload {
        Operator::I32Const(_) => ValueType::I32,
        Operator::I64Const(_) => ValueType::I64,
        Operator::F32Const(_) => ValueType::F32,
        Operator::F64Const(_) => ValueType::F64,
        Operator::V128Const(_) => ValueType::V128,
        Operator::RefNull(imm) => imm.ty.into(),
        Operator::RefFunc(imm) => {
            index_in_space(module, ExternKind::Func, imm.func)?;
            ValueType::FuncRef
        }
        Operator::GlobalGet(imm) => {
            let ty = global_in_space(module, imm.global)?;
            if !module.global_is_imported(imm.global) || ty.mutable {
                return Err(ValidationError::InitializerGlobalNotImportedImmutable {
                    index: imm.global,
                });
            }
            ty.ty
        }
        other => {
            return Err(ValidationError::NonConstantInitializer {
                name: other.name(),
            })
        }
    };
    Ok(ty)
}

fn check_const_expr(
    module: &Module,
    expr: &ConstExpr,
    expected: ValueType,
) -> Result<(), ValidationError> {
    let found = const_expr_type(module, expr)?;
    if found != expected {
        return Err(ValidationError::InitializerTypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

fn index_in_space(
    module: &Module,
    kind: ExternKind,
    index: u32,
) -> Result<(), ValidationError> {
    let count = match kind {
        ExternKind::Func => module.func_count(),
        ExternKind::Table => module.table_count(),
        ExternKind::Memory => module.memory_count(),
        ExternKind::Global => module.global_count(),
        ExternKind::Tag => module.tag_count(),
    };
    if (index as usize) < count {
        Ok(())
    } else {
        Err(ValidationError::IndexOutOfRange { kind, index, count })
    }
}

fn global_in_space(module: &Module, index: u32) -> Result<GlobalType, ValidationError> {
    module
        .global_type(index)
        .ok_or(ValidationError::IndexOutOfRange {
            kind: ExternKind::Global,
            index,
            count: module.global_count(),
        })
}

/// The declarative reference set: every function named by an export, an
/// element segment, or a global initializer. `ref.func` in code may only
/// name members of this set.
fn collect_declared_funcs(module: &Module) -> Result<BTreeSet<u32>, ValidationError> {
    let mut declared = BTreeSet::new();
    for export in &module.exports {
        if export.kind == ExternKind::Func {
            declared.insert(export.index);
        }
    }
    for segment in &module.elems {
        match &segment.items {
            ElemItems::Funcs(items) => declared.extend(items.iter().copied()),
            ElemItems::Exprs(items) => {
                for expr in items {
                    if let Some(Operator::RefFunc(imm)) = expr.payload() {
                        declared.insert(imm.func);
                    }
                }
            }
        }
    }
    for global in &module.globals {
        if let Some(Operator::RefFunc(imm)) = global.init.payload() {
            declared.insert(imm.func);
        }
    }
    Ok(declared)
}

fn check_global_initializers(module: &Module) -> Result<(), ValidationError> {
    for global in &module.globals {
        check_const_expr(module, &global.init, global.ty.ty)?;
    }
    Ok(())
}

fn check_exports(module: &Module) -> Result<(), ValidationError> {
    let mut seen = HashSet::with_capacity(module.exports.len());
    for export in &module.exports {
        if !seen.insert(export.name.as_str()) {
            return Err(ValidationError::DuplicateExportName {
                name: export.name.clone(),
            });
        }
        index_in_space(module, export.kind, export.index)?;
    }
    Ok(())
}

fn check_start(module: &Module) -> Result<(), ValidationError> {
    let Some(start) = module.start else {
        return Ok(());
    };
    index_in_space(module, ExternKind::Func, start)?;
    let type_index = module
        .func_type_index(start)
        .expect("start index checked above");
    let ty = &module.types[type_index as usize];
    if !ty.params().is_empty() || !ty.results().is_empty() {
        return Err(ValidationError::BadStartFunctionType {
            found: ty.to_string(),
        });
    }
    Ok(())
}

fn check_elem_segments(module: &Module) -> Result<(), ValidationError> {
    for segment in &module.elems {
        if let ElemKind::Active { table, offset } = &segment.kind {
            let table_ty =
                module
                    .table_type(*table)
                    .ok_or(ValidationError::IndexOutOfRange {
                        kind: ExternKind::Table,
                        index: *table,
                        count: module.table_count(),
                    })?;
            check_const_expr(module, offset, ValueType::I32)?;
            if table_ty.elem != segment.ty {
                return Err(ValidationError::ElemSegmentTypeMismatch {
                    segment: segment.ty.to_string(),
                    table: table_ty.elem.to_string(),
                });
            }
        }
        match &segment.items {
            ElemItems::Funcs(items) => {
                for func in items {
                    index_in_space(module, ExternKind::Func, *func)?;
                }
                if segment.ty != RefType::FuncRef {
                    return Err(ValidationError::ElemSegmentTypeMismatch {
                        segment: segment.ty.to_string(),
                        table: RefType::FuncRef.to_string(),
                    });
                }
            }
            ElemItems::Exprs(items) => {
                for expr in items {
                    check_const_expr(module, expr, segment.ty.into())?;
                }
            }
        }
    }
    Ok(())
}

fn check_data_segments(module: &Module) -> Result<(), ValidationError> {
    for segment in &module.data {
        if let DataKind::Active { memory, offset } = &segment.kind {
            module
                .memory_type(*memory)
                .ok_or(ValidationError::IndexOutOfRange {
                    kind: ExternKind::Memory,
                    index: *memory,
                    count: module.memory_count(),
                })?;
            check_const_expr(module, offset, ValueType::I32)?;
        }
    }
    Ok(())
}

fn check_data_count(module: &Module) -> Result<(), ValidationError> {
    if let Some(declared) = module.data_count {
        if declared as usize != module.data.len() {
            return Err(ValidationError::DataCountMismatch {
                declared,
                actual: module.data.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use keel_types::InternedFuncType;

    use super::*;

    fn module_with_type(params: &[ValueType], results: &[ValueType]) -> Module {
        let mut module = Module::default();
        module
            .types
            .push(InternedFuncType::from_parts(params, results));
        module
    }

    #[test]
    fn the_empty_module_validates() {
        assert!(validate_module(&Module::default(), FeatureSet::standard()).is_ok());
    }

    #[test]
    fn function_decl_type_indices_are_bounded() {
        let mut module = module_with_type(&[], &[]);
        module.functions.push(7);
        module.code.push(FunctionBody::default());
        assert!(matches!(
            validate_module(&module, FeatureSet::standard()),
            Err(ValidationError::TypeIndexOutOfRange { index: 7, .. })
        ));
    }

    #[test]
    fn duplicate_export_names_are_rejected() {
        let mut module = module_with_type(&[], &[]);
        module.functions.push(0);
        module.code.push(FunctionBody {
            ops: vec![Operator::End(keel_ops::NoImm)],
            offsets: vec![0],
            ..Default::default()
        });
        for _ in 0..2 {
            module.exports.push(Export {
                name: "dup".into(),
                kind: ExternKind::Func,
                index: 0,
            });
        }
        assert!(matches!(
            validate_module(&module, FeatureSet::standard()),
            Err(ValidationError::DuplicateExportName { .. })
        ));
    }

    #[test]
    fn start_function_must_be_nullary() {
        let mut module = module_with_type(&[ValueType::I32], &[]);
        module.functions.push(0);
        module.code.push(FunctionBody {
            ops: vec![Operator::End(keel_ops::NoImm)],
            offsets: vec![0],
            ..Default::default()
        });
        module.start = Some(0);
        assert!(matches!(
            validate_module(&module, FeatureSet::standard()),
            Err(ValidationError::BadStartFunctionType { .. })
        ));
    }

    #[test]
    fn initializers_must_be_constant() {
        let mut module = module_with_type(&[], &[]);
        module.globals.push(GlobalDef {
            ty: GlobalType {
                ty: ValueType::I32,
                mutable: false,
            },
            init: ConstExpr::single(Operator::I32Popcnt(keel_ops::NoImm)),
        });
        assert!(matches!(
            validate_module(&module, FeatureSet::standard()),
            Err(ValidationError::NonConstantInitializer { name: "i32.popcnt" })
        ));
    }

    #[test]
    fn initializer_type_must_match() {
        let mut module = Module::default();
        module.globals.push(GlobalDef {
            ty: GlobalType {
                ty: ValueType::I64,
                mutable: false,
            },
            init: ConstExpr::single(Operator::I32Const(keel_ops::I32Imm { value: 3 })),
        });
        assert!(matches!(
            validate_module(&module, FeatureSet::standard()),
            Err(ValidationError::InitializerTypeMismatch { .. })
        ));
    }

    #[test]
    fn data_count_must_agree() {
        let mut module = Module::default();
        module.data_count = Some(1);
        assert!(matches!(
            validate_module(&module, FeatureSet::standard()),
            Err(ValidationError::DataCountMismatch {
                declared: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn declared_set_collects_exports_elems_and_globals() {
        let mut module = module_with_type(&[], &[]);
        for _ in 0..3 {
            module.functions.push(0);
            module.code.push(FunctionBody {
                ops: vec![Operator::End(keel_ops::NoImm)],
                offsets: vec![0],
                ..Default::default()
            });
        }
        module.exports.push(Export {
            name: "f".into(),
            kind: ExternKind::Func,
            index: 0,
        });
        module.elems.push(ElemSegment {
            kind: ElemKind::Declared,
            ty: RefType::FuncRef,
            items: ElemItems::Funcs(vec![1]),
        });
        module.globals.push(GlobalDef {
            ty: GlobalType {
                ty: ValueType::FuncRef,
                mutable: false,
            },
            init: ConstExpr::single(Operator::RefFunc(keel_ops::FuncImm { func: 2 })),
        });
        let info = validate_module(&module, FeatureSet::standard()).unwrap();
        assert_eq!(info.declared_funcs.iter().copied().collect::<Vec<_>>(), [0, 1, 2]);
    }
}
