//! The in-memory module: decoded sections with indices left unresolved.

use keel_ops::Operator;
use keel_types::{
    ExternKind,
    GlobalType,
    MemoryType,
    RefType,
    TableType,
    ValueType,
};

/// A constant expression: the operator stream of a global initializer or
/// segment offset, terminator included. The validator restricts it to a
/// single constant operator followed by `end`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstExpr {
    /// The raw operator stream.
    pub ops: Vec<Operator>,
}

impl ConstExpr {
    /// A `ConstExpr` holding one operator plus the terminator.
    pub fn single(op: Operator) -> Self {
        Self {
            ops: vec![op, Operator::End(keel_ops::NoImm)],
        }
    }

    /// The single payload operator, if this expression has the validated
    /// one-operator shape.
    pub fn payload(&self) -> Option<&Operator> {
        match self.ops.as_slice() {
            [op, Operator::End(_)] => Some(op),
            _ => None,
        }
    }
}

/// What an import asks for, with type indices unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDesc {
    /// A function of the type at the given type index.
    Func {
        /// Index into the type section.
        type_index: u32,
    },
    /// A table.
    Table(TableType),
    /// A linear memory.
    Memory(MemoryType),
    /// A global cell.
    Global(GlobalType),
    /// An exception tag of the type at the given type index.
    Tag {
        /// Index into the type section.
        type_index: u32,
    },
}

impl ImportDesc {
    /// The imported kind.
    pub fn kind(&self) -> ExternKind {
        match self {
            Self::Func { .. } => ExternKind::Func,
            Self::Table(_) => ExternKind::Table,
            Self::Memory(_) => ExternKind::Memory,
            Self::Global(_) => ExternKind::Global,
            Self::Tag { .. } => ExternKind::Tag,
        }
    }
}

/// One import: the `(module, name, expected type)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Module namespace to resolve in.
    pub module: String,
    /// Export name within that namespace.
    pub name: String,
    /// Expected shape.
    pub desc: ImportDesc,
}

/// One export: a name attached to an index space entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Exported name; unique within the module.
    pub name: String,
    /// Which index space.
    pub kind: ExternKind,
    /// Index into that space (imports first).
    pub index: u32,
}

/// A defined global: its type plus initializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalDef {
    /// Declared type.
    pub ty: GlobalType,
    /// Constant initializer.
    pub init: ConstExpr,
}

/// Where an element segment applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElemKind {
    /// Copied into a table at instantiation.
    Active {
        /// Target table.
        table: u32,
        /// Constant base offset.
        offset: ConstExpr,
    },
    /// Available to `table.init` until dropped.
    Passive,
    /// Only declares functions referenceable; never applied.
    Declared,
}

/// The payload of an element segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElemItems {
    /// Function indices (the compact encoding).
    Funcs(Vec<u32>),
    /// General constant expressions.
    Exprs(Vec<ConstExpr>),
}

impl ElemItems {
    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            Self::Funcs(items) => items.len(),
            Self::Exprs(items) => items.len(),
        }
    }

    /// Whether the segment is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An element segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElemSegment {
    /// Activity kind.
    pub kind: ElemKind,
    /// Element type.
    pub ty: RefType,
    /// Elements.
    pub items: ElemItems,
}

/// Where a data segment applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataKind {
    /// Copied into a memory at instantiation.
    Active {
        /// Target memory.
        memory: u32,
        /// Constant base offset.
        offset: ConstExpr,
    },
    /// Available to `memory.init` until dropped.
    Passive,
}

/// A data segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    /// Activity kind.
    pub kind: DataKind,
    /// Raw bytes.
    pub bytes: Vec<u8>,
}

/// The body of a defined function.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionBody {
    /// Declared locals as `(count, type)` runs, exactly as encoded.
    pub locals: Vec<(u32, ValueType)>,
    /// The operator stream, including the final `end`.
    pub ops: Vec<Operator>,
    /// Byte offset of each operator within the body, parallel to `ops`.
    /// Shared by the validator, the executor's side tables, and trap
    /// reporting.
    pub offsets: Vec<u32>,
}

impl FunctionBody {
    /// Total number of declared locals (excluding parameters).
    pub fn local_count(&self) -> u64 {
        self.locals.iter().map(|(count, _)| *count as u64).sum()
    }

    /// Iterate the locals expanded to one type per local.
    pub fn iter_locals(&self) -> impl Iterator<Item = ValueType> + '_ {
        self.locals
            .iter()
            .flat_map(|(count, ty)| std::iter::repeat(*ty).take(*count as usize))
    }
}

/// A custom section, preserved verbatim for tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSection {
    /// Section name.
    pub name: String,
    /// Opaque payload.
    pub bytes: Vec<u8>,
    /// Number of non-custom sections preceding it, used to re-emit the
    /// section in its original position.
    pub position: usize,
}

/// A decoded module. Immutable after load; indices are never resolved to
/// objects here.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    /// The type table, position-indexed. Entries are interned, so equality
    /// between any two entries anywhere in the engine is pointer equality.
    pub types: Vec<keel_types::InternedFuncType>,
    /// Imports, in declaration order.
    pub imports: Vec<Import>,
    /// Type indices of the defined functions.
    pub functions: Vec<u32>,
    /// Defined tables.
    pub tables: Vec<TableType>,
    /// Defined memories.
    pub memories: Vec<MemoryType>,
    /// Type indices of the defined exception tags.
    pub tags: Vec<u32>,
    /// Defined globals.
    pub globals: Vec<GlobalDef>,
    /// Exports, in declaration order.
    pub exports: Vec<Export>,
    /// Start function, if any.
    pub start: Option<u32>,
    /// Element segments.
    pub elems: Vec<ElemSegment>,
    /// The data-count scalar, if the section was present.
    pub data_count: Option<u32>,
    /// Bodies of the defined functions, parallel to `functions`.
    pub code: Vec<FunctionBody>,
    /// Data segments.
    pub data: Vec<DataSegment>,
    /// Custom sections, in decode order.
    pub custom_sections: Vec<CustomSection>,
}

macro_rules! space_accessors {
    ($imported:ident, $count:ident, $desc:pat, $defined:ident) => {
        /// Number of imports into this index space.
        pub fn $imported(&self) -> usize {
            self.imports
                .iter()
                .filter(|import| matches!(import.desc, $desc))
                .count()
        }

        /// Total size of this index space, imports included.
        pub fn $count(&self) -> usize {
            self.$imported() + self.$defined.len()
        }
    };
}

impl Module {
    space_accessors!(imported_funcs, func_count, ImportDesc::Func { .. }, functions);
    space_accessors!(imported_tables, table_count, ImportDesc::Table(_), tables);
    space_accessors!(imported_memories, memory_count, ImportDesc::Memory(_), memories);
    space_accessors!(imported_globals, global_count, ImportDesc::Global(_), globals);
    space_accessors!(imported_tags, tag_count, ImportDesc::Tag { .. }, tags);

    /// Type index of the function at `index` in the merged space, or `None`
    /// when out of range.
    pub fn func_type_index(&self, index: u32) -> Option<u32> {
        let mut remaining = index as usize;
        for import in &self.imports {
            if let ImportDesc::Func { type_index } = import.desc {
                if remaining == 0 {
                    return Some(type_index);
                }
                remaining -= 1;
            }
        }
        self.functions.get(remaining).copied()
    }

    /// Table type at `index` in the merged space.
    pub fn table_type(&self, index: u32) -> Option<TableType> {
        let mut remaining = index as usize;
        for import in &self.imports {
            if let ImportDesc::Table(ty) = import.desc {
                if remaining == 0 {
                    return Some(ty);
                }
                remaining -= 1;
            }
        }
        self.tables.get(remaining).copied()
    }

    /// Memory type at `index` in the merged space.
    pub fn memory_type(&self, index: u32) -> Option<MemoryType> {
        let mut remaining = index as usize;
        for import in &self.imports {
            if let ImportDesc::Memory(ty) = import.desc {
                if remaining == 0 {
                    return Some(ty);
                }
                remaining -= 1;
            }
        }
        self.memories.get(remaining).copied()
    }

    /// Global type at `index` in the merged space.
    pub fn global_type(&self, index: u32) -> Option<GlobalType> {
        let mut remaining = index as usize;
        for import in &self.imports {
            if let ImportDesc::Global(ty) = import.desc {
                if remaining == 0 {
                    return Some(ty);
                }
                remaining -= 1;
            }
        }
        self.globals.get(remaining).map(|global| global.ty)
    }

    /// Type index of the tag at `index` in the merged space.
    pub fn tag_type_index(&self, index: u32) -> Option<u32> {
        let mut remaining = index as usize;
        for import in &self.imports {
            if let ImportDesc::Tag { type_index } = import.desc {
                if remaining == 0 {
                    return Some(type_index);
                }
                remaining -= 1;
            }
        }
        self.tags.get(remaining).copied()
    }

    /// Whether the global at `index` is imported.
    pub fn global_is_imported(&self, index: u32) -> bool {
        (index as usize) < self.imported_globals()
    }
}

#[cfg(test)]
mod tests {
    use keel_types::Limits;

    use super::*;

    #[test]
    fn index_spaces_merge_imports_first() {
        let mut module = Module::default();
        module.types = vec![
            keel_types::InternedFuncType::from_parts(&[], &[]),
            keel_types::InternedFuncType::from_parts(&[ValueType::I32], &[]),
        ];
        module.imports.push(Import {
            module: "env".into(),
            name: "f".into(),
            desc: ImportDesc::Func { type_index: 1 },
        });
        module.functions.push(0);

        assert_eq!(module.func_count(), 2);
        assert_eq!(module.func_type_index(0), Some(1));
        assert_eq!(module.func_type_index(1), Some(0));
        assert_eq!(module.func_type_index(2), None);
    }

    #[test]
    fn local_runs_expand() {
        let body = FunctionBody {
            locals: vec![(2, ValueType::I32), (1, ValueType::F64)],
            ..Default::default()
        };
        assert_eq!(body.local_count(), 3);
        assert_eq!(
            body.iter_locals().collect::<Vec<_>>(),
            [ValueType::I32, ValueType::I32, ValueType::F64]
        );
    }

    #[test]
    fn table_space_resolves_imported_type() {
        let mut module = Module::default();
        let ty = TableType {
            elem: RefType::FuncRef,
            limits: Limits { min: 1, max: None },
        };
        module.imports.push(Import {
            module: "env".into(),
            name: "t".into(),
            desc: ImportDesc::Table(ty),
        });
        assert_eq!(module.table_type(0), Some(ty));
        assert_eq!(module.table_type(1), None);
    }
}
