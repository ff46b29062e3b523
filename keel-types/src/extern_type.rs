//! Extern types: the shapes importable and exportable by a module.

use core::fmt;

use crate::{
    InternedFuncType,
    RefType,
    ValueType,
};

/// Minimum and optional maximum size of a table or memory, in elements or
/// pages respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Limits {
    /// Initial size; also the lower bound an import must provide.
    pub min: u64,
    /// Upper bound, if any.
    pub max: Option<u64>,
}

impl Limits {
    /// `min <= max` when a maximum is declared.
    pub fn is_well_formed(&self) -> bool {
        self.max.map_or(true, |max| self.min <= max)
    }

    /// Whether a concrete object with these limits satisfies an import
    /// declared with `declared` limits: at least as large, and no more
    /// permissive an upper bound.
    pub fn satisfies(&self, declared: &Limits) -> bool {
        self.min >= declared.min
            && match (declared.max, self.max) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(declared_max), Some(max)) => max <= declared_max,
            }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..", self.min),
        }
    }
}

/// The type of a table: element kind plus limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableType {
    /// Kind of the stored references.
    pub elem: RefType,
    /// Element count bounds.
    pub limits: Limits,
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {} {}", self.elem, self.limits)
    }
}

/// The type of a linear memory: page-count limits plus the shared flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryType {
    /// Page count bounds.
    pub limits: Limits,
    /// Whether the memory may be accessed from multiple contexts.
    pub shared: bool,
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory {}{}",
            self.limits,
            if self.shared { " shared" } else { "" }
        )
    }
}

/// The type of a global: value kind plus mutability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalType {
    /// Kind of the stored value.
    pub ty: ValueType,
    /// Whether the cell may be written after instantiation.
    pub mutable: bool,
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "global {}{}",
            if self.mutable { "mut " } else { "" },
            self.ty
        )
    }
}

/// The kind half of an [`ExternType`], used where only the discriminant
/// matters (export kinds, object kinds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[repr(u8)]
pub enum ExternKind {
    /// A function.
    Func,
    /// A table.
    Table,
    /// A linear memory.
    Memory,
    /// A global cell.
    Global,
    /// An exception tag.
    Tag,
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Func => "func",
            Self::Table => "table",
            Self::Memory => "memory",
            Self::Global => "global",
            Self::Tag => "tag",
        })
    }
}

/// The type of anything that can cross a module boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternType {
    /// A function of the given interned type.
    Func(InternedFuncType),
    /// A table.
    Table(TableType),
    /// A linear memory.
    Memory(MemoryType),
    /// A global cell.
    Global(GlobalType),
    /// An exception tag; the type's results must be empty.
    Tag(InternedFuncType),
}

impl ExternType {
    /// The kind discriminant.
    pub fn kind(&self) -> ExternKind {
        match self {
            Self::Func(_) => ExternKind::Func,
            Self::Table(_) => ExternKind::Table,
            Self::Memory(_) => ExternKind::Memory,
            Self::Global(_) => ExternKind::Global,
            Self::Tag(_) => ExternKind::Tag,
        }
    }
}

impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Func(ty) => write!(f, "func {ty}"),
            Self::Table(ty) => write!(f, "{ty}"),
            Self::Memory(ty) => write!(f, "{ty}"),
            Self::Global(ty) => write!(f, "{ty}"),
            Self::Tag(ty) => write!(f, "tag {ty}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Limits { min: 1, max: Some(2) }, Limits { min: 1, max: Some(2) }, true)]
    #[case(Limits { min: 2, max: Some(4) }, Limits { min: 1, max: None }, true)]
    #[case(Limits { min: 0, max: Some(4) }, Limits { min: 1, max: Some(4) }, false)]
    #[case(Limits { min: 1, max: None }, Limits { min: 1, max: Some(4) }, false)]
    #[case(Limits { min: 1, max: Some(8) }, Limits { min: 1, max: Some(4) }, false)]
    fn limit_satisfaction(
        #[case] provided: Limits,
        #[case] declared: Limits,
        #[case] expected: bool,
    ) {
        assert_eq!(provided.satisfies(&declared), expected);
    }
}
