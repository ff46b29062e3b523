//! Tables: bounds-checked arrays of references.

use std::sync::Arc;

use keel_types::{
    consts::MAX_TABLE_ELEMS,
    RefType,
    TableType,
};

use super::object::{
    FunctionData,
    ObjectId,
};
use crate::{
    platform,
    Trap,
    TrapKind,
};

/// One table slot.
#[derive(Clone, Default)]
pub(crate) enum TableElem {
    /// A null reference.
    #[default]
    Null,
    /// A function reference: arena id plus the payload for direct calls.
    Func {
        /// Arena id within the owning compartment.
        id: ObjectId,
        /// The function payload.
        data: Arc<FunctionData>,
    },
    /// A host-opaque reference token.
    Extern {
        /// The token; never zero.
        token: u64,
    },
}

impl TableElem {
    /// The value-representation token of this element.
    pub(crate) fn token(&self) -> u64 {
        match self {
            Self::Null => 0,
            Self::Func { id, .. } => *id as u64 + 1,
            Self::Extern { token } => *token,
        }
    }
}

impl std::fmt::Debug for TableElem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Func { id, .. } => write!(f, "func#{id}"),
            Self::Extern { token } => write!(f, "extern:{token:#x}"),
        }
    }
}

/// Payload of a table object.
#[derive(Debug)]
pub(crate) struct TableData {
    pub(crate) ty: TableType,
    /// Compartment-wide small id, stable across compartment cloning.
    pub(crate) id: u32,
    elements: platform::Mutex<Vec<TableElem>>,
}

impl TableData {
    pub(crate) fn new(ty: TableType, id: u32) -> Self {
        Self {
            ty,
            id,
            elements: platform::Mutex::new(vec![
                TableElem::Null;
                ty.limits.min as usize
            ]),
        }
    }

    /// Element kind stored in this table.
    pub(crate) fn elem_kind(&self) -> RefType {
        self.ty.elem
    }

    /// Current length.
    pub(crate) fn len(&self) -> u32 {
        self.elements.lock().len() as u32
    }

    fn oob(index: u32) -> Trap {
        Trap::new(TrapKind::OutOfBoundsTableAccess).with_operand(index)
    }

    /// Read one element.
    pub(crate) fn get(&self, index: u32) -> Result<TableElem, Trap> {
        self.elements
            .lock()
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Self::oob(index))
    }

    /// Write one element.
    pub(crate) fn set(&self, index: u32, elem: TableElem) -> Result<(), Trap> {
        let mut elements = self.elements.lock();
        let slot = elements
            .get_mut(index as usize)
            .ok_or_else(|| Self::oob(index))?;
        *slot = elem;
        Ok(())
    }

    /// Grow by `delta` slots filled with `fill`. Returns the previous
    /// length, or `None` when the limits forbid it (the guest sees `-1`).
    pub(crate) fn grow(&self, delta: u32, fill: TableElem) -> Option<u32> {
        let mut elements = self.elements.lock();
        let current = elements.len() as u64;
        let requested = current + delta as u64;
        let max = self.ty.limits.max.unwrap_or(MAX_TABLE_ELEMS);
        if requested > max {
            return None;
        }
        elements.resize(requested as usize, fill);
        Some(current as u32)
    }

    /// `table.fill`.
    pub(crate) fn fill(&self, start: u32, elem: TableElem, len: u32) -> Result<(), Trap> {
        let mut elements = self.elements.lock();
        let end = start as u64 + len as u64;
        if end > elements.len() as u64 {
            return Err(Self::oob(start));
        }
        for slot in &mut elements[start as usize..end as usize] {
            *slot = elem.clone();
        }
        Ok(())
    }

    /// `table.copy`; `src` may be `self`.
    pub(crate) fn copy_from(
        &self,
        src: &TableData,
        dst_start: u32,
        src_start: u32,
        len: u32,
    ) -> Result<(), Trap> {
        // Within one table, clone the source range first so overlapping
        // copies behave as if buffered.
        if std::ptr::eq(self, src) {
            let mut elements = self.elements.lock();
            let total = elements.len() as u64;
            if dst_start as u64 + len as u64 > total || src_start as u64 + len as u64 > total
            {
                return Err(Self::oob(dst_start.max(src_start)));
            }
            let snapshot: Vec<TableElem> = elements
                [src_start as usize..(src_start + len) as usize]
                .to_vec();
            elements[dst_start as usize..(dst_start + len) as usize]
                .clone_from_slice(&snapshot);
            return Ok(());
        }

        let source = src.elements.lock();
        if src_start as u64 + len as u64 > source.len() as u64 {
            return Err(Self::oob(src_start));
        }
        let snapshot: Vec<TableElem> =
            source[src_start as usize..(src_start + len) as usize].to_vec();
        drop(source);

        let mut elements = self.elements.lock();
        if dst_start as u64 + len as u64 > elements.len() as u64 {
            return Err(Self::oob(dst_start));
        }
        elements[dst_start as usize..(dst_start + len) as usize].clone_from_slice(&snapshot);
        Ok(())
    }

    /// `table.init` from a passive segment snapshot.
    pub(crate) fn init(&self, dst_start: u32, items: &[TableElem]) -> Result<(), Trap> {
        let mut elements = self.elements.lock();
        if dst_start as u64 + items.len() as u64 > elements.len() as u64 {
            return Err(Self::oob(dst_start));
        }
        elements[dst_start as usize..dst_start as usize + items.len()]
            .clone_from_slice(items);
        Ok(())
    }

    /// Ids of every function currently referenced, for tracing.
    pub(crate) fn referenced_functions(&self) -> Vec<ObjectId> {
        self.elements
            .lock()
            .iter()
            .filter_map(|elem| match elem {
                TableElem::Func { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// A value-snapshot of the elements, for compartment cloning.
    pub(crate) fn snapshot(&self) -> Vec<TableElem> {
        self.elements.lock().clone()
    }

    /// Replace the elements wholesale, for compartment cloning.
    pub(crate) fn restore(&self, elements: Vec<TableElem>) {
        *self.elements.lock() = elements;
    }
}

/// Convert a reference token back into a table element, given a resolver
/// for function ids.
pub(crate) fn elem_from_token(
    kind: RefType,
    token: u64,
    resolve_func: impl FnOnce(ObjectId) -> Option<Arc<FunctionData>>,
) -> Result<TableElem, Trap> {
    if token == 0 {
        return Ok(TableElem::Null);
    }
    match kind {
        RefType::FuncRef => {
            let id = (token - 1) as ObjectId;
            let data = resolve_func(id)
                .ok_or_else(|| Trap::new(TrapKind::UndefinedElement).with_operand(token))?;
            Ok(TableElem::Func { id, data })
        }
        RefType::ExternRef => Ok(TableElem::Extern { token }),
    }
}

#[cfg(test)]
mod tests {
    use keel_types::Limits;

    use super::*;

    fn table(min: u64, max: Option<u64>) -> TableData {
        TableData::new(
            TableType {
                elem: RefType::ExternRef,
                limits: Limits { min, max },
            },
            0,
        )
    }

    #[test]
    fn out_of_bounds_access_traps() {
        let table = table(2, Some(4));
        assert!(table.get(1).is_ok());
        let trap = table.get(2).unwrap_err();
        assert_eq!(trap.kind, TrapKind::OutOfBoundsTableAccess);
    }

    #[test]
    fn growth_respects_the_maximum() {
        let table = table(1, Some(2));
        assert_eq!(table.grow(1, TableElem::Null), Some(1));
        assert_eq!(table.grow(1, TableElem::Null), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn overlapping_copy_within_one_table_buffers() {
        let table = table(4, None);
        for index in 0..3 {
            table
                .set(index, TableElem::Extern {
                    token: index as u64 + 10,
                })
                .unwrap();
        }
        table.copy_from(&table, 1, 0, 3).unwrap();
        assert_eq!(table.get(1).unwrap().token(), 10);
        assert_eq!(table.get(2).unwrap().token(), 11);
        assert_eq!(table.get(3).unwrap().token(), 12);
    }

    #[test]
    fn fill_is_bounds_checked_before_writing() {
        let table = table(2, None);
        let trap = table
            .fill(1, TableElem::Extern { token: 5 }, 2)
            .unwrap_err();
        assert_eq!(trap.kind, TrapKind::OutOfBoundsTableAccess);
        // Nothing was written.
        assert_eq!(table.get(1).unwrap().token(), 0);
    }
}
