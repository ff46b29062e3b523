//! Compartments, runtime objects, and the collector.

pub(crate) mod compartment;
pub(crate) mod memory;
pub(crate) mod object;
pub(crate) mod table;

pub use compartment::{
    try_collect,
    Compartment,
};
pub use object::{
    Context,
    Function,
    Global,
    Instance,
    Memory,
    Object,
    Table,
    Tag,
};

use keel_types::{
    RefType,
    Value,
};

use crate::{
    Trap,
    TrapKind,
};

impl Memory {
    /// Current size in pages.
    pub fn pages(&self) -> u64 {
        self.data.pages()
    }

    /// Grow by `delta` pages; returns the previous page count or `None`
    /// when the limits forbid it.
    pub fn grow(&self, delta: u64) -> Result<Option<u64>, Trap> {
        self.data.grow(delta)
    }

    /// Host-side read with the same bounds semantics as a guest load.
    pub fn read(&self, address: u32, out: &mut [u8]) -> Result<(), Trap> {
        self.data.read(address, 0, out)
    }

    /// Host-side write with the same bounds semantics as a guest store.
    pub fn write(&self, address: u32, bytes: &[u8]) -> Result<(), Trap> {
        self.data.write(address, 0, bytes)
    }
}

impl Table {
    /// Current length.
    pub fn len(&self) -> u32 {
        self.data.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read an element as a reference value.
    pub fn get(&self, index: u32) -> Result<Value, Trap> {
        let elem = self.data.get(index)?;
        Ok(Value::ref_from_token(self.data.elem_kind(), elem.token()))
    }

    /// Write an element from a reference value of the table's kind.
    pub fn set(&self, index: u32, value: Value) -> Result<(), Trap> {
        let kind = self.data.elem_kind();
        if value.ty() != keel_types::ValueType::from(kind) {
            return Err(Trap::new(TrapKind::OutOfBoundsTableAccess).with_operand(index));
        }
        let token = value.ref_token().unwrap_or(0);
        let elem = table::elem_from_token(kind, token, |id| {
            self.raw.compartment.function_data(id)
        })?;
        self.data.set(index, elem)
    }

    /// Grow by `delta` null elements; returns the previous length or
    /// `None` when the limits forbid it.
    pub fn grow(&self, delta: u32) -> Option<u32> {
        self.data.grow(delta, table::TableElem::Null)
    }

    /// Store a function handle directly into a slot.
    pub fn set_function(&self, index: u32, function: &Function) -> Result<(), Trap> {
        if self.data.elem_kind() != RefType::FuncRef
            || function.raw.compartment.id() != self.raw.compartment.id()
        {
            return Err(Trap::new(TrapKind::IndirectCallSignatureMismatch));
        }
        self.data.set(index, table::TableElem::Func {
            id: function.id(),
            data: std::sync::Arc::clone(&function.data),
        })
    }
}

impl Global {
    /// Read the global's value in the given context.
    pub fn get(&self, context: &Context) -> Value {
        let bits = match &self.data.storage {
            object::GlobalStorage::Immutable(bits) => *bits,
            object::GlobalStorage::Mutable { slot } => {
                let slab = context.data.mutable_globals.lock();
                slab.get(*slot as usize).copied().unwrap_or_default()
            }
        };
        Value::from_parts(self.data.ty.ty, bits)
    }

    /// Write a mutable global in the given context. Returns `false` for
    /// immutable globals or a kind mismatch.
    pub fn set(&self, context: &Context, value: Value) -> bool {
        if value.ty() != self.data.ty.ty {
            return false;
        }
        match &self.data.storage {
            object::GlobalStorage::Immutable(_) => false,
            object::GlobalStorage::Mutable { slot } => {
                let mut slab = context.data.mutable_globals.lock();
                match slab.get_mut(*slot as usize) {
                    Some(cell) => {
                        *cell = value.bits();
                        true
                    }
                    None => false,
                }
            }
        }
    }
}

impl Instance {
    /// Look up an export by name.
    pub fn export(&self, name: &str) -> Option<Object> {
        let (kind, id) = self.data.exports.get(name)?;
        let compartment = Compartment {
            inner: std::sync::Arc::clone(&self.raw.compartment),
        };
        object_from_arena(&compartment, *kind, *id)
    }

    /// The instance's debug name.
    pub fn debug_name(&self) -> &str {
        &self.data.debug_name
    }
}

/// Build a kind-erased handle from an arena reference.
pub(crate) fn object_from_arena(
    compartment: &Compartment,
    kind: keel_types::ExternKind,
    id: object::ObjectId,
) -> Option<Object> {
    use object::{
        ObjectData,
        RawHandle,
    };

    let state = compartment.inner.state.lock();
    let slot = state.slots.get(id as usize)?;
    let header = std::sync::Arc::clone(&slot.header);
    let data = slot.data.as_ref()?;
    let object = match (kind, data) {
        (keel_types::ExternKind::Func, ObjectData::Function(data)) => {
            Object::Function(Function {
                data: std::sync::Arc::clone(data),
                raw: RawHandle::new(std::sync::Arc::clone(&compartment.inner), id, header),
            })
        }
        (keel_types::ExternKind::Table, ObjectData::Table(data)) => Object::Table(Table {
            data: std::sync::Arc::clone(data),
            raw: RawHandle::new(std::sync::Arc::clone(&compartment.inner), id, header),
        }),
        (keel_types::ExternKind::Memory, ObjectData::Memory(data)) => {
            Object::Memory(Memory {
                data: std::sync::Arc::clone(data),
                raw: RawHandle::new(std::sync::Arc::clone(&compartment.inner), id, header),
            })
        }
        (keel_types::ExternKind::Global, ObjectData::Global(data)) => {
            Object::Global(Global {
                data: std::sync::Arc::clone(data),
                raw: RawHandle::new(std::sync::Arc::clone(&compartment.inner), id, header),
            })
        }
        (keel_types::ExternKind::Tag, ObjectData::Tag(data)) => Object::Tag(Tag {
            data: std::sync::Arc::clone(data),
            raw: RawHandle::new(std::sync::Arc::clone(&compartment.inner), id, header),
        }),
        _ => return None,
    };
    Some(object)
}
