//! Compartments: the isolation unit owning an arena of objects, the
//! small-integer id spaces generated code indexes with, and the tracing
//! collector.

use std::sync::{
    atomic::{
        AtomicU32,
        Ordering,
    },
    Arc,
    OnceLock,
};

use keel_types::{
    GlobalType,
    InternedFuncType,
    MemoryType,
    TableType,
    UntaggedValue,
    Value,
    ValueType,
};
use tracing::debug;

use super::{
    memory::MemoryData,
    object::*,
    table::{
        TableData,
        TableElem,
    },
};
use crate::{
    exec::InstanceView,
    platform,
    Trap,
};

/// A free-list allocator for the compartment-wide small-integer id
/// spaces (memories, tables, contexts).
#[derive(Debug, Default, Clone)]
pub(crate) struct IdAllocator {
    free: Vec<u32>,
    next: u32,
}

impl IdAllocator {
    pub(crate) fn alloc(&mut self) -> u32 {
        if let Some(id) = self.free.pop() {
            id
        } else {
            let id = self.next;
            self.next += 1;
            id
        }
    }

    pub(crate) fn release(&mut self, id: u32) {
        self.free.push(id);
    }
}

/// One arena slot: the shared header plus the payload, absent once
/// collected.
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) header: Arc<ObjectHeader>,
    pub(crate) data: Option<ObjectData>,
}

/// The mutable half of a compartment, under the compartment mutex.
#[derive(Debug, Default)]
pub(crate) struct CompartmentState {
    pub(crate) slots: Vec<Slot>,
    free_slots: Vec<ObjectId>,
    memory_ids: IdAllocator,
    table_ids: IdAllocator,
    /// Per-slot metadata of the mutable-global slab: element types (for
    /// tracing) and initial values (seeding new contexts).
    pub(crate) mutable_global_types: Vec<ValueType>,
    mutable_global_init: Vec<UntaggedValue>,
    /// Live context ids, so new mutable globals can extend their slabs.
    contexts: Vec<ObjectId>,
}

/// The shared core of a compartment.
pub struct CompartmentInner {
    id: u32,
    pub(crate) state: platform::Mutex<CompartmentState>,
}

impl std::fmt::Debug for CompartmentInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Compartment#{}", self.id)
    }
}

impl CompartmentInner {
    /// The compartment's process-unique id.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn alloc_object(&self, data: ObjectData) -> (ObjectId, Arc<ObjectHeader>) {
        let mut state = self.state.lock();
        state.alloc_object(data)
    }

    /// The payload of a function object, if `id` currently names one.
    pub(crate) fn function_data(&self, id: ObjectId) -> Option<Arc<FunctionData>> {
        match self.state.lock().slots.get(id as usize)?.data.as_ref()? {
            ObjectData::Function(data) => Some(Arc::clone(data)),
            _ => None,
        }
    }
}

impl CompartmentState {
    pub(crate) fn alloc_object(&mut self, data: ObjectData) -> (ObjectId, Arc<ObjectHeader>) {
        if let Some(id) = self.free_slots.pop() {
            let slot = &mut self.slots[id as usize];
            slot.data = Some(data);
            (id, Arc::clone(&slot.header))
        } else {
            let id = self.slots.len() as ObjectId;
            let header = Arc::new(ObjectHeader::default());
            self.slots.push(Slot {
                header: Arc::clone(&header),
                data: Some(data),
            });
            (id, header)
        }
    }

    fn data(&self, id: ObjectId) -> Option<&ObjectData> {
        self.slots.get(id as usize)?.data.as_ref()
    }

    /// Allocate a slab slot for a new mutable global and seed every live
    /// context with its initial value.
    pub(crate) fn alloc_mutable_global(
        &mut self,
        ty: ValueType,
        init: UntaggedValue,
    ) -> u32 {
        let slot = self.mutable_global_types.len() as u32;
        self.mutable_global_types.push(ty);
        self.mutable_global_init.push(init);
        for context in self.contexts.clone() {
            if let Some(ObjectData::Context(data)) = self.data(context) {
                data.mutable_globals.lock().push(init);
            }
        }
        slot
    }
}

/// A strong handle to a compartment.
#[derive(Clone, Debug)]
pub struct Compartment {
    pub(crate) inner: Arc<CompartmentInner>,
}

static NEXT_COMPARTMENT_ID: AtomicU32 = AtomicU32::new(0);

impl Compartment {
    /// Create a fresh, empty compartment.
    pub fn new() -> Self {
        let id = NEXT_COMPARTMENT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(id, "compartment created");
        Self {
            inner: Arc::new(CompartmentInner {
                id,
                state: platform::Mutex::new(CompartmentState::default()),
            }),
        }
    }

    /// The compartment's process-unique id.
    pub fn id(&self) -> u32 {
        self.inner.id
    }

    /// Create a linear memory owned by this compartment.
    pub fn create_memory(&self, ty: MemoryType) -> Result<Memory, Trap> {
        let memory_id = self.inner.state.lock().memory_ids.alloc();
        let data = Arc::new(MemoryData::new(ty, memory_id)?);
        let (id, header) = self
            .inner
            .alloc_object(ObjectData::Memory(Arc::clone(&data)));
        Ok(Memory {
            raw: RawHandle::new(Arc::clone(&self.inner), id, header),
            data,
        })
    }

    /// Create a table owned by this compartment.
    pub fn create_table(&self, ty: TableType) -> Table {
        let table_id = self.inner.state.lock().table_ids.alloc();
        let data = Arc::new(TableData::new(ty, table_id));
        let (id, header) = self
            .inner
            .alloc_object(ObjectData::Table(Arc::clone(&data)));
        Table {
            raw: RawHandle::new(Arc::clone(&self.inner), id, header),
            data,
        }
    }

    /// Create a global owned by this compartment, initialized to `value`.
    pub fn create_global(&self, ty: GlobalType, value: Value) -> Global {
        let storage = if ty.mutable {
            let slot = self
                .inner
                .state
                .lock()
                .alloc_mutable_global(ty.ty, value.bits());
            GlobalStorage::Mutable { slot }
        } else {
            GlobalStorage::Immutable(value.bits())
        };
        let data = Arc::new(GlobalData { ty, storage });
        let (id, header) = self
            .inner
            .alloc_object(ObjectData::Global(Arc::clone(&data)));
        Global {
            raw: RawHandle::new(Arc::clone(&self.inner), id, header),
            data,
        }
    }

    /// Create an exception tag owned by this compartment.
    pub fn create_tag(&self, ty: InternedFuncType, debug_name: &str) -> Tag {
        let data = Arc::new(TagData {
            ty,
            debug_name: debug_name.to_string(),
        });
        let (id, header) = self.inner.alloc_object(ObjectData::Tag(Arc::clone(&data)));
        Tag {
            raw: RawHandle::new(Arc::clone(&self.inner), id, header),
            data,
        }
    }

    /// Create a host function behind an intrinsic thunk.
    pub(crate) fn create_host_function(
        &self,
        ty: InternedFuncType,
        debug_name: &str,
        host: HostFn,
    ) -> Function {
        let data = Arc::new(FunctionData {
            ty,
            debug_name: debug_name.to_string(),
            code: FunctionCode::Host(host),
            instance: OnceLock::new(),
            view: OnceLock::new(),
        });
        let (id, header) = self
            .inner
            .alloc_object(ObjectData::Function(Arc::clone(&data)));
        Function {
            raw: RawHandle::new(Arc::clone(&self.inner), id, header),
            data,
        }
    }

    /// Create an execution context bound to this compartment.
    pub fn create_context(&self) -> Context {
        let mut state = self.inner.state.lock();
        let slab = state.mutable_global_init.clone();
        let data = Arc::new(ContextData {
            mutable_globals: platform::Mutex::new(slab),
        });
        let (id, header) = state.alloc_object(ObjectData::Context(Arc::clone(&data)));
        state.contexts.push(id);
        drop(state);
        Context {
            raw: RawHandle::new(Arc::clone(&self.inner), id, header),
            data,
        }
    }

    /// Handles to every live instance in the compartment.
    pub fn instances(&self) -> Vec<super::Instance> {
        let state = self.inner.state.lock();
        state
            .slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| match &slot.data {
                Some(ObjectData::Instance(data)) => Some(super::Instance {
                    raw: RawHandle::new(
                        Arc::clone(&self.inner),
                        id as ObjectId,
                        Arc::clone(&slot.header),
                    ),
                    data: Arc::clone(data),
                }),
                _ => None,
            })
            .collect()
    }

    /// Replace the initial mutable-global values future contexts start
    /// from; used after a start function establishes module state.
    pub(crate) fn seed_mutable_globals(&self, values: Vec<UntaggedValue>) {
        self.inner.state.lock().mutable_global_init = values;
    }

    /// Clone the compartment: globals, memories, and tables are
    /// value-copies; instances share the immutable module code; every
    /// small id is preserved so compiled code is source-compatible.
    pub fn clone_compartment(&self) -> Result<Compartment, Trap> {
        let cloned = Compartment::new();
        let source = self.inner.state.lock();
        let mut target = cloned.inner.state.lock();

        target.mutable_global_types = source.mutable_global_types.clone();
        target.mutable_global_init = source.mutable_global_init.clone();
        target.memory_ids = source.memory_ids.clone();
        target.table_ids = source.table_ids.clone();
        target.contexts = source.contexts.clone();

        // First pass: replicate every payload at the same arena index,
        // leaving cross-object references (ids) intact.
        for slot in &source.slots {
            let data = match &slot.data {
                None => None,
                Some(ObjectData::Memory(memory)) => {
                    let copy = Arc::new(MemoryData::new(memory.ty, memory.id)?);
                    copy_memory_contents(memory, &copy)?;
                    Some(ObjectData::Memory(copy))
                }
                Some(ObjectData::Table(table)) => {
                    let copy = Arc::new(TableData::new(table.ty, table.id));
                    // Elements are fixed up in the second pass, once the
                    // cloned functions exist.
                    copy.restore(table.snapshot());
                    Some(ObjectData::Table(copy))
                }
                Some(ObjectData::Global(global)) => {
                    Some(ObjectData::Global(Arc::new(GlobalData {
                        ty: global.ty,
                        storage: match &global.storage {
                            GlobalStorage::Immutable(bits) => {
                                GlobalStorage::Immutable(*bits)
                            }
                            GlobalStorage::Mutable { slot } => {
                                GlobalStorage::Mutable { slot: *slot }
                            }
                        },
                    })))
                }
                Some(ObjectData::Tag(tag)) => Some(ObjectData::Tag(Arc::clone(tag))),
                Some(ObjectData::Function(function)) => {
                    Some(ObjectData::Function(Arc::new(FunctionData {
                        ty: function.ty.clone(),
                        debug_name: function.debug_name.clone(),
                        code: match &function.code {
                            FunctionCode::Guest { unit, index } => FunctionCode::Guest {
                                unit: Arc::clone(unit),
                                index: *index,
                            },
                            FunctionCode::Host(host) => FunctionCode::Host(Arc::clone(host)),
                        },
                        instance: function.instance.clone(),
                        view: OnceLock::new(),
                    })))
                }
                Some(ObjectData::Instance(instance)) => {
                    // View rebuilt in the second pass.
                    Some(ObjectData::Instance(Arc::clone(instance)))
                }
                Some(ObjectData::Context(context)) => {
                    Some(ObjectData::Context(Arc::new(ContextData {
                        mutable_globals: platform::Mutex::new(
                            context.mutable_globals.lock().clone(),
                        ),
                    })))
                }
            };
            if data.is_none() {
                let next_index = target.slots.len() as ObjectId;
                target.free_slots.push(next_index);
            }
            target.slots.push(Slot {
                header: Arc::new(ObjectHeader::default()),
                data,
            });
        }

        // Second pass: rebuild instance views and table elements against
        // the cloned arena.
        let resolve_function = |state: &CompartmentState, id: ObjectId| match state.data(id) {
            Some(ObjectData::Function(data)) => Some(Arc::clone(data)),
            _ => None,
        };

        for index in 0..target.slots.len() {
            match target.slots[index].data.clone_kind() {
                Some(ClonedKind::Table(table)) => {
                    let elements = table
                        .snapshot()
                        .into_iter()
                        .map(|elem| match elem {
                            TableElem::Func { id, .. } => resolve_function(&target, id)
                                .map(|data| TableElem::Func { id, data })
                                .unwrap_or(TableElem::Null),
                            other => other,
                        })
                        .collect();
                    table.restore(elements);
                }
                Some(ClonedKind::Instance(instance)) => {
                    let rebuilt = Arc::new(InstanceData {
                        debug_name: instance.debug_name.clone(),
                        exports: instance.exports.clone(),
                        view: Arc::new(InstanceView::rebuild(
                            &instance.view,
                            |id| resolve_function(&target, id),
                            |id| match target.data(id) {
                                Some(ObjectData::Table(data)) => Some(Arc::clone(data)),
                                _ => None,
                            },
                            |id| match target.data(id) {
                                Some(ObjectData::Memory(data)) => Some(Arc::clone(data)),
                                _ => None,
                            },
                            |id| match target.data(id) {
                                Some(ObjectData::Global(data)) => Some(Arc::clone(data)),
                                _ => None,
                            },
                        )),
                        owned: instance.owned.clone(),
                    });
                    // Install the rebuilt view on the cloned functions.
                    for function in &rebuilt.view.functions {
                        let _ = function.view.set(Arc::downgrade(&rebuilt.view));
                    }
                    target.slots[index].data = Some(ObjectData::Instance(rebuilt));
                }
                None => {}
            }
        }

        drop(source);
        drop(target);
        debug!(from = self.id(), to = cloned.id(), "compartment cloned");
        Ok(cloned)
    }
}

impl Default for Compartment {
    fn default() -> Self {
        Self::new()
    }
}

/// Bulk copy of committed memory contents during compartment cloning.
fn copy_memory_contents(source: &MemoryData, target: &MemoryData) -> Result<(), Trap> {
    let pages = source.pages();
    if pages > target.pages() {
        target.grow(pages - target.pages())?;
    }
    let bytes = source.byte_len();
    const CHUNK: u64 = 1 << 20;
    let mut buffer = vec![0u8; CHUNK.min(bytes.max(1)) as usize];
    let mut offset = 0u64;
    while offset < bytes {
        let len = CHUNK.min(bytes - offset) as usize;
        source.read(offset as u32, 0, &mut buffer[..len])?;
        target.write(offset as u32, 0, &buffer[..len])?;
        offset += len as u64;
    }
    Ok(())
}

/// Helper for the second cloning pass: the kinds that need fixups.
enum ClonedKind {
    Table(Arc<TableData>),
    Instance(Arc<InstanceData>),
}

trait CloneKind {
    fn clone_kind(&self) -> Option<ClonedKind>;
}

impl CloneKind for Option<ObjectData> {
    fn clone_kind(&self) -> Option<ClonedKind> {
        match self {
            Some(ObjectData::Table(table)) => Some(ClonedKind::Table(Arc::clone(table))),
            Some(ObjectData::Instance(instance)) => {
                Some(ClonedKind::Instance(Arc::clone(instance)))
            }
            _ => None,
        }
    }
}

/// Trace from the roots and free everything unreachable from outside.
///
/// The caller must have quiesced every context of the compartment; the
/// compartment mutex is held for the whole collection. Returns `true`
/// when the compartment ends up empty.
pub fn try_collect(compartment: &Compartment) -> bool {
    let mut state = compartment.inner.state.lock();
    let slot_count = state.slots.len();
    let mut reachable = vec![false; slot_count];
    let mut worklist: Vec<ObjectId> = Vec::new();

    for (index, slot) in state.slots.iter().enumerate() {
        if slot.data.is_some() && slot.header.external.load(Ordering::Acquire) > 0 {
            reachable[index] = true;
            worklist.push(index as ObjectId);
        }
    }

    while let Some(id) = worklist.pop() {
        let mut edges: Vec<ObjectId> = Vec::new();
        match state.data(id) {
            Some(ObjectData::Instance(instance)) => {
                edges.extend_from_slice(&instance.owned);
            }
            Some(ObjectData::Function(function)) => {
                if let Some(instance) = function.instance.get() {
                    edges.push(*instance);
                }
            }
            Some(ObjectData::Table(table)) => {
                edges.extend(table.referenced_functions());
            }
            Some(ObjectData::Global(global)) => {
                if global.ty.ty == ValueType::FuncRef {
                    if let GlobalStorage::Immutable(bits) = &global.storage {
                        let token = bits.as_ref_token();
                        if token != 0 {
                            edges.push((token - 1) as ObjectId);
                        }
                    }
                }
            }
            Some(ObjectData::Context(context)) => {
                let slab = context.mutable_globals.lock();
                for (slot, ty) in state.mutable_global_types.iter().enumerate() {
                    if *ty == ValueType::FuncRef {
                        if let Some(bits) = slab.get(slot) {
                            let token = bits.as_ref_token();
                            if token != 0 {
                                edges.push((token - 1) as ObjectId);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
        for edge in edges {
            if let Some(flag) = reachable.get_mut(edge as usize) {
                if !*flag && state.data(edge).is_some() {
                    *flag = true;
                    worklist.push(edge);
                }
            }
        }
    }

    // Sweep in dependency order: instances first, then everything else.
    let mut freed = 0usize;
    for pass in 0..2 {
        for index in 0..slot_count {
            if reachable[index] {
                continue;
            }
            let is_instance = matches!(
                state.slots[index].data,
                Some(ObjectData::Instance(_))
            );
            if (pass == 0) != is_instance {
                continue;
            }
            if let Some(data) = state.slots[index].data.take() {
                release_ids(&mut state, &data);
                state.free_slots.push(index as ObjectId);
                freed += 1;
                drop(data);
            }
        }
    }
    let contexts = std::mem::take(&mut state.contexts);
    state.contexts = contexts
        .into_iter()
        .filter(|id| state_has(&state, *id))
        .collect();

    let remaining = state.slots.iter().filter(|slot| slot.data.is_some()).count();
    debug!(
        compartment = compartment.id(),
        freed, remaining, "collection finished"
    );
    remaining == 0
}

fn state_has(state: &CompartmentState, id: ObjectId) -> bool {
    state
        .slots
        .get(id as usize)
        .is_some_and(|slot| slot.data.is_some())
}

fn release_ids(state: &mut CompartmentState, data: &ObjectData) {
    match data {
        ObjectData::Memory(memory) => state.memory_ids.release(memory.id),
        ObjectData::Table(table) => state.table_ids.release(table.id),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use keel_types::Limits;

    use super::*;

    #[test]
    fn ids_are_recycled() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.alloc(), 0);
        assert_eq!(ids.alloc(), 1);
        ids.release(0);
        assert_eq!(ids.alloc(), 0);
        assert_eq!(ids.alloc(), 2);
    }

    #[test]
    fn collect_frees_unreferenced_objects() {
        let compartment = Compartment::new();
        let table = compartment.create_table(TableType {
            elem: keel_types::RefType::ExternRef,
            limits: Limits { min: 1, max: None },
        });
        assert!(!try_collect(&compartment));
        drop(table);
        assert!(try_collect(&compartment));
    }

    #[test]
    fn external_handles_pin_objects() {
        let compartment = Compartment::new();
        let memory = compartment
            .create_memory(MemoryType {
                limits: Limits { min: 1, max: Some(1) },
                shared: false,
            })
            .unwrap();
        assert!(!try_collect(&compartment));
        // The handle kept the memory alive through the collection.
        memory.data.write(0, 0, &[1]).unwrap();
    }

    #[test]
    fn cloned_compartments_do_not_alias_memory() {
        let compartment = Compartment::new();
        let memory = compartment
            .create_memory(MemoryType {
                limits: Limits { min: 1, max: Some(1) },
                shared: false,
            })
            .unwrap();
        memory.data.write(0, 0, &[42]).unwrap();

        let cloned = compartment.clone_compartment().unwrap();
        memory.data.write(0, 0, &[7]).unwrap();

        let cloned_memory = {
            let state = cloned.inner.state.lock();
            state
                .slots
                .iter()
                .find_map(|slot| match &slot.data {
                    Some(ObjectData::Memory(data)) => Some(Arc::clone(data)),
                    _ => None,
                })
                .expect("clone carries the memory")
        };
        let mut byte = [0u8];
        cloned_memory.read(0, 0, &mut byte).unwrap();
        assert_eq!(byte, [42]);
        assert_eq!(cloned_memory.id, memory.data.id);
    }
}
